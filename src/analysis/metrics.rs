use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDateTime;
use log::error;
use serde::Serialize;

use crate::data::model::{Column, ColumnKind, Record};
use crate::error::{Error, Result};
use crate::snapshot::{Snapshot, Source};
use crate::stats::round_to;

// ---------------------------------------------------------------------------
// Speed deviation
// ---------------------------------------------------------------------------

/// Position and |actual − proposed| speed for one cleansed row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedDifference {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed_difference: Option<f64>,
}

/// Speed deviation for every filtered row of a vessel, in row order.
pub fn speed_differences(snapshot: &Snapshot, vessel_code: i64) -> Vec<SpeedDifference> {
    snapshot
        .filtered()
        .for_vessel(vessel_code)
        .map(|r| SpeedDifference {
            latitude: r.latitude,
            longitude: r.longitude,
            speed_difference: r.speed_difference(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Compliance
// ---------------------------------------------------------------------------

/// 100 minus the mean percentage deviation of actual from proposed speed,
/// rounded to two decimals.
///
/// Rows with a proposed speed of zero are ignored; with nothing left the
/// score is 0.0. Large overspeed drives the score below zero and that is
/// reported as is.
pub fn compliance_score(snapshot: &Snapshot, vessel_code: i64) -> f64 {
    let deviations: Vec<f64> = snapshot
        .filtered()
        .for_vessel(vessel_code)
        .filter_map(|r| percentage_deviation(r))
        .collect();

    if deviations.is_empty() {
        return 0.0;
    }
    let mean = deviations.iter().sum::<f64>() / deviations.len() as f64;
    round_to(100.0 - mean, 2)
}

fn percentage_deviation(record: &Record) -> Option<f64> {
    let proposed = record.proposed_speed_overground?;
    if proposed == 0.0 {
        return None;
    }
    let actual = record.actual_speed_overground?;
    Some((actual - proposed).abs() / proposed * 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ComplianceOutcome {
    Winner { vessel_code: i64 },
    Tie,
}

/// Both scores and which vessel, if either, kept closer to its proposed speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComplianceComparison {
    pub vessel_code1: i64,
    pub score1: f64,
    pub vessel_code2: i64,
    pub score2: f64,
    pub outcome: ComplianceOutcome,
}

impl ComplianceComparison {
    pub fn winner(&self) -> Option<i64> {
        match self.outcome {
            ComplianceOutcome::Winner { vessel_code } => Some(vessel_code),
            ComplianceOutcome::Tie => None,
        }
    }
}

impl fmt::Display for ComplianceComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (winner, best, loser, worst) = match self.winner() {
            Some(code) if code == self.vessel_code1 => {
                (self.vessel_code1, self.score1, self.vessel_code2, self.score2)
            }
            Some(_) => (self.vessel_code2, self.score2, self.vessel_code1, self.score1),
            None => {
                return write!(
                    f,
                    "Both vessels have the same compliance score of {:?}%.",
                    self.score1
                )
            }
        };
        write!(
            f,
            "Vessel {winner} is more compliant with a compliance score of {best:?}% \
             compared to Vessel {loser}'s score of {worst:?}%."
        )
    }
}

/// Compare two vessels' compliance scores. Both must have cleansed rows.
pub fn compare_compliance(
    snapshot: &Snapshot,
    vessel_code1: i64,
    vessel_code2: i64,
) -> Result<ComplianceComparison> {
    for code in [vessel_code1, vessel_code2] {
        if !snapshot.filtered().contains_vessel(code) {
            return Err(Error::vessel_not_found(code));
        }
    }

    let score1 = compliance_score(snapshot, vessel_code1);
    let score2 = compliance_score(snapshot, vessel_code2);
    let outcome = match score1.partial_cmp(&score2) {
        Some(Ordering::Greater) => ComplianceOutcome::Winner {
            vessel_code: vessel_code1,
        },
        Some(Ordering::Less) => ComplianceOutcome::Winner {
            vessel_code: vessel_code2,
        },
        _ => ComplianceOutcome::Tie,
    };

    Ok(ComplianceComparison {
        vessel_code1,
        score1,
        vessel_code2,
        score2,
        outcome,
    })
}

// ---------------------------------------------------------------------------
// Time windows
// ---------------------------------------------------------------------------

/// A row inside a time window; filtered rows also carry their speed deviation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowRow<'a> {
    #[serde(flatten)]
    pub record: &'a Record,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_difference: Option<f64>,
}

/// Rows of a vessel with `start <= datetime <= end` from the chosen view.
///
/// Fails with a format error when the datetime column did not load as
/// timestamps. An empty window is not an error.
pub fn window_metrics<'a>(
    snapshot: &'a Snapshot,
    vessel_code: i64,
    start: NaiveDateTime,
    end: NaiveDateTime,
    source: Source,
) -> Result<Vec<WindowRow<'a>>> {
    let table = snapshot.table(source);
    if table.schema.kind(Column::Datetime) != Some(ColumnKind::Temporal) {
        error!("datetime column in incorrect format");
        return Err(Error::Format("datetime column in incorrect format".into()));
    }

    Ok(table
        .for_vessel(vessel_code)
        .filter(|r| r.datetime.is_some_and(|ts| start <= ts && ts <= end))
        .map(|r| WindowRow {
            record: r.as_ref(),
            speed_difference: match source {
                Source::Filtered => r.speed_difference(),
                Source::Raw => None,
            },
        })
        .collect())
}
