use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;

use super::ledger::{InvalidDataLedger, ProblemType};
use super::model::{Column, Record, Table};
use crate::error::{Error, Result};
use crate::stats::Moments;

// ---------------------------------------------------------------------------
// Stage – one kind of cleansing check
// ---------------------------------------------------------------------------

/// A cleansing check, applied column by column over the rows that reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    BelowZero,
    MissingValue,
    Outlier,
    InvalidLatitude,
    InvalidLongitude,
}

impl Stage {
    /// Execution order of a full cleansing run.
    pub const ORDER: [Stage; 5] = [
        Stage::BelowZero,
        Stage::MissingValue,
        Stage::Outlier,
        Stage::InvalidLatitude,
        Stage::InvalidLongitude,
    ];

    pub fn problem(&self) -> ProblemType {
        match self {
            Stage::BelowZero => ProblemType::BelowZero,
            Stage::MissingValue => ProblemType::MissingValue,
            Stage::Outlier => ProblemType::Outlier,
            Stage::InvalidLatitude => ProblemType::InvalidLatitude,
            Stage::InvalidLongitude => ProblemType::InvalidLongitude,
        }
    }

    /// Columns inspected, in order. Latitude and longitude are left out of
    /// the sign check since negative coordinates are valid.
    pub fn columns(&self) -> &'static [Column] {
        match self {
            Stage::BelowZero | Stage::Outlier => &Column::MEASUREMENTS,
            Stage::MissingValue => &Column::ALL,
            Stage::InvalidLatitude => &[Column::Latitude],
            Stage::InvalidLongitude => &[Column::Longitude],
        }
    }

    /// Run this stage over `table`, returning survivors plus what was removed.
    pub fn apply(&self, table: &Table) -> StageOutcome {
        let problem = self.problem();
        let records = table.records();
        let mut alive = vec![true; records.len()];
        let mut delta = InvalidDataLedger::new();
        let mut removals = Vec::new();
        let mut skipped = Vec::new();

        for &column in self.columns() {
            let flags = match self.flag(table, column, &alive) {
                Ok(flags) => flags,
                Err(e) => {
                    warn!("Skipping {problem} check: {e}");
                    skipped.push(e);
                    continue;
                }
            };

            let mut per_vessel: BTreeMap<Option<i64>, usize> = BTreeMap::new();
            for (i, record) in records.iter().enumerate() {
                if !flags[i] {
                    continue;
                }
                *per_vessel.entry(record.vessel_code).or_default() += 1;
                if alive[i] {
                    alive[i] = false;
                    removals.push(Removal {
                        row: record.row,
                        vessel_code: record.vessel_code,
                        problem,
                        column,
                    });
                }
            }

            for (vessel_code, count) in per_vessel {
                match vessel_code {
                    Some(code) => delta.record(code, problem, column, count),
                    None => {
                        debug!("{count} {problem} rows in '{column}' have no vessel_code");
                        delta.record_unattributed(count);
                    }
                }
            }
        }

        StageOutcome {
            kept: table.select(&alive),
            delta,
            removals,
            skipped,
        }
    }

    /// Per-row condition for one column over every row entering the stage.
    /// `alive` marks rows not yet removed by an earlier column of this stage.
    fn flag(&self, table: &Table, column: Column, alive: &[bool]) -> Result<Vec<bool>> {
        let kind = table.schema.kind(column).ok_or_else(|| Error::Column {
            column,
            reason: "not present in the dataset".into(),
        })?;
        if *self != Stage::MissingValue && !kind.is_numeric() {
            return Err(Error::Column {
                column,
                reason: format!("expected a numeric column, found {kind:?}"),
            });
        }

        let records = table.records();
        let flags: Vec<bool> = match self {
            Stage::BelowZero => records
                .iter()
                .map(|r| r.numeric(column).is_some_and(|v| v < 0.0))
                .collect(),
            Stage::MissingValue => records.iter().map(|r| r.is_missing(column)).collect(),
            Stage::InvalidLatitude => out_of_range(records, column, 90.0),
            Stage::InvalidLongitude => out_of_range(records, column, 180.0),
            Stage::Outlier => {
                let sample: Vec<f64> = records
                    .iter()
                    .zip(alive)
                    .filter(|(r, live)| **live && !r.is_missing(column))
                    .filter_map(|(r, _)| r.numeric(column))
                    .collect();
                let Some(moments) = Moments::of(&sample) else {
                    return Ok(vec![false; records.len()]);
                };
                if !moments.is_finite() {
                    return Err(Error::Computation {
                        column,
                        reason: format!(
                            "non-finite statistics (mean {}, std {})",
                            moments.mean, moments.std_dev
                        ),
                    });
                }
                records
                    .iter()
                    .map(|r| {
                        !r.is_missing(column)
                            && r.numeric(column).is_some_and(|v| moments.is_outlier(v))
                    })
                    .collect()
            }
        };
        Ok(flags)
    }
}

fn out_of_range(records: &[Arc<Record>], column: Column, bound: f64) -> Vec<bool> {
    records
        .iter()
        .map(|r| r.numeric(column).is_some_and(|v| v < -bound || v > bound))
        .collect()
}

/// Provenance of one removed row: the stage and column that first flagged it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Removal {
    pub row: usize,
    pub vessel_code: Option<i64>,
    pub problem: ProblemType,
    pub column: Column,
}

/// Result of applying a single stage.
#[derive(Debug)]
pub struct StageOutcome {
    pub kept: Table,
    pub delta: InvalidDataLedger,
    pub removals: Vec<Removal>,
    /// Column checks that could not run.
    pub skipped: Vec<Error>,
}

// ---------------------------------------------------------------------------
// FilterPipeline – the ordered fold over stages
// ---------------------------------------------------------------------------

/// Everything a cleansing run produces.
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    pub filtered: Table,
    pub ledger: InvalidDataLedger,
    /// One entry per removed row, in removal order.
    pub removals: Vec<Removal>,
    pub skipped: Vec<Error>,
}

#[derive(Debug, Clone)]
pub struct FilterPipeline {
    stages: Vec<Stage>,
}

impl Default for FilterPipeline {
    fn default() -> Self {
        FilterPipeline {
            stages: Stage::ORDER.to_vec(),
        }
    }
}

impl FilterPipeline {
    /// A pipeline running only the given stages, in the given order.
    pub fn with_stages(stages: Vec<Stage>) -> Self {
        FilterPipeline { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Apply every stage cumulatively; each sees only the previous survivors.
    pub fn run(&self, raw: &Table) -> PipelineOutcome {
        let start = PipelineOutcome {
            filtered: raw.clone(),
            ..PipelineOutcome::default()
        };

        self.stages.iter().fold(start, |mut acc, stage| {
            let before = acc.filtered.len();
            let outcome = stage.apply(&acc.filtered);
            info!(
                "{}: removed {} rows, {} remain",
                stage.problem(),
                before - outcome.kept.len(),
                outcome.kept.len()
            );
            acc.filtered = outcome.kept;
            acc.ledger.merge(outcome.delta);
            acc.removals.extend(outcome.removals);
            acc.skipped.extend(outcome.skipped);
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{table, telemetry};
    use crate::data::model::{ColumnKind, Schema};

    fn run(table: &Table) -> PipelineOutcome {
        FilterPipeline::default().run(table)
    }

    #[test]
    fn negative_power_is_removed_and_recorded() {
        let mut rows: Vec<Record> = (0..5).map(|i| telemetry(i, 3001)).collect();
        rows[2].power = Some(-5.0);
        let raw = table(rows);

        let out = run(&raw);

        assert_eq!(out.filtered.len(), 4);
        let problems = out.ledger.query(3001).unwrap();
        assert_eq!(problems.problems().collect::<Vec<_>>(), vec![ProblemType::BelowZero]);
        let power = problems.get(ProblemType::BelowZero).unwrap();
        assert_eq!(power.len(), 1);
        assert_eq!(power[0].column, Column::Power);
        assert_eq!(power[0].count, 1);
        assert_eq!(out.removals[0].row, 2);
    }

    #[test]
    fn earlier_stage_claims_rows_failing_several_checks() {
        let mut rows: Vec<Record> = (0..4).map(|i| telemetry(i, 7)).collect();
        rows[1].power = Some(-1.0);
        rows[1].fuel_consumption = None;
        let out = run(&table(rows));

        assert_eq!(out.ledger.count(7, ProblemType::BelowZero, Column::Power), 1);
        assert_eq!(
            out.ledger.count(7, ProblemType::MissingValue, Column::FuelConsumption),
            0
        );
        assert_eq!(out.filtered.len(), 3);
    }

    #[test]
    fn one_row_breaking_two_columns_counts_twice_but_leaves_once() {
        let mut rows: Vec<Record> = (0..3).map(|i| telemetry(i, 7)).collect();
        rows[0].power = Some(-1.0);
        rows[0].fuel_consumption = Some(-2.0);
        let out = run(&table(rows));

        assert_eq!(out.ledger.count(7, ProblemType::BelowZero, Column::Power), 1);
        assert_eq!(out.ledger.count(7, ProblemType::BelowZero, Column::FuelConsumption), 1);
        assert_eq!(out.removals.len(), 1);
        assert_eq!(out.removals[0].column, Column::Power);
        assert_eq!(out.filtered.len() + out.removals.len(), 3);
    }

    #[test]
    fn z_score_of_exactly_two_is_kept() {
        // mean 5, population std 2: the 9.0 sits at z = 2 exactly
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let rows = values
            .iter()
            .enumerate()
            .map(|(i, v)| Record {
                power: Some(*v),
                ..telemetry(i, 1)
            })
            .collect();
        let out = run(&table(rows));

        assert_eq!(out.filtered.len(), values.len());
        assert!(out.ledger.is_empty());
    }

    #[test]
    fn spike_is_removed_as_outlier() {
        // nine 10s and a 100: mean 19, std 27, z(100) = 3
        let rows = (0..10)
            .map(|i| Record {
                power: Some(if i == 9 { 100.0 } else { 10.0 }),
                ..telemetry(i, 1)
            })
            .collect();
        let out = run(&table(rows));

        assert_eq!(out.filtered.len(), 9);
        assert_eq!(out.ledger.count(1, ProblemType::Outlier, Column::Power), 1);
        assert_eq!(out.removals[0].row, 9);
    }

    #[test]
    fn coordinate_bounds_are_inclusive() {
        let mut rows: Vec<Record> = (0..6).map(|i| telemetry(i, 5)).collect();
        rows[0].latitude = Some(90.0);
        rows[1].latitude = Some(90.0001);
        rows[2].longitude = Some(-180.0);
        rows[3].longitude = Some(-180.0001);
        rows[4].latitude = Some(-90.0);
        let out = run(&table(rows));

        let kept: Vec<usize> = out.filtered.iter().map(|r| r.row).collect();
        assert_eq!(kept, vec![0, 2, 4, 5]);
        assert_eq!(out.ledger.count(5, ProblemType::InvalidLatitude, Column::Latitude), 1);
        assert_eq!(out.ledger.count(5, ProblemType::InvalidLongitude, Column::Longitude), 1);
    }

    #[test]
    fn clean_data_passes_untouched() {
        let raw = table((0..4).map(|i| telemetry(i, 9)).collect());
        let out = run(&raw);

        assert!(out.ledger.is_empty());
        assert!(out.removals.is_empty());
        assert_eq!(out.filtered.len(), raw.len());
        for (kept, original) in out.filtered.iter().zip(raw.iter()) {
            assert!(Arc::ptr_eq(kept, original));
        }
    }

    #[test]
    fn text_column_is_skipped_without_stopping_other_checks() {
        let mut rows: Vec<Record> = (0..3).map(|i| telemetry(i, 2)).collect();
        rows[0].power = None;
        rows[0].unparsed.insert(Column::Power, "high".into());
        rows[1].fuel_consumption = Some(-1.0);
        let mut raw = table(rows);
        raw.schema.insert(Column::Power, ColumnKind::Text);

        let out = run(&raw);

        assert_eq!(out.ledger.count(2, ProblemType::BelowZero, Column::FuelConsumption), 1);
        assert_eq!(out.filtered.len(), 2);
        // below_zero and outlier both skip the text column
        let skipped_power = out
            .skipped
            .iter()
            .filter(|e| matches!(e, Error::Column { column: Column::Power, .. }))
            .count();
        assert_eq!(skipped_power, 2);
    }

    #[test]
    fn absent_column_is_skipped() {
        let raw = table((0..3).map(|i| telemetry(i, 2)).collect());
        let schema: Schema = raw
            .schema
            .columns()
            .filter(|(c, _)| *c != Column::PredictedFuelConsumption)
            .collect();
        let raw = Table::from_shared(schema, raw.records().to_vec());

        let out = run(&raw);

        assert_eq!(out.filtered.len(), 3);
        assert!(out.skipped.iter().all(|e| matches!(
            e,
            Error::Column {
                column: Column::PredictedFuelConsumption,
                ..
            }
        )));
        // below_zero, missing_value and outlier each skip it
        assert_eq!(out.skipped.len(), 3);
    }

    #[test]
    fn rows_without_vessel_code_are_unattributed() {
        let mut rows: Vec<Record> = (0..3).map(|i| telemetry(i, 4)).collect();
        rows[2].vessel_code = None;
        let raw = table(rows);
        let out = run(&raw);

        assert_eq!(out.ledger.unattributed(), 1);
        assert!(out.ledger.query(4).is_none());
        assert_eq!(out.filtered.len() + out.removals.len(), raw.len());
    }

    #[test]
    fn single_stage_is_independently_applicable() {
        let mut rows: Vec<Record> = (0..3).map(|i| telemetry(i, 4)).collect();
        rows[0].latitude = Some(-91.0);
        rows[1].power = Some(-3.0);
        let raw = table(rows);

        let outcome = Stage::InvalidLatitude.apply(&raw);

        assert_eq!(outcome.kept.len(), 2);
        assert_eq!(outcome.removals.len(), 1);
        assert_eq!(
            outcome.delta.count(4, ProblemType::InvalidLatitude, Column::Latitude),
            1
        );
    }

    #[test]
    fn infinite_reading_skips_outlier_check_for_its_column() {
        let mut rows: Vec<Record> = (0..5).map(|i| telemetry(i, 6)).collect();
        rows[1].actual_speed_overground = Some(f64::INFINITY);
        rows[3].fuel_consumption = Some(-2.0);
        let raw = table(rows);

        let out = run(&raw);

        assert_eq!(out.skipped.len(), 1);
        assert!(matches!(
            out.skipped[0],
            Error::Computation {
                column: Column::ActualSpeedOverground,
                ..
            }
        ));
        // the infinite row is kept; the negative fuel row is still ledgered
        assert_eq!(out.filtered.len(), 4);
        assert!(out.filtered.iter().any(|r| r.row == 1));
        assert_eq!(out.ledger.count(6, ProblemType::BelowZero, Column::FuelConsumption), 1);
    }

    #[test]
    fn partial_pipeline_runs_only_its_stages() {
        let mut rows: Vec<Record> = (0..4).map(|i| telemetry(i, 8)).collect();
        rows[0].power = Some(-1.0);
        rows[2].longitude = Some(200.0);
        let raw = table(rows);

        let pipeline = FilterPipeline::with_stages(vec![Stage::InvalidLongitude]);
        assert_eq!(pipeline.stages(), &[Stage::InvalidLongitude]);
        let out = pipeline.run(&raw);

        assert_eq!(out.filtered.len(), 3);
        assert_eq!(out.ledger.count(8, ProblemType::BelowZero, Column::Power), 0);
        assert_eq!(
            out.ledger.count(8, ProblemType::InvalidLongitude, Column::Longitude),
            1
        );
    }
}
