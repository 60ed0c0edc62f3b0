use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::model::Column;

// ---------------------------------------------------------------------------
// ProblemType – why a row was removed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    BelowZero,
    MissingValue,
    Outlier,
    InvalidLatitude,
    InvalidLongitude,
}

impl ProblemType {
    pub fn name(&self) -> &'static str {
        match self {
            ProblemType::BelowZero => "below_zero",
            ProblemType::MissingValue => "missing_value",
            ProblemType::Outlier => "outlier",
            ProblemType::InvalidLatitude => "invalid_latitude",
            ProblemType::InvalidLongitude => "invalid_longitude",
        }
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

type ColumnCounts = BTreeMap<Column, usize>;

/// Per-vessel record of removed rows: vessel → problem → column → count.
///
/// Counts are conditions observed, so a row that breaks two columns of the
/// same check is counted under both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidDataLedger {
    entries: BTreeMap<i64, BTreeMap<ProblemType, ColumnCounts>>,
    /// Removal events for rows that had no vessel_code to file them under.
    unattributed: usize,
}

impl InvalidDataLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` removals. Zero counts leave no trace.
    pub fn record(&mut self, vessel_code: i64, problem: ProblemType, column: Column, count: usize) {
        if count == 0 {
            return;
        }
        *self
            .entries
            .entry(vessel_code)
            .or_default()
            .entry(problem)
            .or_default()
            .entry(column)
            .or_default() += count;
    }

    pub fn record_unattributed(&mut self, count: usize) {
        self.unattributed += count;
    }

    /// Fold another ledger (typically one stage's delta) into this one.
    pub fn merge(&mut self, delta: InvalidDataLedger) {
        for (vessel, problems) in delta.entries {
            for (problem, columns) in problems {
                for (column, count) in columns {
                    self.record(vessel, problem, column, count);
                }
            }
        }
        self.unattributed += delta.unattributed;
    }

    /// Problems recorded for a vessel, columns ordered by descending count.
    pub fn query(&self, vessel_code: i64) -> Option<VesselProblems> {
        let problems = self.entries.get(&vessel_code)?;
        let sorted = problems
            .iter()
            .map(|(problem, columns)| {
                let mut counts: Vec<ColumnCount> = columns
                    .iter()
                    .map(|(column, count)| ColumnCount {
                        column: *column,
                        count: *count,
                    })
                    .collect();
                counts.sort_by(|a, b| b.count.cmp(&a.count));
                (*problem, counts)
            })
            .collect();
        Some(VesselProblems(sorted))
    }

    pub fn count(&self, vessel_code: i64, problem: ProblemType, column: Column) -> usize {
        self.entries
            .get(&vessel_code)
            .and_then(|p| p.get(&problem))
            .and_then(|c| c.get(&column))
            .copied()
            .unwrap_or(0)
    }

    pub fn vessels(&self) -> impl Iterator<Item = i64> + '_ {
        self.entries.keys().copied()
    }

    pub fn unattributed(&self) -> usize {
        self.unattributed
    }

    /// Sum of every counter, including unattributed removals.
    pub fn total_events(&self) -> usize {
        self.entries
            .values()
            .flat_map(|p| p.values())
            .flat_map(|c| c.values())
            .sum::<usize>()
            + self.unattributed
    }

    /// Totals per problem type across all vessels.
    pub fn totals_by_problem(&self) -> BTreeMap<ProblemType, usize> {
        let mut totals = BTreeMap::new();
        for problems in self.entries.values() {
            for (problem, columns) in problems {
                *totals.entry(*problem).or_default() += columns.values().sum::<usize>();
            }
        }
        totals
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.unattributed == 0
    }
}

/// One column's removal count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnCount {
    pub column: Column,
    pub count: usize,
}

/// Answer to a ledger query for one vessel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VesselProblems(pub BTreeMap<ProblemType, Vec<ColumnCount>>);

impl VesselProblems {
    pub fn get(&self, problem: ProblemType) -> Option<&[ColumnCount]> {
        self.0.get(&problem).map(Vec::as_slice)
    }

    pub fn problems(&self) -> impl Iterator<Item = ProblemType> + '_ {
        self.0.keys().copied()
    }
}
