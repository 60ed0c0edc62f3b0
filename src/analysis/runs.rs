use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::data::model::{Column, Table};
use crate::error::{Error, Result};
use crate::stats::Moments;

/// What makes a row problematic for run detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemKind {
    MissingValues,
    Outliers,
}

impl ProblemKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProblemKind::MissingValues => "missing_values",
            ProblemKind::Outliers => "outliers",
        }
    }
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProblemKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "missing_values" => Ok(ProblemKind::MissingValues),
            "outliers" => Ok(ProblemKind::Outliers),
            other => Err(Error::InvalidArgument(format!(
                "Unsupported problem type specified: '{other}'."
            ))),
        }
    }
}

/// A maximal run of consecutive problematic rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProblemGroup {
    /// Position of the run among all runs (problematic or not), from 1.
    pub group_id: usize,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProblemSummary {
    pub problem_type: ProblemKind,
    pub column_name: Column,
    pub number_of_groups: usize,
    pub largest_group_size: usize,
    /// Largest first; equal sizes keep run order.
    pub groups: Vec<ProblemGroup>,
}

/// Find runs of problematic values in one vessel's rows.
///
/// Reads the table through a vessel-scoped iterator, so the table itself is
/// left as it is. Outliers are judged against the vessel's own values.
pub fn detect(
    table: &Table,
    vessel_code: i64,
    column: Column,
    kind: ProblemKind,
) -> Result<ProblemSummary> {
    let flags = problem_flags(table, vessel_code, column, kind)?;
    let groups = problem_groups(&flags);

    Ok(ProblemSummary {
        problem_type: kind,
        column_name: column,
        number_of_groups: groups.len(),
        largest_group_size: groups.first().map_or(0, |g| g.size),
        groups,
    })
}

/// One flag per vessel row, in original order.
pub fn problem_flags(
    table: &Table,
    vessel_code: i64,
    column: Column,
    kind: ProblemKind,
) -> Result<Vec<bool>> {
    let Some(column_kind) = table.schema.kind(column) else {
        return Err(Error::InvalidArgument(format!(
            "Column '{column}' is not present in the dataset."
        )));
    };

    match kind {
        ProblemKind::MissingValues => Ok(table
            .for_vessel(vessel_code)
            .map(|r| r.is_missing(column))
            .collect()),
        ProblemKind::Outliers => {
            if !column_kind.is_numeric() {
                return Err(Error::InvalidArgument(format!(
                    "Column '{column}' is not numeric; outliers cannot be computed."
                )));
            }
            let values: Vec<Option<f64>> = table
                .for_vessel(vessel_code)
                .map(|r| r.numeric(column).filter(|v| !v.is_nan()))
                .collect();
            let sample: Vec<f64> = values.iter().flatten().copied().collect();
            let Some(moments) = Moments::of(&sample) else {
                return Ok(vec![false; values.len()]);
            };
            Ok(values
                .iter()
                .map(|v| v.is_some_and(|v| moments.is_outlier(v)))
                .collect())
        }
    }
}

/// Run-length grouping: a new group starts whenever the flag changes.
/// Only runs of `true` are reported.
pub fn problem_groups(flags: &[bool]) -> Vec<ProblemGroup> {
    let mut groups: Vec<ProblemGroup> = Vec::new();
    let mut group_id = 0;
    let mut previous = None;

    for &flag in flags {
        if previous != Some(flag) {
            group_id += 1;
            if flag {
                groups.push(ProblemGroup { group_id, size: 0 });
            }
        }
        if let (true, Some(group)) = (flag, groups.last_mut()) {
            group.size += 1;
        }
        previous = Some(flag);
    }

    groups.sort_by(|a, b| b.size.cmp(&a.size));
    groups
}
