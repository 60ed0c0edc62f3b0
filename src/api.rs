//! Text-in boundary over the core queries.
//!
//! Arguments arrive as strings (path segments, CLI words) and are coerced
//! here; empty results become `NotFound` so callers can present them.

use chrono::NaiveDateTime;
use log::{info, warn};

use crate::analysis::metrics::{self, ComplianceComparison, SpeedDifference, WindowRow};
use crate::analysis::runs::{self, ProblemKind, ProblemSummary};
use crate::data::ledger::VesselProblems;
use crate::data::loader::parse_timestamp;
use crate::data::model::Column;
use crate::error::{Error, Result};
use crate::snapshot::{Snapshot, Source};

pub fn parse_vessel_code(text: &str) -> Result<i64> {
    let text = text.trim();
    if text.is_empty() {
        warn!("Vessel code cannot be empty.");
        return Err(Error::InvalidArgument("Vessel code cannot be empty.".into()));
    }
    text.parse().map_err(|_| {
        warn!("Invalid vessel code format received: {text}");
        Error::InvalidArgument(format!("Invalid vessel code format: {text}"))
    })
}

/// `YYYY-MM-DD` (midnight) or a full `YYYY-MM-DD HH:MM:SS` timestamp.
pub fn parse_date_bound(text: &str) -> Result<NaiveDateTime> {
    parse_timestamp(text).ok_or_else(|| {
        warn!("Invalid date received: {text}");
        Error::InvalidArgument("Invalid date format. Use YYYY-MM-DD.".into())
    })
}

pub fn invalid_data(snapshot: &Snapshot, vessel_code: &str) -> Result<VesselProblems> {
    let code = parse_vessel_code(vessel_code)?;
    snapshot
        .ledger()
        .query(code)
        .ok_or_else(|| Error::NotFound(format!("No data found for vessel {code}.")))
}

pub fn speed_differences(snapshot: &Snapshot, vessel_code: &str) -> Result<Vec<SpeedDifference>> {
    let code = parse_vessel_code(vessel_code)?;
    let diffs = metrics::speed_differences(snapshot, code);
    if diffs.is_empty() {
        return Err(Error::NotFound(format!(
            "No data found for vessel {code} or no speed differences."
        )));
    }
    Ok(diffs)
}

pub fn compliance_comparison(
    snapshot: &Snapshot,
    vessel_code1: &str,
    vessel_code2: &str,
) -> Result<ComplianceComparison> {
    let code1 = parse_vessel_code(vessel_code1)?;
    let code2 = parse_vessel_code(vessel_code2)?;
    metrics::compare_compliance(snapshot, code1, code2).inspect_err(|e| {
        if let Error::NotFound(_) = e {
            info!("One or both vessel codes do not exist: {code1}, {code2}");
        }
    })
}

pub fn windowed_metrics<'a>(
    snapshot: &'a Snapshot,
    vessel_code: &str,
    start_date: &str,
    end_date: &str,
    source: Source,
) -> Result<Vec<WindowRow<'a>>> {
    let code = parse_vessel_code(vessel_code)?;
    let start = parse_date_bound(start_date)?;
    let end = parse_date_bound(end_date)?;

    let rows = metrics::window_metrics(snapshot, code, start, end, source)?;
    if rows.is_empty() {
        let what = match source {
            Source::Filtered => "data",
            Source::Raw => "raw data",
        };
        return Err(Error::NotFound(format!(
            "No {what} found for this vessel within the specified period."
        )));
    }
    Ok(rows)
}

/// Runs are looked for in the raw view; the filtered view has no missing
/// values left to find.
pub fn problem_groups(
    snapshot: &Snapshot,
    vessel_code: &str,
    column: &str,
    problem_kind: &str,
) -> Result<ProblemSummary> {
    if column.trim().is_empty() {
        warn!("Column name must be specified.");
        return Err(Error::InvalidArgument("Column name must be specified.".into()));
    }
    let code = parse_vessel_code(vessel_code)?;
    let column: Column = column.trim().parse()?;
    let kind: ProblemKind = problem_kind.parse()?;
    runs::detect(snapshot.raw(), code, column, kind)
}
