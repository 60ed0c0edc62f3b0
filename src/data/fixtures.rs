//! Hand-built telemetry for unit tests.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use super::model::{Record, Schema, Table};

pub fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 6, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .expect("valid fixture timestamp")
}

/// A fully valid row; identical measurements across rows so no column has
/// any spread for the outlier check to act on.
pub fn telemetry(row: usize, vessel_code: i64) -> Record {
    Record {
        row,
        vessel_code: Some(vessel_code),
        datetime: Some(at(1, 0, 0) + TimeDelta::minutes(row as i64)),
        latitude: Some(10.25),
        longitude: Some(-14.75),
        power: Some(100.0),
        fuel_consumption: Some(5.0),
        actual_speed_overground: Some(10.0),
        proposed_speed_overground: Some(10.0),
        predicted_fuel_consumption: Some(5.0),
        ..Record::default()
    }
}

/// Renumber rows by position and wrap them in a complete-schema table.
pub fn table(records: Vec<Record>) -> Table {
    let records = records
        .into_iter()
        .enumerate()
        .map(|(i, r)| Record { row: i, ..r })
        .collect();
    Table::new(Schema::complete(), records)
}
