use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::Error;

// ---------------------------------------------------------------------------
// Column – the known telemetry columns
// ---------------------------------------------------------------------------

/// One of the nine telemetry columns, in source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    VesselCode,
    Datetime,
    Latitude,
    Longitude,
    Power,
    FuelConsumption,
    ActualSpeedOverground,
    ProposedSpeedOverground,
    PredictedFuelConsumption,
}

impl Column {
    pub const ALL: [Column; 9] = [
        Column::VesselCode,
        Column::Datetime,
        Column::Latitude,
        Column::Longitude,
        Column::Power,
        Column::FuelConsumption,
        Column::ActualSpeedOverground,
        Column::ProposedSpeedOverground,
        Column::PredictedFuelConsumption,
    ];

    /// Performance columns that can never legitimately be negative.
    pub const MEASUREMENTS: [Column; 5] = [
        Column::Power,
        Column::FuelConsumption,
        Column::ActualSpeedOverground,
        Column::ProposedSpeedOverground,
        Column::PredictedFuelConsumption,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::VesselCode => "vessel_code",
            Column::Datetime => "datetime",
            Column::Latitude => "latitude",
            Column::Longitude => "longitude",
            Column::Power => "power",
            Column::FuelConsumption => "fuel_consumption",
            Column::ActualSpeedOverground => "actual_speed_overground",
            Column::ProposedSpeedOverground => "proposed_speed_overground",
            Column::PredictedFuelConsumption => "predicted_fuel_consumption",
        }
    }

    /// The kind a well-formed source column loads as.
    pub fn expected_kind(&self) -> ColumnKind {
        match self {
            Column::VesselCode => ColumnKind::Integer,
            Column::Datetime => ColumnKind::Temporal,
            _ => ColumnKind::Float,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| Error::InvalidArgument(format!("Unknown column name: {s}")))
    }
}

// ---------------------------------------------------------------------------
// Schema – which columns were loaded, and as what
// ---------------------------------------------------------------------------

/// How a column's cells were interpreted at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Integer,
    Float,
    Temporal,
    /// At least one non-empty cell failed to coerce; the column is opaque text.
    Text,
}

impl ColumnKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }
}

/// Column → kind for every column present in the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    kinds: BTreeMap<Column, ColumnKind>,
}

impl Schema {
    /// Every column present with its expected kind.
    pub fn complete() -> Self {
        Column::ALL
            .into_iter()
            .map(|c| (c, c.expected_kind()))
            .collect()
    }

    pub fn insert(&mut self, column: Column, kind: ColumnKind) {
        self.kinds.insert(column, kind);
    }

    pub fn kind(&self, column: Column) -> Option<ColumnKind> {
        self.kinds.get(&column).copied()
    }

    pub fn contains(&self, column: Column) -> bool {
        self.kinds.contains_key(&column)
    }

    pub fn columns(&self) -> impl Iterator<Item = (Column, ColumnKind)> + '_ {
        self.kinds.iter().map(|(c, k)| (*c, *k))
    }
}

impl FromIterator<(Column, ColumnKind)> for Schema {
    fn from_iter<I: IntoIterator<Item = (Column, ColumnKind)>>(iter: I) -> Self {
        Schema {
            kinds: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Record – one row of telemetry
// ---------------------------------------------------------------------------

/// A single telemetry row. `None` means the cell was empty in the source.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    /// 0-based position in the source file.
    #[serde(skip)]
    pub row: usize,
    pub vessel_code: Option<i64>,
    #[serde(serialize_with = "timestamp::serialize")]
    pub datetime: Option<NaiveDateTime>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub power: Option<f64>,
    pub fuel_consumption: Option<f64>,
    pub actual_speed_overground: Option<f64>,
    pub proposed_speed_overground: Option<f64>,
    pub predicted_fuel_consumption: Option<f64>,
    /// Non-empty cells that could not be coerced to their column's type.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub unparsed: BTreeMap<Column, String>,
}

impl Record {
    /// Numeric value of a column, if it has one.
    pub fn numeric(&self, column: Column) -> Option<f64> {
        match column {
            Column::VesselCode => self.vessel_code.map(|v| v as f64),
            Column::Datetime => None,
            Column::Latitude => self.latitude,
            Column::Longitude => self.longitude,
            Column::Power => self.power,
            Column::FuelConsumption => self.fuel_consumption,
            Column::ActualSpeedOverground => self.actual_speed_overground,
            Column::ProposedSpeedOverground => self.proposed_speed_overground,
            Column::PredictedFuelConsumption => self.predicted_fuel_consumption,
        }
    }

    /// Set one of the float columns. Ignored for vessel_code and datetime.
    pub fn set_float(&mut self, column: Column, value: Option<f64>) {
        let slot = match column {
            Column::Latitude => &mut self.latitude,
            Column::Longitude => &mut self.longitude,
            Column::Power => &mut self.power,
            Column::FuelConsumption => &mut self.fuel_consumption,
            Column::ActualSpeedOverground => &mut self.actual_speed_overground,
            Column::ProposedSpeedOverground => &mut self.proposed_speed_overground,
            Column::PredictedFuelConsumption => &mut self.predicted_fuel_consumption,
            Column::VesselCode | Column::Datetime => return,
        };
        *slot = value;
    }

    /// True when the source cell was empty (or NaN).
    pub fn is_missing(&self, column: Column) -> bool {
        if self.unparsed.contains_key(&column) {
            return false;
        }
        match column {
            Column::Datetime => self.datetime.is_none(),
            other => self.numeric(other).map_or(true, f64::is_nan),
        }
    }

    /// |actual − proposed|, when both speeds are present.
    pub fn speed_difference(&self) -> Option<f64> {
        Some((self.actual_speed_overground? - self.proposed_speed_overground?).abs())
    }
}

mod timestamp {
    use chrono::NaiveDateTime;
    use serde::Serializer;

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(value: &Option<NaiveDateTime>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => s.collect_str(&ts.format(FORMAT)),
            None => s.serialize_none(),
        }
    }
}

// ---------------------------------------------------------------------------
// Table – an ordered, shared sequence of records
// ---------------------------------------------------------------------------

/// Ordered records plus the schema they were loaded with.
///
/// Records are reference counted: a table derived from another shares the
/// very same rows, it never copies or edits them.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub schema: Schema,
    records: Vec<Arc<Record>>,
}

impl Table {
    pub fn new(schema: Schema, records: Vec<Record>) -> Self {
        Table {
            schema,
            records: records.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn empty() -> Self {
        Table::default()
    }

    /// Build a table over rows already owned by another table.
    pub fn from_shared(schema: Schema, records: Vec<Arc<Record>>) -> Self {
        Table { schema, records }
    }

    pub fn records(&self) -> &[Arc<Record>] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Record>> {
        self.records.iter()
    }

    /// Rows belonging to one vessel, in original order.
    pub fn for_vessel(&self, vessel_code: i64) -> impl Iterator<Item = &Arc<Record>> {
        self.records
            .iter()
            .filter(move |r| r.vessel_code == Some(vessel_code))
    }

    pub fn contains_vessel(&self, vessel_code: i64) -> bool {
        self.for_vessel(vessel_code).next().is_some()
    }

    /// A new table keeping the rows whose mask entry is `true`.
    pub fn select(&self, keep: &[bool]) -> Table {
        let records = self
            .records
            .iter()
            .zip(keep)
            .filter(|(_, keep)| **keep)
            .map(|(r, _)| Arc::clone(r))
            .collect();
        Table::from_shared(self.schema.clone(), records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
