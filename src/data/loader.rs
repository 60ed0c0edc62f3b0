use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int32Type, Int64Type, TimeUnit, TimestampNanosecondType,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::{debug, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Column, ColumnKind, Record, Schema, Table};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a telemetry table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row with the telemetry column names (recommended)
/// * `.json`    – `[{ "vessel_code": 3001, "datetime": "...", ... }, ...]`
/// * `.parquet` – one column per telemetry field
///
/// Unknown columns are ignored; known columns missing from the file are
/// absent from the table's schema.
pub fn load_file(path: &Path) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let columns = match ext.as_str() {
        "csv" => read_csv(path)?,
        "json" => read_json(path)?,
        "parquet" | "pq" => read_parquet(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };
    Ok(columns.into_table())
}

/// Parse `YYYY-MM-DD HH:MM:SS[.fff]`, the `T`-separated variant, or a bare
/// date (taken as midnight).
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
    let s = s.trim();
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

// ---------------------------------------------------------------------------
// Cells and column assembly
// ---------------------------------------------------------------------------

/// A non-empty source cell before coercion to its column's type.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Int(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl Cell {
    /// Text cell, or `None` for the usual spellings of "no value".
    fn from_text(s: &str) -> Option<Cell> {
        const NA_TOKENS: [&str; 8] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];
        let s = s.trim();
        if NA_TOKENS.contains(&s) {
            None
        } else {
            Some(Cell::Text(s.to_string()))
        }
    }

    fn as_integer(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            // i64::MAX as f64 is 2^63, itself out of range
            Cell::Float(f) if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 => {
                Some(*f as i64)
            }
            Cell::Text(s) => s
                .parse::<i64>()
                .ok()
                .or_else(|| Cell::Float(s.parse().ok()?).as_integer()),
            _ => None,
        }
    }

    fn as_float(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            Cell::Text(s) => s.parse().ok(),
            Cell::Timestamp(_) => None,
        }
    }

    fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::Timestamp(ts) => Some(*ts),
            Cell::Text(s) => parse_timestamp(s),
            // epoch milliseconds, as written by record-oriented JSON exports
            Cell::Int(ms) => DateTime::from_timestamp_millis(*ms).map(|d| d.naive_utc()),
            Cell::Float(_) => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Timestamp(ts) => write!(f, "{ts}"),
            Cell::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Column-major cells for the known columns, as read from a source.
#[derive(Debug, Default)]
struct SourceColumns {
    rows: usize,
    cells: BTreeMap<Column, Vec<Option<Cell>>>,
}

impl SourceColumns {
    fn column_mut(&mut self, column: Column) -> &mut Vec<Option<Cell>> {
        let rows = self.rows;
        self.cells.entry(column).or_insert_with(|| vec![None; rows])
    }

    /// Coerce each column to its expected kind. A column with any cell that
    /// refuses coercion loads as text and keeps the offending cells verbatim.
    fn into_table(self) -> Table {
        let mut records: Vec<Record> = (0..self.rows)
            .map(|row| Record {
                row,
                ..Record::default()
            })
            .collect();
        let mut schema = Schema::default();

        for (column, cells) in self.cells {
            let mut rejected = 0usize;
            for (record, cell) in records.iter_mut().zip(cells) {
                let Some(cell) = cell else { continue };
                if !assign(record, column, &cell) {
                    record.unparsed.insert(column, cell.to_string());
                    rejected += 1;
                }
            }
            let kind = if rejected == 0 {
                column.expected_kind()
            } else {
                warn!("Column '{column}' has {rejected} cells of the wrong type; treating it as text");
                ColumnKind::Text
            };
            schema.insert(column, kind);
        }

        Table::new(schema, records)
    }
}

fn assign(record: &mut Record, column: Column, cell: &Cell) -> bool {
    match column {
        Column::VesselCode => match cell.as_integer() {
            Some(code) => {
                record.vessel_code = Some(code);
                true
            }
            None => false,
        },
        Column::Datetime => match cell.as_timestamp() {
            Some(ts) => {
                record.datetime = Some(ts);
                true
            }
            None => false,
        },
        float => match cell.as_float() {
            Some(v) => {
                record.set_float(float, Some(v));
                true
            }
            None => false,
        },
    }
}

/// Map header names onto known columns, ignoring the rest.
fn known_columns<'a>(names: impl Iterator<Item = &'a str>) -> Vec<(usize, Column)> {
    names
        .enumerate()
        .filter_map(|(i, name)| match name.trim().parse::<Column>() {
            Ok(column) => Some((i, column)),
            Err(_) => {
                debug!("Ignoring unknown column '{name}'");
                None
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CSV reader
// ---------------------------------------------------------------------------

fn read_csv(path: &Path) -> Result<SourceColumns> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers = reader.headers().context("reading CSV headers")?.clone();
    if headers.is_empty() {
        bail!("No columns to parse from file");
    }
    let known = known_columns(headers.iter());

    let mut rows: Vec<csv::StringRecord> = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        rows.push(result.with_context(|| format!("CSV row {row_no}"))?);
    }

    let mut source = SourceColumns {
        rows: rows.len(),
        ..SourceColumns::default()
    };
    for (idx, column) in known {
        let cells = source.column_mut(column);
        for (slot, record) in cells.iter_mut().zip(&rows) {
            *slot = record.get(idx).and_then(Cell::from_text);
        }
    }
    Ok(source)
}

// ---------------------------------------------------------------------------
// JSON reader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, the default `df.to_json(orient='records')` layout.
fn read_json(path: &Path) -> Result<SourceColumns> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;
    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut source = SourceColumns {
        rows: records.len(),
        ..SourceColumns::default()
    };
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for (key, val) in obj {
            let Ok(column) = key.parse::<Column>() else {
                continue;
            };
            source.column_mut(column)[i] = json_to_cell(val);
        }
    }
    Ok(source)
}

fn json_to_cell(val: &JsonValue) -> Option<Cell> {
    match val {
        JsonValue::Null => None,
        JsonValue::String(s) => Cell::from_text(s),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Some(Cell::Int(i)),
            None => n.as_f64().map(Cell::Float),
        },
        other => Some(Cell::Text(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Parquet reader
// ---------------------------------------------------------------------------

/// Works with files written by both Pandas (`df.to_parquet()`) and Polars.
/// Timestamp and date columns of any unit are accepted.
fn read_parquet(path: &Path) -> Result<SourceColumns> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut source = SourceColumns::default();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let known = known_columns(schema.fields().iter().map(|f| f.name().as_str()));
        let offset = source.rows;
        source.rows += batch.num_rows();

        // keep columns absent from this batch aligned with the row count
        for cells in source.cells.values_mut() {
            cells.resize(source.rows, None);
        }

        for (idx, column) in known {
            let array = normalize_temporal(batch.column(idx))
                .with_context(|| format!("converting '{column}' to timestamps"))?;
            let cells = source.column_mut(column);
            cells.resize(offset + batch.num_rows(), None);
            for row in 0..batch.num_rows() {
                cells[offset + row] = extract_cell(&array, row);
            }
        }
    }
    Ok(source)
}

fn normalize_temporal(col: &ArrayRef) -> Result<ArrayRef> {
    match col.data_type() {
        DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => {
            Ok(cast(col, &DataType::Timestamp(TimeUnit::Nanosecond, None))?)
        }
        _ => Ok(col.clone()),
    }
}

fn extract_cell(col: &ArrayRef, row: usize) -> Option<Cell> {
    if col.is_null(row) {
        return None;
    }
    match col.data_type() {
        DataType::Utf8 => Cell::from_text(col.as_string::<i32>().value(row)),
        DataType::LargeUtf8 => Cell::from_text(col.as_string::<i64>().value(row)),
        DataType::Int32 => Some(Cell::Int(col.as_primitive::<Int32Type>().value(row) as i64)),
        DataType::Int64 => Some(Cell::Int(col.as_primitive::<Int64Type>().value(row))),
        DataType::Float32 => Some(Cell::Float(
            col.as_primitive::<Float32Type>().value(row) as f64,
        )),
        DataType::Float64 => Some(Cell::Float(col.as_primitive::<Float64Type>().value(row))),
        DataType::Timestamp(TimeUnit::Nanosecond, _) => col
            .as_primitive::<TimestampNanosecondType>()
            .value_as_datetime(row)
            .map(Cell::Timestamp),
        other => Some(Cell::Text(format!("{other:?}"))),
    }
}
