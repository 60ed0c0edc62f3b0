//! Writes a synthetic telemetry dataset with the defects the cleansing
//! pipeline looks for: negative readings, gaps, spikes and impossible
//! coordinates.
//!
//! Usage: `generate_sample [OUTPUT]` (`.csv` or `.parquet`, default
//! `data/vessel_data.csv`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use parquet::arrow::ArrowWriter;
use serde::Serialize;

const VESSELS: [(i64, f64, f64); 3] = [(3001, 10.29, -14.79), (19310, 49.28, -123.18), (7002, -33.86, 151.21)];
const ROWS_PER_VESSEL: usize = 1440;

#[derive(Debug, Serialize)]
struct TelemetryRow {
    vessel_code: Option<i64>,
    #[serde(skip)]
    timestamp: Option<NaiveDateTime>,
    datetime: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    power: Option<f64>,
    fuel_consumption: Option<f64>,
    actual_speed_overground: Option<f64>,
    proposed_speed_overground: Option<f64>,
    predicted_fuel_consumption: Option<f64>,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

fn generate(rng: &mut SimpleRng) -> Vec<TelemetryRow> {
    let start = NaiveDate::from_ymd_opt(2023, 6, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    let mut rows = Vec::with_capacity(VESSELS.len() * ROWS_PER_VESSEL);

    for &(vessel_code, lat0, lon0) in &VESSELS {
        let mut gap_left = 0usize;
        for minute in 0..ROWS_PER_VESSEL {
            let ts = start + TimeDelta::minutes(minute as i64);
            let proposed = 12.0 + rng.gauss(0.0, 0.5);
            let actual = proposed + rng.gauss(0.0, 0.8);
            let power = 4000.0 + 300.0 * actual + rng.gauss(0.0, 150.0);
            let fuel = power * 0.0002 + rng.gauss(0.0, 0.05);

            let mut row = TelemetryRow {
                vessel_code: Some(vessel_code),
                timestamp: Some(ts),
                datetime: Some(ts.format("%Y-%m-%d %H:%M:%S").to_string()),
                latitude: Some(lat0 + minute as f64 * 0.001),
                longitude: Some(lon0 + minute as f64 * 0.001),
                power: Some(power),
                fuel_consumption: Some(fuel),
                actual_speed_overground: Some(actual),
                proposed_speed_overground: Some(proposed),
                predicted_fuel_consumption: Some(fuel + rng.gauss(0.0, 0.02)),
            };

            // sensor dropouts come in stretches
            if gap_left == 0 && rng.chance(0.004) {
                gap_left = 1 + (rng.next_u64() % 6) as usize;
            }
            if gap_left > 0 {
                row.fuel_consumption = None;
                gap_left -= 1;
            }
            if rng.chance(0.01) {
                row.proposed_speed_overground = Some(-rng.next_f64());
            }
            if rng.chance(0.005) {
                row.power = Some(power * 5.0);
            }
            if rng.chance(0.002) {
                row.latitude = Some(90.0 + rng.next_f64() * 10.0);
            }
            if rng.chance(0.002) {
                row.longitude = Some(-180.0 - rng.next_f64() * 10.0);
            }
            rows.push(row);
        }
    }
    rows
}

fn write_csv(path: &Path, rows: &[TelemetryRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    for row in rows {
        writer.serialize(row).context("writing CSV row")?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

fn write_parquet(path: &Path, rows: &[TelemetryRow]) -> Result<()> {
    fn floats(rows: &[TelemetryRow], f: impl Fn(&TelemetryRow) -> Option<f64>) -> ArrayRef {
        Arc::new(Float64Array::from(rows.iter().map(f).collect::<Vec<_>>()))
    }

    let timestamps: Vec<Option<i64>> = rows
        .iter()
        .map(|r| r.timestamp.map(|t| t.and_utc().timestamp_millis()))
        .collect();

    let float_field = |name: &str| Field::new(name, DataType::Float64, true);
    let schema = Arc::new(Schema::new(vec![
        Field::new("vessel_code", DataType::Int64, true),
        Field::new("datetime", DataType::Timestamp(TimeUnit::Millisecond, None), true),
        float_field("latitude"),
        float_field("longitude"),
        float_field("power"),
        float_field("fuel_consumption"),
        float_field("actual_speed_overground"),
        float_field("proposed_speed_overground"),
        float_field("predicted_fuel_consumption"),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(
                rows.iter().map(|r| r.vessel_code).collect::<Vec<_>>(),
            )),
            Arc::new(TimestampMillisecondArray::from(timestamps)),
            floats(rows, |r| r.latitude),
            floats(rows, |r| r.longitude),
            floats(rows, |r| r.power),
            floats(rows, |r| r.fuel_consumption),
            floats(rows, |r| r.actual_speed_overground),
            floats(rows, |r| r.proposed_speed_overground),
            floats(rows, |r| r.predicted_fuel_consumption),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path).context("creating output file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing writer")?;
    Ok(())
}

fn main() -> Result<()> {
    let output = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data/vessel_data.csv"));
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).context("creating output directory")?;
    }

    let mut rng = SimpleRng::new(42);
    let rows = generate(&mut rng);

    match output.extension().and_then(|e| e.to_str()) {
        Some("csv") => write_csv(&output, &rows)?,
        Some("parquet") | Some("pq") => write_parquet(&output, &rows)?,
        other => bail!("Unsupported output extension: {other:?}"),
    }

    println!(
        "Wrote {} telemetry rows for {} vessels to {}",
        rows.len(),
        VESSELS.len(),
        output.display()
    );
    Ok(())
}
