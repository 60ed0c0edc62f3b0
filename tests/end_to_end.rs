use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use tempfile::{Builder, NamedTempFile};

use vessel_telemetry::analysis::{metrics, runs};
use vessel_telemetry::data::ledger::ProblemType;
use vessel_telemetry::data::model::Column;
use vessel_telemetry::{api, Error, Snapshot, Source};

const HEADER: &str = "vessel_code,datetime,latitude,longitude,power,fuel_consumption,\
actual_speed_overground,proposed_speed_overground,predicted_fuel_consumption";

fn csv_file(rows: &[&str]) -> NamedTempFile {
    let mut file = Builder::new().suffix(".csv").tempfile().expect("temp csv");
    writeln!(file, "{HEADER}").expect("header");
    for row in rows {
        writeln!(file, "{row}").expect("row");
    }
    file
}

fn load(file: &NamedTempFile) -> Snapshot {
    Snapshot::load(file.path()).expect("snapshot loads")
}

#[test]
fn negative_power_row_is_ledgered() {
    let file = csv_file(&[
        "3001,2023-06-01 00:00:00,10.28,-14.78,100,5,10,10,5",
        "3001,2023-06-01 00:01:00,10.28,-14.78,100,5,10,10,5",
        "3001,2023-06-01 00:02:00,10.28,-14.78,-5,5,10,10,5",
        "3001,2023-06-01 00:03:00,10.28,-14.78,100,5,10,10,5",
        "3001,2023-06-01 00:04:00,10.28,-14.78,100,5,10,10,5",
    ]);
    let snapshot = load(&file);

    assert_eq!(snapshot.raw().len(), 5);
    assert_eq!(snapshot.filtered().len(), 4);
    let problems = api::invalid_data(&snapshot, "3001").unwrap();
    assert_eq!(
        serde_json::to_value(&problems).unwrap(),
        serde_json::json!({ "below_zero": [{ "column": "power", "count": 1 }] })
    );
}

#[test]
fn every_raw_row_is_kept_or_accounted_for() {
    let file = csv_file(&[
        "1,2023-06-01 00:00:00,10,20,100,5,10,10,5",
        "1,2023-06-01 00:01:00,10,20,,5,10,10,5",
        "1,2023-06-01 00:02:00,95,20,100,5,10,10,5",
        ",2023-06-01 00:03:00,10,20,100,5,10,10,5",
        "2,2023-06-01 00:04:00,10,-181,100,-1,10,10,5",
        "2,2023-06-01 00:05:00,10,20,100,5,10,10,5",
        "2,not a date,10,20,100,5,10,10,5",
    ]);
    let snapshot = load(&file);

    assert_eq!(
        snapshot.filtered().len() + snapshot.removals().len(),
        snapshot.raw().len()
    );
    let ledger = snapshot.ledger();
    assert_eq!(ledger.count(1, ProblemType::MissingValue, Column::Power), 1);
    assert_eq!(ledger.count(1, ProblemType::InvalidLatitude, Column::Latitude), 1);
    assert_eq!(ledger.count(2, ProblemType::BelowZero, Column::FuelConsumption), 1);
    assert_eq!(ledger.unattributed(), 1);
}

#[test]
fn clean_dataset_round_trips_untouched() {
    let file = csv_file(&[
        "5,2023-06-01 00:00:00,-33.8,151.2,100,5,10,10,5",
        "5,2023-06-01 00:01:00,-33.8,151.2,100,5,10,10,5",
        "6,2023-06-01 00:02:00,-33.8,151.2,100,5,10,10,5",
    ]);
    let snapshot = load(&file);

    assert!(snapshot.ledger().is_empty());
    assert_eq!(snapshot.filtered().len(), snapshot.raw().len());
    for (kept, raw) in snapshot.filtered().iter().zip(snapshot.raw().iter()) {
        assert!(Arc::ptr_eq(kept, raw));
    }
}

#[test]
fn text_datetime_blocks_window_queries_only() {
    let file = csv_file(&[
        "5,2023-06-01 00:00:00,10,20,100,5,10,10,5",
        "5,01/06/2023 00:01,10,20,100,5,10,10,5",
    ]);
    let snapshot = load(&file);

    assert!(matches!(
        api::windowed_metrics(&snapshot, "5", "2023-06-01", "2023-06-02", Source::Raw),
        Err(Error::Format(_))
    ));
    assert_eq!(metrics::compliance_score(&snapshot, 5), 100.0);
}

#[test]
fn missing_runs_are_found_in_the_raw_view() {
    let file = csv_file(&[
        "9,2023-06-01 00:00:00,10,20,100,,10,10,5",
        "9,2023-06-01 00:01:00,10,20,100,,10,10,5",
        "9,2023-06-01 00:02:00,10,20,100,5,10,10,5",
        "9,2023-06-01 00:03:00,10,20,100,,10,10,5",
        "9,2023-06-01 00:04:00,10,20,100,,10,10,5",
        "9,2023-06-01 00:05:00,10,20,100,,10,10,5",
    ]);
    let snapshot = load(&file);
    assert_eq!(snapshot.filtered().len(), 1);

    let summary = api::problem_groups(&snapshot, "9", "fuel_consumption", "missing_values").unwrap();
    assert_eq!(summary.number_of_groups, 2);
    assert_eq!(summary.largest_group_size, 3);
    let sizes: Vec<usize> = summary.groups.iter().map(|g| g.size).collect();
    assert_eq!(sizes, vec![3, 2]);

    // the filtered table has nothing left to report
    let filtered = runs::detect(
        snapshot.filtered(),
        9,
        Column::FuelConsumption,
        runs::ProblemKind::MissingValues,
    )
    .unwrap();
    assert_eq!(filtered.number_of_groups, 0);
}

fn write_parquet(path: &Path) {
    let schema = Arc::new(Schema::new(vec![
        Field::new("vessel_code", DataType::Int64, true),
        Field::new("datetime", DataType::Utf8, true),
        Field::new("latitude", DataType::Float64, true),
        Field::new("longitude", DataType::Float64, true),
        Field::new("power", DataType::Float64, true),
        Field::new("fuel_consumption", DataType::Float64, true),
        Field::new("actual_speed_overground", DataType::Float64, true),
        Field::new("proposed_speed_overground", DataType::Float64, true),
        Field::new("predicted_fuel_consumption", DataType::Float64, true),
    ]));
    let constant = |v: f64| -> ArrayRef { Arc::new(Float64Array::from(vec![v; 3])) };
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(vec![3001, 3001, 19310])),
            Arc::new(StringArray::from(vec![
                "2023-06-01 00:00:00",
                "2023-06-01 00:01:00",
                "2023-06-01 00:02:00",
            ])),
            constant(10.0),
            constant(20.0),
            Arc::new(Float64Array::from(vec![Some(100.0), None, Some(100.0)])),
            constant(5.0),
            Arc::new(Float64Array::from(vec![10.0, 10.0, 12.0])),
            constant(10.0),
            constant(5.0),
        ],
    )
    .expect("batch");

    let file = std::fs::File::create(path).expect("create parquet");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("writer");
    writer.write(&batch).expect("write");
    writer.close().expect("close");
}

#[test]
fn parquet_source_loads_and_filters() {
    let file = Builder::new().suffix(".parquet").tempfile().expect("temp parquet");
    write_parquet(file.path());

    let snapshot = Snapshot::load(file.path()).unwrap();

    assert_eq!(snapshot.raw().len(), 3);
    assert_eq!(snapshot.filtered().len(), 2);
    assert_eq!(
        snapshot
            .ledger()
            .count(3001, ProblemType::MissingValue, Column::Power),
        1
    );
    let cmp = api::compliance_comparison(&snapshot, "3001", "19310").unwrap();
    assert_eq!(cmp.winner(), Some(3001));
}

#[test]
fn snapshot_serves_concurrent_readers() {
    let file = csv_file(&[
        "1,2023-06-01 00:00:00,10,20,100,5,10,10,5",
        "2,2023-06-01 00:01:00,10,20,100,5,12,10,5",
    ]);
    let snapshot = Arc::new(load(&file));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let snapshot = Arc::clone(&snapshot);
            thread::spawn(move || metrics::compare_compliance(&snapshot, 1, 2).map(|c| c.winner()))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), Some(1));
    }
    assert_eq!(snapshot.raw().len(), 2);
}

#[test]
fn unreadable_source_gives_empty_snapshot() {
    let (snapshot, err) = Snapshot::load_or_empty(Path::new("/nonexistent/data.csv"));

    assert!(matches!(err, Some(Error::Load(_))));
    assert!(matches!(
        api::speed_differences(&snapshot, "3001"),
        Err(Error::NotFound(_))
    ));
}
