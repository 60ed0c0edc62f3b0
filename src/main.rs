use std::process::ExitCode;

use anyhow::Result;
use serde_json::{json, Value};
use vessel_telemetry::api;
use vessel_telemetry::config::{parse_cli, Command};
use vessel_telemetry::{Error, Snapshot, Source};

fn main() -> ExitCode {
    let cli = parse_cli();

    // RUST_LOG wins over --log-level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    let (snapshot, load_error) = Snapshot::load_or_empty(&cli.data);

    match run(&snapshot, load_error.as_ref(), cli.command) {
        Ok(body) => {
            println!("{}", pretty(&body));
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{}", pretty(&json!({ "message": e.to_string() })));
            ExitCode::from(exit_status(&e))
        }
    }
}

fn run(snapshot: &Snapshot, load_error: Option<&Error>, command: Command) -> Result<Value> {
    let body = match command {
        Command::InvalidData { vessel_code } => {
            let code = api::parse_vessel_code(&vessel_code)?;
            json!({
                "message": "Found invalid data for this vessel",
                "vessel_code": code,
                "invalid_data": api::invalid_data(snapshot, &vessel_code)?,
            })
        }
        Command::SpeedDifference { vessel_code } => {
            let code = api::parse_vessel_code(&vessel_code)?;
            json!({
                "message": "Speed differences for the vessel",
                "vessel_code": code,
                "speed_differences": api::speed_differences(snapshot, &vessel_code)?,
            })
        }
        Command::Compliance {
            vessel_code1,
            vessel_code2,
        } => {
            let comparison = api::compliance_comparison(snapshot, &vessel_code1, &vessel_code2)?;
            json!({
                "message": comparison.to_string(),
                "comparison": comparison,
            })
        }
        Command::Metrics {
            vessel_code,
            start_date,
            end_date,
            raw,
        } => {
            let source = if raw { Source::Raw } else { Source::Filtered };
            let rows =
                api::windowed_metrics(snapshot, &vessel_code, &start_date, &end_date, source)?;
            serde_json::to_value(rows)?
        }
        Command::Problems {
            vessel_code,
            column,
            problem_type,
        } => serde_json::to_value(api::problem_groups(
            snapshot,
            &vessel_code,
            &column,
            &problem_type,
        )?)?,
        Command::Summary => summary(snapshot, load_error),
    };
    Ok(body)
}

fn summary(snapshot: &Snapshot, load_error: Option<&Error>) -> Value {
    let ledger = snapshot.ledger();
    let skipped: Vec<String> = snapshot
        .skipped_checks()
        .iter()
        .map(ToString::to_string)
        .collect();
    json!({
        "message": match load_error {
            Some(e) => e.to_string(),
            None => "Dataset loaded".to_string(),
        },
        "raw_rows": snapshot.raw().len(),
        "filtered_rows": snapshot.filtered().len(),
        "removed_rows": snapshot.removals().len(),
        "removal_events": ledger.totals_by_problem(),
        "unattributed_events": ledger.unattributed(),
        "vessels_with_removals": ledger.vessels().collect::<Vec<_>>(),
        "skipped_checks": skipped,
    })
}

fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<Error>() {
        Some(Error::InvalidArgument(_)) => 2,
        Some(Error::NotFound(_)) => 3,
        Some(Error::Format(_)) => 4,
        _ => 1,
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
