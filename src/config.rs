use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Default location of the telemetry dataset.
pub const DEFAULT_DATA_PATH: &str = "data/vessel_data.csv";

/// Cleanse vessel telemetry and query compliance metrics.
#[derive(Parser, Debug)]
#[command(name = "vessel-telemetry")]
#[command(version)]
#[command(about = "Cleanse vessel telemetry and query compliance metrics")]
pub struct Cli {
    /// Telemetry file to load (.csv, .json or .parquet).
    #[arg(long, env = "VESSEL_DATA_PATH", default_value = DEFAULT_DATA_PATH, global = true)]
    pub data: PathBuf,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rows removed by the cleansing pipeline for a vessel, by problem and column.
    InvalidData { vessel_code: String },

    /// |actual − proposed| speed at each cleansed position of a vessel.
    SpeedDifference { vessel_code: String },

    /// Which of two vessels keeps closer to its proposed speed.
    Compliance {
        vessel_code1: String,
        vessel_code2: String,
    },

    /// Rows of a vessel between two dates (inclusive).
    Metrics {
        vessel_code: String,
        start_date: String,
        end_date: String,

        /// Read the uncleansed rows instead.
        #[arg(long)]
        raw: bool,
    },

    /// Runs of consecutive problematic rows for a vessel.
    Problems {
        vessel_code: String,

        #[arg(long)]
        column: String,

        /// missing_values or outliers.
        #[arg(long, default_value = "missing_values")]
        problem_type: String,
    },

    /// Dataset sizes, ledger totals and any skipped checks.
    Summary,
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}
