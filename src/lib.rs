//! Vessel telemetry cleansing and compliance metrics.
//!
//! A dataset is loaded once into a [`Snapshot`]: the raw table, the table
//! left after the cleansing pipeline, and a ledger of what was removed and
//! why. Every query borrows the snapshot; nothing mutates it.

pub mod analysis;
pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod snapshot;
pub mod stats;

pub use error::{Error, Result};
pub use snapshot::{Snapshot, Source};
