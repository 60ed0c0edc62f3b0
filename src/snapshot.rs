use std::path::Path;

use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::data::ledger::InvalidDataLedger;
use crate::data::loader::load_file;
use crate::data::model::Table;
use crate::data::pipeline::{FilterPipeline, Removal};
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Snapshot – the read-only result of one load
// ---------------------------------------------------------------------------

/// Which view of the data a query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Filtered,
    Raw,
}

/// Raw table, cleansed table and ledger from a single pipeline run.
///
/// Built once and never modified afterwards; share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct Snapshot {
    raw: Table,
    filtered: Table,
    ledger: InvalidDataLedger,
    removals: Vec<Removal>,
    skipped: Vec<Error>,
}

impl Snapshot {
    /// Run the default pipeline over `raw`.
    pub fn build(raw: Table) -> Self {
        Self::build_with(raw, &FilterPipeline::default())
    }

    pub fn build_with(raw: Table, pipeline: &FilterPipeline) -> Self {
        info!("Original dataset size: {}", raw.len());
        if raw.is_empty() {
            return Snapshot {
                filtered: raw.clone(),
                raw,
                ..Snapshot::default()
            };
        }

        let outcome = pipeline.run(&raw);
        info!("Filtered dataset size: {}", outcome.filtered.len());
        Snapshot {
            raw,
            filtered: outcome.filtered,
            ledger: outcome.ledger,
            removals: outcome.removals,
            skipped: outcome.skipped,
        }
    }

    /// Load and cleanse a file, failing if it cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = load_file(path).map_err(|e| Error::Load(format!("{}: {e:#}", path.display())))?;
        Ok(Self::build(raw))
    }

    /// Like [`Snapshot::load`], but a failed load still yields a usable
    /// empty snapshot alongside the error.
    pub fn load_or_empty(path: &Path) -> (Self, Option<Error>) {
        match Self::load(path) {
            Ok(snapshot) => (snapshot, None),
            Err(e) => {
                error!("{e}");
                (Self::build(Table::empty()), Some(e))
            }
        }
    }

    pub fn raw(&self) -> &Table {
        &self.raw
    }

    pub fn filtered(&self) -> &Table {
        &self.filtered
    }

    pub fn table(&self, source: Source) -> &Table {
        match source {
            Source::Filtered => &self.filtered,
            Source::Raw => &self.raw,
        }
    }

    pub fn ledger(&self) -> &InvalidDataLedger {
        &self.ledger
    }

    /// Every removed row with the stage and column that removed it.
    pub fn removals(&self) -> &[Removal] {
        &self.removals
    }

    /// Column checks the pipeline had to skip.
    pub fn skipped_checks(&self) -> &[Error] {
        &self.skipped
    }
}
