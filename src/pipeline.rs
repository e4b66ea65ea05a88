// 🔄 Pipeline Orchestrator
// load → normalize → clean → validate → persist → hand back the clean dataset.

use crate::cleaning::{CleaningReport, RowCleaner};
use crate::config::Config;
use crate::data_quality::{profile_table, TableProfile};
use crate::error::{PipelineError, PipelineResult};
use crate::loader::load_table;
use crate::schema::{normalize_columns, SchemaIncomplete};
use crate::snapshot::write_snapshot;
use crate::table::Table;
use crate::transaction::{transactions_from_table, Transaction};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Everything a host needs after a successful run.
#[derive(Debug)]
pub struct PipelineOutput {
    /// Clean table with calendar columns, as persisted
    pub table: Table,
    pub transactions: Vec<Transaction>,
    pub report: CleaningReport,
    /// Profile of the raw table before normalization
    pub raw_profile: TableProfile,
    pub schema_warning: Option<SchemaIncomplete>,
    /// Set when the snapshot could not be written; the run still succeeded
    pub snapshot_error: Option<PipelineError>,
}

pub struct Pipeline {
    input_path: PathBuf,
    snapshot_path: Option<PathBuf>,
    cleaner: RowCleaner,
}

impl Pipeline {
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        Pipeline {
            input_path: input_path.into(),
            snapshot_path: None,
            cleaner: RowCleaner::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Pipeline::new(&config.input_path).with_snapshot(config.snapshot_destination())
    }

    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Dates after `now` are rejected as future dates
    pub fn with_reference_time(mut self, now: NaiveDateTime) -> Self {
        self.cleaner = RowCleaner::with_reference_time(now);
        self
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn run(&self) -> PipelineResult<PipelineOutput> {
        info!(input = %self.input_path.display(), "pipeline started");
        let raw = load_table(&self.input_path)?;
        self.run_on_table(raw)
    }

    /// Every step after loading. Fails with `EmptyResultSet` when no row survives.
    pub fn run_on_table(&self, raw: Table) -> PipelineResult<PipelineOutput> {
        // Callers may build the table by hand; rows must match the header width
        let raw = Table::from_rows(raw.columns, raw.rows);
        let raw_profile = profile_table(&raw);
        info!(profile = %raw_profile.summary(), "raw table");

        let normalized = normalize_columns(raw);
        let outcome = self.cleaner.clean(normalized.table);

        if outcome.table.is_empty() {
            return Err(PipelineError::EmptyResultSet {
                initial_rows: outcome.report.initial_rows,
            });
        }

        let snapshot_error = match &self.snapshot_path {
            Some(path) => write_snapshot(&outcome.table, path).err(),
            None => None,
        };
        if let Some(err) = &snapshot_error {
            warn!(error = %err, "snapshot not written; continuing with in-memory data");
        }

        let transactions = transactions_from_table(&outcome.table);
        info!(
            transactions = transactions.len(),
            summary = %outcome.report.summary(),
            "pipeline finished"
        );

        Ok(PipelineOutput {
            table: outcome.table,
            transactions,
            report: outcome.report,
            raw_profile,
            schema_warning: normalized.warning,
            snapshot_error,
        })
    }
}

/// Run with the paths from `config`
pub fn run_pipeline(config: &Config) -> PipelineResult<PipelineOutput> {
    Pipeline::from_config(config).run()
}

// ============================================================================
// TESTS
// ============================================================================
