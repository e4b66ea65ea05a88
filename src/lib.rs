// Sales KPI - Core Library
// Cleaning pipeline and KPI aggregation, shared by the CLI, the API server, and tests

pub mod table;
pub mod error;
pub mod config;
pub mod logging;
pub mod loader;        // Source Loader - spreadsheet / CSV
pub mod schema;        // Schema Normalizer - synonym registry
pub mod cleaning;      // Row Cleaner - ordered filtering stages
pub mod derived;       // Calendar columns
pub mod transaction;   // Typed view over the clean table
pub mod kpi;           // KPI Aggregator + filters and breakdowns
pub mod data_quality;  // Profiling and dataset summary
pub mod snapshot;      // Clean snapshot (CSV / SQLite)
pub mod pipeline;      // Orchestrator

// Re-export commonly used types
pub use table::{Cell, Row, Table};
pub use error::{PipelineError, PipelineResult};
pub use config::{Config, ServerConfig};
pub use loader::{detect_format, get_reader, load_table, SourceFormat, TableReader};
pub use schema::{
    normalize_columns, CanonicalField, ColumnMapping, NormalizedTable, SchemaIncomplete,
    SynonymRegistry, SYNONYMS,
};
pub use cleaning::{CleanOutcome, CleaningReport, CleaningStage, RowCleaner};
pub use derived::{add_calendar_columns, CalendarAttributes};
pub use transaction::{transactions_from_table, Transaction};
pub use kpi::{
    category_breakdown, compute_kpis, daily_totals, latest_transactions, payment_breakdown,
    CategoryBreakdown, DailyTotal, KpiFilter, KpiSet, PaymentBreakdown,
};
pub use data_quality::{profile_table, summarize, DatasetSummary, TableProfile};
pub use snapshot::{write_snapshot, SnapshotFormat};
pub use pipeline::{run_pipeline, Pipeline, PipelineOutput};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
