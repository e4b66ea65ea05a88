// ⚙️ Configuration
// Optional `sales-kpi.toml`; anything missing falls back to the defaults below.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "sales-kpi.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source spreadsheet or CSV
    pub input_path: PathBuf,
    /// Clean snapshot (.xlsx, .csv, or .db/.sqlite/.sqlite3). Unset means
    /// next to the input, in the input's own format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,
    /// tracing-subscriber filter directive, overridden by RUST_LOG
    pub log_filter: String,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Rows returned by the transactions endpoint
    pub latest_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input_path: PathBuf::from("data/data_kpi.xlsx"),
            snapshot_path: None,
            log_filter: "sales_kpi=info".to_string(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8050,
            latest_limit: 100,
        }
    }
}

impl Config {
    /// Load from `path`, or from `sales-kpi.toml` in the working directory when
    /// `path` is `None`. Only an explicitly named file is required to exist.
    pub fn load(path: Option<&Path>) -> PipelineResult<Self> {
        let (config_path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if !config_path.exists() {
            if required {
                return Err(PipelineError::Config(format!(
                    "config file '{}' not found",
                    config_path.display()
                )));
            }
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> PipelineResult<Self> {
        toml::from_str(content).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Configured snapshot path, or the default derived from the input
    pub fn snapshot_destination(&self) -> PathBuf {
        self.snapshot_path
            .clone()
            .unwrap_or_else(|| default_snapshot_path(&self.input_path))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// `<dir>/<stem>_clean.<ext>`: CSV input keeps CSV, anything else gets a workbook
pub fn default_snapshot_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("data");
    let is_csv = input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    let extension = if is_csv { "csv" } else { "xlsx" };
    input.with_file_name(format!("{}_clean.{}", stem, extension))
}
