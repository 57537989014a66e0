//! Aggregation and archive configuration.
//!
//! Stored as JSON; every field is optional in the file and falls back to the
//! reference setup (four quadrants, four workers, 1000 rows per query against
//! the ESA Gaia TAP service).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::quadrant::{reference_quadrants, Quadrant};
use crate::votable::NonFinitePolicy;

/// ESA Gaia archive synchronous TAP endpoint.
pub const DEFAULT_TAP_ENDPOINT: &str = "https://gea.esac.esa.int/tap-server/tap/sync";
/// Catalog table queried for ra, dec and parallax.
pub const DEFAULT_TABLE: &str = "gaiadr2.gaia_source";
pub const DEFAULT_MAX_ROWS: u32 = 1000;
pub const DEFAULT_WORKER_COUNT: usize = 4;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Remote archive connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapConfig {
    /// Synchronous query URL, without query string
    pub endpoint: String,
    /// Fully qualified table name used in the FROM clause
    pub table: String,
    /// Whole-request timeout; a hung fetch becomes an empty quadrant
    pub timeout_secs: u64,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_TAP_ENDPOINT.to_string(),
            table: DEFAULT_TABLE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl TapConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Everything the aggregator needs for one top-level request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarstreamConfig {
    /// Regions to fetch before partitioning
    pub quadrants: Vec<Quadrant>,
    /// Size of the fetch worker pool
    pub worker_count: usize,
    /// `TOP` limit of each ADQL query
    pub max_rows_per_query: u32,
    pub tap: TapConfig,
    /// Which decoded records are kept
    pub non_finite: NonFinitePolicy,
}

impl Default for StarstreamConfig {
    fn default() -> Self {
        Self {
            quadrants: reference_quadrants(),
            worker_count: DEFAULT_WORKER_COUNT,
            max_rows_per_query: DEFAULT_MAX_ROWS,
            tap: TapConfig::default(),
            non_finite: NonFinitePolicy::default(),
        }
    }
}

impl StarstreamConfig {
    /// Check quadrant bounds and numeric options.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, quadrant) in self.quadrants.iter().enumerate() {
            quadrant
                .validate()
                .map_err(|source| ConfigError::Quadrant { index, source })?;
        }
        if self.worker_count == 0 {
            return Err(ConfigError::Invalid(
                "worker_count must be at least 1".to_string(),
            ));
        }
        if self.max_rows_per_query == 0 {
            return Err(ConfigError::Invalid(
                "max_rows_per_query must be at least 1".to_string(),
            ));
        }
        if self.tap.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("tap.endpoint is empty".to_string()));
        }
        if self.tap.table.trim().is_empty() {
            return Err(ConfigError::Invalid("tap.table is empty".to_string()));
        }
        if self.tap.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "tap.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate a JSON config file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a pretty-printed JSON file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
