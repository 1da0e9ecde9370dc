//! # quarry-config: layered configuration
//!
//! Precedence, lowest to highest: built-in defaults, the project's
//! `quarry.toml`, then `QUARRY_*` environment variables. The harness
//! loads one [`QuarryConfig`] per run and hands each worker its slice.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuarryConfig {
    pub database: DatabaseConfig,
    pub oracle: OracleConfig,
    pub truth: TruthConfig,
    pub minimize: MinimizeSection,
    pub report: ReportConfig,
}

impl QuarryConfig {
    /// Rejects configurations no run could make sense of.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.workers == 0 {
            return Err(ConfigError::Validation(
                "database.workers must be at least 1".to_string(),
            ));
        }
        if self.truth.table_cap == 0 || self.truth.join_cap == 0 {
            return Err(ConfigError::Validation(
                "truth caps must be positive".to_string(),
            ));
        }
        if self.minimize.enabled && self.minimize.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "minimize.timeout_secs must be positive when minimization is enabled".to_string(),
            ));
        }
        if !(0.0..=10.0).contains(&self.oracle.plan_tolerance) {
            return Err(ConfigError::Validation(
                "oracle.plan_tolerance must be within [0, 10]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Connection and worker layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// DSN of the server under test.
    pub dsn: String,
    /// Independent workers; each owns a database named `<prefix><n>`.
    pub workers: usize,
    pub db_prefix: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dsn: "root@tcp(127.0.0.1:4000)/".to_string(),
            workers: 1,
            db_prefix: "quarry".to_string(),
        }
    }
}

/// Which oracles run, and their knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub mutation: bool,
    pub cardinality: bool,
    pub plan: bool,
    /// Stage-1 permission to demote outer joins.
    pub rewrite_outer_joins: bool,
    pub plan_session_var: String,
    pub plan_session_value: String,
    pub plan_tolerance: f64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            mutation: true,
            cardinality: true,
            plan: false,
            rewrite_outer_joins: true,
            plan_session_var: "tidb_opt_agg_push_down".to_string(),
            plan_session_value: "1".to_string(),
            plan_tolerance: 0.2,
        }
    }
}

/// Ground-truth evaluation caps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TruthConfig {
    pub table_cap: usize,
    pub join_cap: usize,
}

impl Default for TruthConfig {
    fn default() -> Self {
        Self {
            table_cap: 256,
            join_cap: 100_000,
        }
    }
}

/// Minimizer section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MinimizeSection {
    pub enabled: bool,
    pub timeout_secs: u64,
    pub max_rounds: usize,
    pub merge_back: bool,
    pub scratch_db: String,
}

impl Default for MinimizeSection {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 30,
            max_rounds: 64,
            merge_back: true,
            scratch_db: "quarry_replay".to_string(),
        }
    }
}

/// Reporter section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub dir: String,
    /// `case_<seq>_<uuid>` directory names instead of bare UUIDs.
    pub sequence_names: bool,
    pub data_row_cap: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            dir: "cases".to_string(),
            sequence_names: true,
            data_row_cap: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        QuarryConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_workers_rejected() {
        let mut config = QuarryConfig::default();
        config.database.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_minimize_timeout_rejected_only_when_enabled() {
        let mut config = QuarryConfig::default();
        config.minimize.timeout_secs = 0;
        assert!(config.validate().is_err());
        config.minimize.enabled = false;
        config.validate().unwrap();
    }
}
