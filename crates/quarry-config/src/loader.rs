//! Configuration loader with multi-source merging.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::QuarryConfig;

/// Builder-style loader.
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    /// Loader rooted at the current directory with the `QUARRY` prefix.
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "QUARRY".to_string(),
        }
    }

    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Loads configuration from all sources with proper precedence.
    pub fn load(self) -> Result<QuarryConfig> {
        let mut builder = config::Config::builder();

        // 1. Built-in defaults.
        let defaults = QuarryConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. Project config (quarry.toml).
        let project_file = self.project_dir.join("quarry.toml");
        if project_file.exists() {
            builder = builder.add_source(
                config::File::from(project_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 3. Environment variables (QUARRY_*).
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .separator("_")
                .try_parsing(true),
        );

        let merged = builder.build().context("failed to build configuration")?;
        let loaded: QuarryConfig = merged
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        loaded.validate().context("invalid configuration")?;
        Ok(loaded)
    }

    /// Loads configuration, falling back to defaults on any failure.
    pub fn load_or_default(self) -> QuarryConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn loads_defaults_without_a_file() {
        let dir = tempdir().unwrap();
        let config = ConfigLoader::new()
            .with_project_dir(dir.path())
            .load()
            .unwrap();
        assert_eq!(config.database.workers, 1);
        assert!(config.minimize.enabled);
    }

    #[test]
    fn project_file_overrides_defaults() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("quarry.toml"),
            "[database]\nworkers = 4\n\n[minimize]\ntimeout_secs = 10\n",
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_project_dir(dir.path())
            .load()
            .unwrap();
        assert_eq!(config.database.workers, 4);
        assert_eq!(config.minimize.timeout_secs, 10);
        // Untouched sections keep defaults.
        assert_eq!(config.truth.table_cap, 256);
    }

    #[test]
    fn invalid_file_falls_back_with_load_or_default() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("quarry.toml"), "[database]\nworkers = 0\n").unwrap();
        let config = ConfigLoader::new()
            .with_project_dir(dir.path())
            .load_or_default();
        assert_eq!(config.database.workers, 1);
    }
}
