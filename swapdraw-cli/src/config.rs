use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use swapdraw_core::LotteryConfig;

/// Where the CLI keeps its files and which lottery configuration it uses.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub config_path: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("swapdraw"),
            config_path: None,
        }
    }
}

impl CliConfig {
    pub fn new(data_dir: Option<PathBuf>, config_path: Option<PathBuf>) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: data_dir.unwrap_or(defaults.data_dir),
            config_path,
        }
    }

    pub fn default_config_path(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    pub fn default_archive_path(&self) -> PathBuf {
        self.data_dir.join("swapdraw.db")
    }

    /// `--config` if given, else `config.json` in the data dir if present,
    /// else the built-in defaults.
    pub fn lottery_config(&self) -> Result<LotteryConfig> {
        if let Some(path) = &self.config_path {
            return load(path);
        }
        let fallback = self.default_config_path();
        if fallback.exists() {
            return load(&fallback);
        }
        Ok(LotteryConfig::default())
    }
}

fn load(path: &Path) -> Result<LotteryConfig> {
    let config = LotteryConfig::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    tracing::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}
