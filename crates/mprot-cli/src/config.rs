//! CLI configuration file

use crate::error::{CliError, CliResult};
use crate::output::OutputFormat;
use mprot_analyzer::{AnalyzerConfig, Validity};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `<config_dir>/mprot/config.toml`; every key is optional
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Validity checked when neither `--strict` nor `--weak` is given
    pub default_validity: Option<Validity>,

    /// Output format when `--output` is not given
    pub output: Option<OutputFormat>,

    /// Bound on explored orderings
    pub max_orderings: Option<usize>,
}

impl CliConfig {
    /// Load configuration from file
    pub fn load(path: Option<&str>) -> CliResult<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            let config: CliConfig =
                toml::from_str(&contents).map_err(|e| CliError::Config(e.to_string()))?;
            tracing::debug!(path = %config_path.display(), "Configuration loaded");
            Ok(config)
        } else {
            Ok(CliConfig::default())
        }
    }

    /// Get the default configuration file path
    fn default_config_path() -> CliResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CliError::Config("Cannot find config directory".into()))?;
        Ok(config_dir.join("mprot").join("config.toml"))
    }

    pub fn analyzer_config(&self, max_orderings: Option<usize>) -> AnalyzerConfig {
        AnalyzerConfig {
            max_orderings: max_orderings.or(self.max_orderings),
        }
    }
}
