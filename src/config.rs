use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

/// Settings read from `config.json`. Every key is optional; command line
/// flags take precedence over anything set here.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(rename = "DB_URL")]
    pub db_url: Option<String>,
    pub author: Option<String>,
    pub out_dir: Option<PathBuf>,
    pub filename_format: Option<String>,
    pub concurrency: Option<usize>,
    pub max_entities: Option<usize>,
    pub resolve_timeout_secs: Option<u64>,
}

impl Config {
    /// A missing file yields the default config; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        return Ok(config);
    }
}
