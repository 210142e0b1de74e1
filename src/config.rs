use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENRICH_TIMEOUT_MS: u64 = 5_000;

/// Board settings, loadable from a JSON file.
///
/// Every field is optional in the file; missing fields take their
/// defaults.
///
/// ```text
/// {
///   "enrich_timeout_ms": 2000,
///   "from_block": 3400000,
///   "journal_dir": "/var/lib/bountyfold"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Upper bound on a single content lookup.
    pub enrich_timeout_ms: u64,
    /// First block to subscribe from when nothing has been journaled.
    pub from_block: u64,
    /// Where to keep the event journal. `None` keeps the log in memory only.
    pub journal_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            enrich_timeout_ms: DEFAULT_ENRICH_TIMEOUT_MS,
            from_block: 0,
            journal_dir: None,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn enrich_timeout(&self) -> Duration {
        Duration::from_millis(self.enrich_timeout_ms)
    }
}
