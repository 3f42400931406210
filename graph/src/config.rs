use std::path::{Path, PathBuf};
use std::time::Duration;

use common::{deserialize, serialize, SerdeFormat};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Recursion cap per pass. Reaching it marks the node as part of a cycle.
    pub max_depth: usize,
    pub playback_interval_ms: u64,
    pub log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    /// Joins incomers on ports that concatenate their inputs.
    pub concat_separator: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 256,
            playback_interval_ms: 500,
            log_level: "info".to_string(),
            log_dir: None,
            concat_separator: "\n".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let serialized = std::fs::read(path)?;
        let config: Self = deserialize(&serialized, SerdeFormat::Yaml)?;
        anyhow::ensure!(config.max_depth > 0, "max_depth must be positive");
        anyhow::ensure!(
            config.playback_interval_ms > 0,
            "playback_interval_ms must be positive"
        );

        Ok(config)
    }

    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), "Using default engine config: {err}");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let serialized = serialize(self, SerdeFormat::Yaml)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    pub fn playback_interval(&self) -> Duration {
        Duration::from_millis(self.playback_interval_ms)
    }
}
