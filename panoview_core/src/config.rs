//! Coordinator and renderer configuration.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration replicated to every renderer on the `config` topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RendererConfig {
    /// Directories searched, in order, when resolving asset paths
    pub search_paths: Vec<PathBuf>,
}

/// Configuration for the coordinator process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Crossfade duration (default: 1000 ms)
    pub present_duration_ms: u64,

    /// Interval between `present` broadcasts (default: 10 ms)
    pub present_tick_ms: u64,

    /// Barrier timeout before proceeding anyway (default: 10 s)
    pub barrier_timeout_ms: u64,

    /// Interval between `pose` broadcasts (default: 10 ms)
    pub pose_tick_ms: u64,

    /// Document sent to renderers
    pub renderer: RendererConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            present_duration_ms: 1000,
            present_tick_ms: 10,
            barrier_timeout_ms: 10_000,
            pose_tick_ms: 10,
            renderer: RendererConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Largest tick interval accepted for present and pose loops.
    pub const MAX_TICK_MS: u64 = 100;

    /// Reads a JSON configuration file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| CoreError::Config(format!("{}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks intervals and durations.
    pub fn validate(&self) -> CoreResult<()> {
        if self.present_duration_ms == 0 {
            return Err(CoreError::Config("present_duration_ms must be positive".into()));
        }
        for (name, tick) in [
            ("present_tick_ms", self.present_tick_ms),
            ("pose_tick_ms", self.pose_tick_ms),
        ] {
            if tick == 0 || tick > Self::MAX_TICK_MS {
                return Err(CoreError::Config(format!(
                    "{} must be within 1..={} (got {})",
                    name,
                    Self::MAX_TICK_MS,
                    tick
                )));
            }
        }
        Ok(())
    }

    pub fn present_duration(&self) -> Duration {
        Duration::from_millis(self.present_duration_ms)
    }

    pub fn present_tick(&self) -> Duration {
        Duration::from_millis(self.present_tick_ms)
    }

    pub fn barrier_timeout(&self) -> Duration {
        Duration::from_millis(self.barrier_timeout_ms)
    }

    pub fn pose_tick(&self) -> Duration {
        Duration::from_millis(self.pose_tick_ms)
    }
}
