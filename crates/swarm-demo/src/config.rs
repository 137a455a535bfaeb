//! Demo configuration, optionally loaded from `swarm.toml`.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use swarm_engine::backend::gpu::BufferPreference;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "swarm.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferKindSetting {
    #[default]
    Auto,
    Bounded,
    Unbounded,
}

impl From<BufferKindSetting> for BufferPreference {
    fn from(s: BufferKindSetting) -> Self {
        match s {
            BufferKindSetting::Auto => BufferPreference::Auto,
            BufferKindSetting::Bounded => BufferPreference::Bounded,
            BufferKindSetting::Unbounded => BufferPreference::Unbounded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub title: String,
    pub width: f64,
    pub height: f64,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "swarm".to_string(),
            width: 1280.0,
            height: 720.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub columns: u32,
    pub rows: u32,
    pub spacing: f32,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            columns: 96,
            rows: 96,
            spacing: 1.1,
        }
    }
}

impl GridSettings {
    pub fn cell_count(&self) -> u32 {
        self.columns.saturating_mul(self.rows)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BurstSettings {
    pub max_fragments: u32,
    pub bursts_per_second: f32,
    pub fragments_per_burst: u32,
    /// Seconds.
    pub lifetime: f32,
    pub gravity: f32,
}

impl Default for BurstSettings {
    fn default() -> Self {
        Self {
            max_fragments: 20_000,
            bursts_per_second: 6.0,
            fragments_per_burst: 400,
            lifetime: 3.0,
            gravity: 9.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub window: WindowSettings,
    pub buffer_kind: BufferKindSetting,
    pub grid: GridSettings,
    pub bursts: BurstSettings,
    pub seed: u64,
    /// `env_logger` filter; `RUST_LOG` applies when unset.
    pub log_filter: Option<String>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            window: WindowSettings::default(),
            buffer_kind: BufferKindSetting::Auto,
            grid: GridSettings::default(),
            bursts: BurstSettings::default(),
            seed: 0x5eed,
            log_filter: None,
        }
    }
}

impl DemoConfig {
    pub fn from_toml(src: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: DemoConfig = toml::from_str(src).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`, or `swarm.toml` if present, or falls back to defaults.
    ///
    /// An explicit path that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        match std::fs::read_to_string(&path) {
            Ok(src) => Self::from_toml(&src, &path),
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read { path, source }),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.grid.cell_count() == 0 {
            return Err(ConfigError::Invalid("grid must have at least one cell".into()));
        }
        if self.bursts.max_fragments == 0 {
            return Err(ConfigError::Invalid("bursts.max_fragments must be positive".into()));
        }
        if !(self.bursts.lifetime > 0.0) {
            return Err(ConfigError::Invalid("bursts.lifetime must be positive".into()));
        }
        Ok(())
    }
}
