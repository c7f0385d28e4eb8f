//! Server settings: defaults, then an optional TOML file, then
//! `TICKWORLD__*` environment variables (`__` separates nested keys, e.g.
//! `TICKWORLD__WORLD__VIEW_DISTANCE=8`).

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::{LimiterConfig, WorldConfig};

pub const ENV_PREFIX: &str = "TICKWORLD";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub listen_address: String,
    /// Root for `region/` (chunks) and `playerdata/`.
    pub level_dir: PathBuf,
    pub world: WorldConfig,
    /// Chunks around spawn kept resident with nobody online.
    pub spawn_chunk_radius: i32,
    /// Shared by every chunk read from disk.
    pub chunk_loading_limiter: LimiterConfig,
    /// Given to each player's loader.
    pub player_chunk_loading_limiter: LimiterConfig,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:25565".into(),
            level_dir: PathBuf::from("world"),
            world: WorldConfig::default(),
            spawn_chunk_radius: 2,
            chunk_loading_limiter: LimiterConfig {
                every_ms: 1,
                burst: 256,
            },
            player_chunk_loading_limiter: LimiterConfig {
                every_ms: 10,
                burst: 64,
            },
        }
    }
}

impl ServerSettings {
    /// Load settings, reading `path` if given (it must then exist).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    /// Parse settings from a TOML string; environment is not consulted.
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    fn load_with(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        let settings = builder
            .add_source(env.prefix_separator("__").separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn region_dir(&self) -> PathBuf {
        self.level_dir.join("region")
    }

    pub fn playerdata_dir(&self) -> PathBuf {
        self.level_dir.join("playerdata")
    }
}
