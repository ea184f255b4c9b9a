use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use warpgate_shared::portal::PortalColor;

const MIN_TICK_INTERVAL_MS: u64 = 5;
const MAX_TICK_INTERVAL_MS: u64 = 1000;
const MAX_TELEPORT_COOLDOWN_MS: u64 = 60_000;
const MIN_RAYCAST_DISTANCE: f64 = 1.0;
const MAX_RAYCAST_DISTANCE: f64 = 256.0;
const MIN_RAYCAST_TIMEOUT_MS: u64 = 50;
const MAX_RAYCAST_TIMEOUT_MS: u64 = 30_000;
const MAX_FALLBACK_DISTANCE: i32 = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize portal settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Tunables for portal detection, decoration and placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_teleport_cooldown_ms")]
    pub teleport_cooldown_ms: u64,
    #[serde(default = "default_tick_interval_ms")]
    pub decoration_interval_ms: u64,
    #[serde(default = "default_max_raycast_distance")]
    pub max_raycast_distance: f64,
    #[serde(default = "default_raycast_timeout_ms")]
    pub raycast_timeout_ms: u64,
    #[serde(default = "default_fallback_forward_distance")]
    pub fallback_forward_distance: i32,
    #[serde(default = "default_portal_gun_item")]
    pub portal_gun_item: String,
    #[serde(default = "default_blue_block")]
    pub blue_block: String,
    #[serde(default = "default_orange_block")]
    pub orange_block: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            teleport_cooldown_ms: default_teleport_cooldown_ms(),
            decoration_interval_ms: default_tick_interval_ms(),
            max_raycast_distance: default_max_raycast_distance(),
            raycast_timeout_ms: default_raycast_timeout_ms(),
            fallback_forward_distance: default_fallback_forward_distance(),
            portal_gun_item: default_portal_gun_item(),
            blue_block: default_blue_block(),
            orange_block: default_orange_block(),
        }
    }
}

impl PortalConfig {
    pub fn sanitize(mut self) -> Self {
        self.tick_interval_ms = self
            .tick_interval_ms
            .clamp(MIN_TICK_INTERVAL_MS, MAX_TICK_INTERVAL_MS);
        self.decoration_interval_ms = self
            .decoration_interval_ms
            .clamp(MIN_TICK_INTERVAL_MS, MAX_TICK_INTERVAL_MS);
        self.teleport_cooldown_ms = self.teleport_cooldown_ms.min(MAX_TELEPORT_COOLDOWN_MS);
        self.max_raycast_distance = if self.max_raycast_distance.is_finite() {
            self.max_raycast_distance
                .clamp(MIN_RAYCAST_DISTANCE, MAX_RAYCAST_DISTANCE)
        } else {
            default_max_raycast_distance()
        };
        self.raycast_timeout_ms = self
            .raycast_timeout_ms
            .clamp(MIN_RAYCAST_TIMEOUT_MS, MAX_RAYCAST_TIMEOUT_MS);
        self.fallback_forward_distance = self
            .fallback_forward_distance
            .clamp(-MAX_FALLBACK_DISTANCE, MAX_FALLBACK_DISTANCE);
        if self.blue_block.trim().is_empty() {
            self.blue_block = default_blue_block();
        }
        if self.orange_block.trim().is_empty() {
            self.orange_block = default_orange_block();
        }
        self
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = toml::from_str::<Self>(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(parsed.sanitize())
    }

    /// Loads `path` when it exists, otherwise returns the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let settings = self.clone().sanitize();
        let serialized = toml::to_string_pretty(&settings)?;
        fs::write(path, serialized).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn teleport_cooldown(&self) -> Duration {
        Duration::from_millis(self.teleport_cooldown_ms)
    }

    pub fn decoration_interval(&self) -> Duration {
        Duration::from_millis(self.decoration_interval_ms)
    }

    pub fn raycast_timeout(&self) -> Duration {
        Duration::from_millis(self.raycast_timeout_ms)
    }

    pub fn block_for(&self, color: PortalColor) -> &str {
        match color {
            PortalColor::Blue => &self.blue_block,
            PortalColor::Orange => &self.orange_block,
        }
    }
}

fn default_tick_interval_ms() -> u64 {
    50
}

fn default_teleport_cooldown_ms() -> u64 {
    1000
}

fn default_max_raycast_distance() -> f64 {
    50.0
}

fn default_raycast_timeout_ms() -> u64 {
    5000
}

fn default_fallback_forward_distance() -> i32 {
    warpgate_shared::placement::DEFAULT_FALLBACK_DISTANCE
}

fn default_portal_gun_item() -> String {
    "warpgate:portal_gun".to_string()
}

fn default_blue_block() -> String {
    "Cloth_Block_Wool_Blue".to_string()
}

fn default_orange_block() -> String {
    "Cloth_Block_Wool_Orange".to_string()
}

/// Settings for the headless host binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub config_path: PathBuf,
    pub world_name: String,
    pub min_y: i32,
    pub max_y: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("warpgate.toml"),
            world_name: "overworld".to_string(),
            min_y: 0,
            max_y: 255,
        }
    }
}
