//! Server configuration.
//!
//! A single TOML file with defaults for everything; a missing or broken
//! file falls back to the defaults with a warning rather than refusing
//! to start. Block definitions are separate data (JSON) and are fatal
//! when invalid, since the world cannot run on a wrong block table.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

const DEFAULT_CONFIG_PATH: &str = "config/server.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the TCP listener binds to.
    pub listen_addr: String,
    /// World directory holding the persisted chunk files.
    pub world_path: PathBuf,
    /// Block definitions file.
    pub block_defs_path: PathBuf,
    /// Frames the per-connection transmit queue holds before the
    /// connection is dropped as a slow client.
    pub transmit_queue_capacity: usize,
    /// Seconds an unobserved chunk lingers before it is unloaded.
    pub chunk_idle_grace_secs: u64,
    /// Chunk radius kept subscribed around each player.
    pub view_radius: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:25565".to_string(),
            world_path: PathBuf::from("world"),
            block_defs_path: PathBuf::from("config/blocks.json"),
            transmit_queue_capacity: 128,
            chunk_idle_grace_secs: 30,
            view_radius: 2,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the default path.
    pub fn load() -> Self {
        Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Load configuration from an explicit path, falling back to
    /// defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<ServerConfig>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    ServerConfig::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!("Config not found at {}. Using defaults", path.display());
                ServerConfig::default()
            }
            Err(err) => {
                warn!("Failed to read {}: {err}. Using defaults", path.display());
                ServerConfig::default()
            }
        }
    }

    pub fn chunk_idle_grace(&self) -> Duration {
        Duration::from_secs(self.chunk_idle_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_protocol_limits() {
        let config = ServerConfig::default();
        assert_eq!(config.transmit_queue_capacity, 128);
        assert_eq!(config.listen_addr, "0.0.0.0:25565");
    }

    #[test]
    fn partial_config_keeps_defaults_for_the_rest() {
        let config: ServerConfig = toml::from_str(r#"listen_addr = "127.0.0.1:9999""#).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9999");
        assert_eq!(config.transmit_queue_capacity, 128);
        assert_eq!(config.world_path, PathBuf::from("world"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = ServerConfig::load_from_path(Path::new("/no/such/config.toml"));
        assert_eq!(config.view_radius, ServerConfig::default().view_radius);
    }
}
