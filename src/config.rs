//! Configuration for the CLI driver.
//!
//! A small TOML file describes how to launch the local player and which
//! targets exist; a missing file means defaults. Library consumers inject
//! their own [`crate::settings::Settings`] store instead.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ControlError, Result};
use crate::session::SpawnConfig;
use crate::types::Target;

/// Driver configuration, read from `~/.config/lofictl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Player binary name or path.
    pub player_binary: String,

    /// IPC socket path shared with the player.
    pub socket_path: PathBuf,

    /// Default volume, 0..=100.
    pub volume: u8,

    /// Extra arguments appended to the player command line.
    pub extra_player_args: Vec<String>,

    /// Configured targets.
    pub targets: Vec<Target>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            player_binary: "mpv".to_string(),
            socket_path: PathBuf::from("/tmp/lofictl.sock"),
            volume: 50,
            extra_player_args: Vec::new(),
            targets: Vec::new(),
        }
    }
}

impl Config {
    /// Load the config file, falling back to defaults when absent.
    ///
    /// # Errors
    /// [`ControlError::Config`] when the file exists but cannot be read or
    /// parsed.
    pub fn load() -> Result<Self> {
        let Some(path) = Self::config_path() else {
            debug!("no config directory resolvable, using defaults");
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path)
            .map_err(|e| ControlError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::parse(&text)
            .map_err(|e| ControlError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    fn parse(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// `$XDG_CONFIG_HOME/lofictl/config.toml`, falling back through `$HOME`.
    pub fn config_path() -> Option<PathBuf> {
        let base = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
        Some(base.join("lofictl").join("config.toml"))
    }

    /// Spawn configuration for the local player.
    pub fn spawn_config(&self) -> SpawnConfig {
        SpawnConfig {
            binary: self.player_binary.clone(),
            socket_path: self.socket_path.clone(),
            extra_args: self.extra_player_args.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn empty_config_yields_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.player_binary, "mpv");
        assert_eq!(config.volume, 50);
        assert!(config.targets.is_empty());
    }

    #[test]
    fn targets_parse_from_toml_tables() {
        let config = Config::parse(
            r#"
volume = 30

[[targets]]
id = "r1"
name = "Chill Beats"
uri = "http://x/stream"
"#,
        )
        .unwrap();
        assert_eq!(config.volume, 30);
        assert_eq!(config.targets.len(), 1);
        assert_eq!(config.targets[0].id, "r1");
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(Config::parse("volume = [").is_err());
    }
}
