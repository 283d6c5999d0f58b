//! Client settings
//!
//! Loaded from TOML once at startup and handed to whatever needs them.
//! Every field has a default so a missing or partial file still works.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::input::{Key, KeyBinding};

/// Port RateLimit servers listen on unless configured otherwise
pub const DEFAULT_PORT: u16 = 7654;

/// All client settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub game: GameSettings,
    pub net: NetSettings,
    pub controls: Controls,
}

impl Settings {
    /// Parse settings from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load settings from a file, falling back to defaults when it is absent
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                tracing::info!(path = %path.display(), "Loaded settings");
                Self::from_toml_str(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No settings file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Where the server lives and how to authenticate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Shared secret presented in the handshake
    pub password: String,
    /// Fixed node id; lets several clients run on one machine
    pub node: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            password: String::new(),
            node: None,
        }
    }
}

/// Frame sync tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// Frames an observer may fall behind before frames are skipped
    pub max_frame_lag: u64,
    /// Frames replayed per second while catching up
    pub replay_frame_rate: f64,
    pub peek_interval_ms: u64,
}

impl GameSettings {
    pub fn peek_interval(&self) -> Duration {
        Duration::from_millis(self.peek_interval_ms)
    }
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            max_frame_lag: 25,
            replay_frame_rate: 4.0,
            peek_interval_ms: 1000,
        }
    }
}

/// Transport timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetSettings {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub retry_delay_ms: u64,
}

impl NetSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for NetSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5000,
            request_timeout_ms: 5000,
            retry_delay_ms: 1000,
        }
    }
}

/// Movement keys in wire order: north, east, south, west
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Directions {
    pub north: KeyBinding,
    pub east: KeyBinding,
    pub south: KeyBinding,
    pub west: KeyBinding,
}

impl Default for Directions {
    fn default() -> Self {
        Self {
            north: KeyBinding::new([Key::Char('w'), Key::Up]),
            east: KeyBinding::new([Key::Char('d'), Key::Right]),
            south: KeyBinding::new([Key::Char('s'), Key::Down]),
            west: KeyBinding::new([Key::Char('a'), Key::Left]),
        }
    }
}

/// Key bindings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Controls {
    pub directions: Directions,
    pub enter_scene: KeyBinding,
    pub end_turn: KeyBinding,
    pub confirm: KeyBinding,
    pub report: KeyBinding,
    pub quit: KeyBinding,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            directions: Directions::default(),
            enter_scene: KeyBinding::new([Key::Enter]),
            end_turn: KeyBinding::new([Key::Char('e')]),
            confirm: KeyBinding::new([Key::Enter]),
            report: KeyBinding::new([Key::Char('y')]),
            quit: KeyBinding::new([Key::Esc]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.game.max_frame_lag, 25);
        assert_eq!(settings.game.peek_interval(), Duration::from_secs(1));
        assert!(settings.server.node.is_none());
        assert!(settings.controls.directions.north.matches(Key::Up));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = Settings::from_toml_str(
            r#"
[server]
host = "game.example.net"
password = "hunter2"
node = "alice-laptop"

[game]
max_frame_lag = 10

[controls]
end_turn = ["t", "enter"]
"#,
        )
        .unwrap();

        assert_eq!(settings.server.host, "game.example.net");
        assert_eq!(settings.server.port, DEFAULT_PORT);
        assert_eq!(settings.server.node.as_deref(), Some("alice-laptop"));
        assert_eq!(settings.game.max_frame_lag, 10);
        assert_eq!(settings.game.replay_frame_rate, 4.0);
        assert!(settings.controls.end_turn.matches(Key::Enter));
        assert!(settings.controls.quit.matches(Key::Esc));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::load(&temp.path().join("settings.toml")).unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
    }

    #[test]
    fn test_load_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.toml");
        std::fs::write(&path, "[net]\nretry_delay_ms = 250\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.net.retry_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_file_is_error() {
        assert!(Settings::from_toml_str("[game]\nmax_frame_lag = \"lots\"").is_err());
    }
}
