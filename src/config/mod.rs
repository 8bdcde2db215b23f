//! Configuration management

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub session: SessionConfig,
}

/// Network settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7450".to_string(),
        }
    }
}

/// Presence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Minutes after joining before a session is considered stale
    pub expiry_minutes: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { expiry_minutes: 60 }
    }
}

impl Config {
    /// Load config from the default location, or return defaults if absent
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from a specific file, or return defaults if absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("easel")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_when_file_is_missing() {
        let config = Config::load_from(Path::new("/nonexistent/easel.toml")).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:7450");
        assert_eq!(config.session.expiry_minutes, 60);
    }

    #[test]
    fn partial_files_fall_back_per_section() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[session]\nexpiry_minutes = 15").unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.session.expiry_minutes, 15);
        assert_eq!(config.server.bind, "127.0.0.1:7450");
    }
}
