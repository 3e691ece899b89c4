// User settings
// Loaded from ~/.config/casework/settings.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read {path}: {message}")]
    Read { path: String, message: String },
    #[error("invalid settings in {path}: {message}")]
    Parse { path: String, message: String },
    #[error("cannot write {path}: {message}")]
    Write { path: String, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// SQLite database holding the casework tables.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupSettings {
    /// Engine config file; built-in defaults when unset.
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `env_logger` filter; `RUST_LOG` takes precedence.
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { filter: "info".into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub dedup: DedupSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("casework");
        config_dir.join("settings.toml")
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("{e}");
                eprintln!("Using default settings");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        toml::from_str(&contents).map_err(|e| SettingsError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save current settings to `path`, creating its directory.
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let write_err = |message: String| SettingsError::Write {
            path: path.display().to_string(),
            message,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| write_err(e.to_string()))?;
        fs::write(path, text).map_err(|e| write_err(e.to_string()))
    }

    /// CLI value first, then the settings file.
    pub fn store_path(&self, flag: Option<&Path>) -> Option<PathBuf> {
        flag.map(Path::to_path_buf).or_else(|| self.store.path.clone())
    }

    pub fn dedup_config_path(&self, flag: Option<&Path>) -> Option<PathBuf> {
        flag.map(Path::to_path_buf).or_else(|| self.dedup.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_use_defaults() {
        let settings: Settings = toml::from_str("[store]\npath = \"/srv/casework.db\"\n").unwrap();
        assert_eq!(settings.store.path, Some(PathBuf::from("/srv/casework.db")));
        assert_eq!(settings.dedup.config, None);
        assert_eq!(settings.log.filter, "info");
    }

    #[test]
    fn flags_override_file() {
        let settings = Settings {
            store: StoreSettings { path: Some("a.db".into()) },
            ..Settings::default()
        };
        assert_eq!(settings.store_path(None), Some(PathBuf::from("a.db")));
        assert_eq!(settings.store_path(Some(Path::new("b.db"))), Some(PathBuf::from("b.db")));
        assert_eq!(settings.dedup_config_path(None), None);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/settings.toml");
        let settings = Settings {
            dedup: DedupSettings { config: Some("dedup.toml".into()) },
            log: LogSettings { filter: "casework_dedup=debug".into() },
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn parse_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "[log]\nfilter = 3\n").unwrap();
        let err = Settings::load_from(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
        assert!(err.to_string().contains("settings.toml"));
    }

    #[test]
    fn path_ends_in_casework_dir() {
        let path = Settings::config_path();
        assert!(path.ends_with("casework/settings.toml"));
    }
}
