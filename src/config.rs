use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{NoteError, Result};

/// Application configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory holding the notes and settings documents
    pub data_dir: PathBuf,

    /// File name of the notes document inside `data_dir`
    pub notes_file: String,

    /// File name of the settings document inside `data_dir`
    pub settings_file: String,

    /// Maximum number of prior versions kept per note
    pub max_history: usize,

    /// How often to check the trash for expired notes (in minutes, 0 disables)
    pub purge_interval_minutes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            notes_file: "notes.json".to_string(),
            settings_file: "settings.json".to_string(),
            max_history: 10,
            purge_interval_minutes: 0,
        }
    }
}

impl Config {
    /// Loads configuration from a JSON file, falling back to defaults when
    /// the file does not exist. Keys missing from the file take their
    /// default values.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => {
                let config: Config =
                    serde_json::from_str(&text).map_err(|e| NoteError::ConfigError {
                        message: format!("Invalid config file {}: {}", path.display(), e),
                    })?;
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(
                    "No config file at {}, using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(e) => Err(NoteError::ConfigError {
                message: format!("Failed to read config file {}: {}", path.display(), e),
            }),
        }
    }

    /// Location of the config file when none is given explicitly
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.json"))
    }

    pub fn notes_path(&self) -> PathBuf {
        self.data_dir.join(&self.notes_file)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(&self.settings_file)
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "notekeep")
}

fn default_data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".notekeep"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "data_dir": "/tmp/nk", "max_history": 3 }"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/nk"));
        assert_eq!(config.max_history, 3);
        assert_eq!(config.notes_file, "notes.json");
        assert_eq!(config.notes_path(), PathBuf::from("/tmp/nk/notes.json"));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            Config::load(&path),
            Err(NoteError::ConfigError { .. })
        ));
    }
}
