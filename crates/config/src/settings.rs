// User settings (settings.json)

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const APP_DIR: &str = "cryobank";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Grid
    #[serde(rename = "grid.defaultRows")]
    pub default_rows: u32,

    #[serde(rename = "grid.defaultCols")]
    pub default_cols: u32,

    /// Seed for placeholder grids; None = fresh entropy each run
    #[serde(rename = "grid.seed")]
    pub seed: Option<u64>,

    // Data
    #[serde(rename = "data.databasePath")]
    pub database_path: Option<PathBuf>, // None = platform data dir

    // Display
    #[serde(rename = "display.placeholder")]
    pub placeholder: String,

    #[serde(rename = "display.color")]
    pub color: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Grid
            default_rows: 9,
            default_cols: 9,
            seed: None,
            // Data
            database_path: None,
            // Display
            placeholder: "—".to_string(),
            color: true,
        }
    }
}

const DEFAULT_FILE: &str = r#"{
    // Box grid used when no box is given (rows/cols 6-12 in the box form)
    "grid.defaultRows": 9,
    "grid.defaultCols": 9,

    // Placeholder occupancy seed; null draws a new grid every run
    "grid.seed": null,

    // Inventory database; null = <data dir>/cryobank/inventory.db
    "data.databasePath": null,

    // Shown for absent values in tables
    "display.placeholder": "—",
    "display.color": true
}
"#;

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR);
        config_dir.join("settings.json")
    }

    /// Load settings from the default location, creating a commented default
    /// file on first run.
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            Self::create_default_file(&path);
            return Self::default();
        }
        Self::load_from(&path)
    }

    /// Load settings from `path`, falling back to defaults on any failure
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("error parsing {}: {}; using default settings", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("error reading {}: {}; using default settings", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse settings JSON. Lines starting with `//` are comments.
    pub fn parse(contents: &str) -> Result<Self, String> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        serde_json::from_str(&cleaned).map_err(|e| e.to_string())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(path, json).map_err(|e| e.to_string())
    }

    fn create_default_file(path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                log::warn!("error creating config directory: {}", e);
                return;
            }
        }
        if let Err(e) = fs::write(path, DEFAULT_FILE) {
            log::warn!("error writing default settings.json: {}", e);
        }
    }

    /// Database path: the configured one, or the platform data directory
    pub fn effective_database_path(&self) -> PathBuf {
        match &self.database_path {
            Some(path) => path.clone(),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("inventory.db"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_file_parses_to_defaults() {
        assert_eq!(Settings::parse(DEFAULT_FILE).unwrap(), Settings::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let settings = Settings::parse(
            r#"{
            // only the grid
            "grid.defaultRows": 12,
            "grid.seed": 42
        }"#,
        )
        .unwrap();
        assert_eq!(settings.default_rows, 12);
        assert_eq!(settings.default_cols, 9);
        assert_eq!(settings.seed, Some(42));
        assert_eq!(settings.placeholder, "—");
    }

    #[test]
    fn test_bad_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
        assert_eq!(Settings::load_from(&dir.path().join("missing.json")), Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            database_path: Some(dir.path().join("lab.db")),
            placeholder: "-".into(),
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded, settings);
        assert_eq!(loaded.effective_database_path(), dir.path().join("lab.db"));
    }

    #[test]
    fn test_default_database_path() {
        let path = Settings::default().effective_database_path();
        assert!(path.ends_with("cryobank/inventory.db"));
    }
}
