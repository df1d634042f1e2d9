//! Code for loading program settings.
use crate::get_hydro_trader_config_dir;
use crate::input::read_toml;
use crate::log::DEFAULT_LOG_LEVEL;
use anyhow::{Result, ensure};
use documented::DocumentedFields;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SETTINGS_FILE_NAME: &str = "settings.toml";

const DEFAULT_SETTINGS_FILE_HEADER: &str = "# This file contains the program settings for hydro_trader
# Uncomment a line to change the setting from its default value
";

/// Default log level for program
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// Get the path to where the settings file will be read from
pub fn get_settings_file_path() -> PathBuf {
    let mut path = get_hydro_trader_config_dir();
    path.push(SETTINGS_FILE_NAME);

    path
}

/// Program settings from config file
#[derive(Debug, DocumentedFields, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// The default program log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Settings for serving matches
    #[serde(default)]
    pub server: ServerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            server: ServerSettings::default(),
        }
    }
}

/// Settings for serving a match
#[derive(Debug, Clone, DocumentedFields, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    /// Identifier players must give to join the match
    pub match_id: String,
    /// Password players must give to join the match
    pub player_password: String,
    /// Password needed to start or reset the match
    pub admin_password: String,
    /// Time between timesteps, in milliseconds
    pub tick_interval_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            match_id: "game1".into(),
            player_password: "123".into(),
            admin_password: "1234".into(),
            tick_interval_ms: 1000,
        }
    }
}

impl ServerSettings {
    /// Time between timesteps
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Settings {
    /// Read the contents of the program settings file.
    ///
    /// If the file is not present, default values for settings will be used
    ///
    /// # Returns
    ///
    /// The program settings as a `Settings` struct or an error if the file is invalid
    pub fn load() -> Result<Settings> {
        Self::load_from_path(&get_settings_file_path())
    }

    /// Read from the specified path, falling back to defaults if there is no file
    fn load_from_path(file_path: &Path) -> Result<Settings> {
        if !file_path.is_file() {
            return Ok(Settings::default());
        }

        let settings: Settings = read_toml(file_path)?;
        ensure!(
            settings.server.tick_interval_ms > 0,
            "tick_interval_ms must be greater than zero"
        );

        Ok(settings)
    }

    /// The contents of the default settings file
    pub fn default_file_contents() -> String {
        // Settings object with default values set by serde
        let settings: Settings =
            toml::from_str("").expect("Cannot create settings from empty TOML file");

        // Convert to TOML
        let settings_raw = toml::to_string(&settings).expect("Could not convert settings to TOML");

        // Iterate through the generated TOML, commenting out lines and adding docs
        let mut out = DEFAULT_SETTINGS_FILE_HEADER.to_string();
        let mut in_server_table = false;
        for line in settings_raw.split('\n') {
            let line = line.trim();
            if line.starts_with('[') {
                in_server_table = line == "[server]";
                write!(&mut out, "\n# {line}\n").unwrap();
            } else if let Some(last) = line.find('=') {
                // Use doc comment to document parameter. All fields should have doc comments.
                let field = line[..last].trim();
                let docs = if in_server_table {
                    ServerSettings::get_field_docs(field)
                } else {
                    Settings::get_field_docs(field)
                }
                .expect("Missing doc comment for field");
                for line in docs.split('\n') {
                    write!(&mut out, "\n# # {}\n", line.trim()).unwrap();
                }

                writeln!(&mut out, "# {line}").unwrap();
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_settings_load_from_path_no_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(SETTINGS_FILE_NAME); // NB: doesn't exist
        assert_eq!(
            Settings::load_from_path(&file_path).unwrap(),
            Settings::default()
        );
    }

    #[test]
    fn test_settings_load_from_path() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(SETTINGS_FILE_NAME);

        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "log_level = \"warn\"\n\n[server]\nmatch_id = \"final\"").unwrap();
        }

        assert_eq!(
            Settings::load_from_path(&file_path).unwrap(),
            Settings {
                log_level: "warn".to_string(),
                server: ServerSettings {
                    match_id: "final".to_string(),
                    ..ServerSettings::default()
                }
            }
        );
    }

    #[test]
    fn test_settings_load_from_path_zero_tick() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(SETTINGS_FILE_NAME);

        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "[server]\ntick_interval_ms = 0").unwrap();
        }

        assert!(Settings::load_from_path(&file_path).is_err());
    }

    #[test]
    fn test_default_file_contents() {
        let contents = Settings::default_file_contents();
        assert!(contents.contains("# log_level = \"info\""));
        assert!(contents.contains("# [server]"));
        assert!(contents.contains("# tick_interval_ms = 1000"));

        // Every setting is commented out, so the file should parse to the defaults
        let settings: Settings = toml::from_str(&contents).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_tick_interval() {
        let settings = ServerSettings {
            tick_interval_ms: 250,
            ..ServerSettings::default()
        };
        assert_eq!(settings.tick_interval(), Duration::from_millis(250));
    }
}
