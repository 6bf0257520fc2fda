use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

/// Which resolution path the orchestrator is allowed to take.
///
/// `System` resolves through the OS-level single-fix probe, `Local` goes
/// through the raw network-location helper only, `Hybrid` may use both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeocoderPolicy {
    #[default]
    System,
    Local,
    Hybrid,
}

/// How much provenance detail is written into the stored location source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UpdateDetail {
    #[default]
    Nothing,
    LocationSource,
}

/// Location acquisition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Whether the auto location may be updated at all.
    #[serde(default = "default_true")]
    pub update_location_enabled: bool,

    /// GPS enabled by user preference (device settings are checked separately).
    #[serde(default = "default_true")]
    pub gps_enabled: bool,

    /// Resolution policy.
    #[serde(default)]
    pub geocoder: GeocoderPolicy,

    /// Provenance detail level for the stored source status.
    #[serde(default)]
    pub update_detail: UpdateDetail,

    /// Language tag passed to the address resolver.
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_true() -> bool {
    true
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            update_location_enabled: true,
            gps_enabled: true,
            geocoder: GeocoderPolicy::default(),
            update_detail: UpdateDetail::default(),
            language: default_language(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Location acquisition settings
    #[serde(default)]
    pub location: LocationConfig,
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("geofix");

        Self {
            config_dir,
            location: LocationConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating defaults if it doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, written or parsed.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Save configuration to file.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or the file written.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;

        tracing::debug!("Saved config to {}", config_path.display());
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("geofix");
        Ok(dir.join("config.toml"))
    }

    /// Validate the configuration, returning human-readable problems.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.location.language.trim().is_empty() {
            problems.push("location.language: must not be empty".to_string());
        }
        if !self.location.gps_enabled && self.location.geocoder == GeocoderPolicy::System {
            problems.push(
                "location: system geocoder with GPS disabled relies on the network provider only"
                    .to_string(),
            );
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_location_config() {
        let config = LocationConfig::default();
        assert!(config.update_location_enabled);
        assert!(config.gps_enabled);
        assert_eq!(config.geocoder, GeocoderPolicy::System);
        assert_eq!(config.update_detail, UpdateDetail::Nothing);
        assert_eq!(config.language, "en");
    }

    #[test]
    fn test_load_from_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "config_dir = \"/tmp/geofix\"\n\n[location]\ngeocoder = \"hybrid\"\ngps_enabled = false"
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.location.geocoder, GeocoderPolicy::Hybrid);
        assert!(!config.location.gps_enabled);
        // Omitted keys fall back to defaults.
        assert!(config.location.update_location_enabled);
        assert_eq!(config.location.language, "en");
    }

    #[test]
    fn test_load_from_malformed_file_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not valid toml [").unwrap();
        assert!(Config::load_from(file.path()).is_err());
    }

    #[test]
    fn test_validate_flags_empty_language() {
        let mut config = Config::default();
        config.location.language = String::new();
        let problems = config.validate();
        assert!(problems.iter().any(|p| p.contains("language")));
    }
}
