use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use crate::error::UserError;

/// User defaults, kept as TOML at `<home>/config.toml`.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Tool name -> the version last activated for it.
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
}

impl Config {
    /// Loads the config at `path`. A missing file is an empty config; a
    /// parse failure on an existing file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|e| {
            UserError::new(
                format!("failed to read config {}", path.display()),
                e.to_string(),
                "Check read permissions for the toolchest home",
            )
        })?;
        toml::from_str(&raw).map_err(|e| {
            UserError::new(
                format!("failed to parse config {}", path.display()),
                e.to_string(),
                "Fix the TOML syntax or remove the file to start fresh",
            )
            .into()
        })
    }

    /// Persists the config with the same temp-file-then-rename discipline as
    /// the registry.
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = toml::to_string_pretty(self).context("failed to serialize the config")?;
        let dir = path
            .parent()
            .ok_or_else(|| anyhow!("config path {} has no parent directory", path.display()))?;
        fs::create_dir_all(dir).map_err(|e| {
            UserError::new(
                format!("failed to create directory {}", dir.display()),
                e.to_string(),
                "Check write permissions for the toolchest home",
            )
        })?;

        let mut staged = NamedTempFile::new_in(dir).map_err(|e| {
            UserError::new(
                format!("failed to stage the config in {}", dir.display()),
                e.to_string(),
                "Check write permissions for the toolchest home",
            )
        })?;
        staged.write_all(raw.as_bytes()).map_err(|e| {
            UserError::new(
                format!("failed to write the staged config in {}", dir.display()),
                e.to_string(),
                "The disk may be full",
            )
        })?;
        staged.persist(path).map_err(|e| {
            UserError::new(
                format!("failed to save config {}", path.display()),
                e.to_string(),
                "Check write permissions for the toolchest home",
            )
        })?;
        Ok(())
    }

    /// Sets the default version for a tool; an empty version clears it.
    pub fn set_default(&mut self, tool: &str, version: &str) {
        if version.is_empty() {
            self.defaults.remove(tool);
        } else {
            self.defaults.insert(tool.to_string(), version.to_string());
        }
    }

    pub fn get_default(&self, tool: &str) -> Option<&str> {
        self.defaults.get(tool).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.set_default("terraform", "v1.6.0");
        config.set_default("tofu", "v1.8.0");
        config.save(&path).unwrap();

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded, config);
        assert_eq!(reloaded.get_default("terraform"), Some("v1.6.0"));
    }

    #[test]
    fn test_load_missing_file_yields_empty_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert!(config.defaults.is_empty());
    }

    #[test]
    fn test_load_rejects_damaged_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "defaults = [broken").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_set_default_with_empty_version_clears_the_entry() {
        let mut config = Config::default();
        config.set_default("terraform", "v1.6.0");
        config.set_default("terraform", "");
        assert_eq!(config.get_default("terraform"), None);
    }
}
