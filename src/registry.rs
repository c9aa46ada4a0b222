use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use crate::error::UserError;
use crate::util::sort_versions_desc;

/// Lifecycle state of one installed version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallStatus {
    #[default]
    Complete,
    Partial,
    Broken,
}

/// Metadata for one installed (tool, version) pair.
///
/// Created on successful extraction, mutated only to update `status`,
/// destroyed on uninstall. Optional and zero fields stay out of the
/// persisted document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolVersion {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    pub binary_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub checksum: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub architecture: String,
    #[serde(default)]
    pub status: InstallStatus,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

/// Durable record of every installed (tool, version) pair.
///
/// Invariant: a tool entry never exists with zero versions. The registry is
/// loaded fresh per invocation, mutated in memory, and persisted explicitly;
/// nothing is cached across invocations.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tools: BTreeMap<String, BTreeMap<String, ToolVersion>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the registry at `path`. A missing file is an empty registry; an
    /// unreadable or unparsable file is an error, never silently discarded.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = fs::read_to_string(path).map_err(|e| {
            UserError::new(
                format!("failed to read registry {}", path.display()),
                e.to_string(),
                "Check read permissions for the toolchest home",
            )
        })?;
        serde_json::from_str(&data).map_err(|e| {
            UserError::new(
                format!("failed to parse registry {}", path.display()),
                e.to_string(),
                "The registry file is damaged; restore it from backup or remove it to start fresh",
            )
            .into()
        })
    }

    /// Persists the whole registry atomically: the serialized document goes
    /// to a temporary file in the registry's own directory and is renamed
    /// over the destination, so a reader never sees a torn write.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(self).context("failed to serialize the registry")?;
        let dir = path
            .parent()
            .ok_or_else(|| anyhow!("registry path {} has no parent directory", path.display()))?;
        fs::create_dir_all(dir).map_err(|e| {
            UserError::new(
                format!("failed to create directory {}", dir.display()),
                e.to_string(),
                "Check write permissions for the toolchest home",
            )
        })?;

        let mut staged = NamedTempFile::new_in(dir).map_err(|e| {
            UserError::new(
                format!("failed to stage the registry in {}", dir.display()),
                e.to_string(),
                "Check write permissions for the toolchest home",
            )
        })?;
        staged.write_all(&data).map_err(|e| {
            UserError::new(
                format!("failed to write the staged registry in {}", dir.display()),
                e.to_string(),
                "The disk may be full",
            )
        })?;
        staged.persist(path).map_err(|e| {
            UserError::new(
                format!("failed to save registry {}", path.display()),
                e.to_string(),
                "Check write permissions for the toolchest home",
            )
        })?;
        debug!("saved registry {}", path.display());
        Ok(())
    }

    /// Inserts or overwrites a version record.
    pub fn add_version(&mut self, tool: &str, version: &str, record: ToolVersion) {
        self.tools
            .entry(tool.to_string())
            .or_default()
            .insert(version.to_string(), record);
    }

    /// Deletes a version record; the tool entry goes with its last version.
    pub fn remove_version(&mut self, tool: &str, version: &str) {
        if let Some(versions) = self.tools.get_mut(tool) {
            versions.remove(version);
            if versions.is_empty() {
                self.tools.remove(tool);
            }
        }
    }

    pub fn get_version(&self, tool: &str, version: &str) -> Option<&ToolVersion> {
        self.tools.get(tool)?.get(version)
    }

    /// Installed versions of `tool`, newest first.
    pub fn list_versions(&self, tool: &str) -> Vec<String> {
        let mut versions: Vec<String> = self
            .tools
            .get(tool)
            .map(|versions| versions.keys().cloned().collect())
            .unwrap_or_default();
        sort_versions_desc(&mut versions);
        versions
    }

    pub fn list_tools(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn is_installed(&self, tool: &str, version: &str) -> bool {
        self.get_version(tool, version).is_some()
    }
}
