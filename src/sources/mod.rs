//! Tool sources: where releases live and how their artifacts are shaped.
//!
//! Each supported tool implements [`ToolSource`]; the install pipeline only
//! ever talks to the trait. New tools are added by implementing it and
//! registering an instance in a [`SourceRegistry`] — the pipeline itself
//! never changes.

mod terraform;
mod terragrunt;
mod tofu;

pub use terraform::Terraform;
pub use terragrunt::Terragrunt;
pub use tofu::OpenTofu;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use crate::extract::ArchiveFormat;

pub(crate) const LIST_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const USER_AGENT: &str = concat!("toolchest/", env!("CARGO_PKG_VERSION"));

/// Everything the pipeline needs to know about one supported tool.
pub trait ToolSource: Send + Sync {
    /// Unique lowercase identifier, also the binary's invocation name.
    fn name(&self) -> &str;

    /// HTTPS URL of the release artifact for `version` on `os`/`arch`.
    fn download_url(&self, version: &str, os: &str, arch: &str) -> String;

    /// HTTPS URL of the checksum list covering that artifact.
    fn checksum_url(&self, version: &str, os: &str, arch: &str) -> String;

    /// All published versions, newest first.
    fn list_versions(&self) -> Result<Vec<String>>;

    /// Name of the executable inside the artifact.
    fn binary_name(&self) -> &str;

    /// Container format of the artifact.
    fn archive_format(&self) -> ArchiveFormat;

    /// CPU architectures the tool publishes artifacts for.
    fn supported_archs(&self) -> &[&str];
}

/// Lookup table of registered sources.
///
/// Registration is exclusive, reads are concurrent. Construct one and pass
/// it by reference to whatever needs lookups; there is no process-global
/// instance.
pub struct SourceRegistry {
    sources: RwLock<HashMap<String, Arc<dyn ToolSource>>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        SourceRegistry {
            sources: RwLock::new(HashMap::new()),
        }
    }

    /// A registry pre-loaded with the shipped sources.
    pub fn builtin() -> Self {
        let registry = Self::new();
        registry
            .register(Arc::new(Terraform))
            .expect("builtin source names are distinct");
        registry
            .register(Arc::new(OpenTofu))
            .expect("builtin source names are distinct");
        registry
            .register(Arc::new(Terragrunt))
            .expect("builtin source names are distinct");
        registry
    }

    /// Adds a source. Fails if the name is already taken.
    pub fn register(&self, source: Arc<dyn ToolSource>) -> Result<()> {
        let name = source.name().to_string();
        let mut sources = self.sources.write().expect("source registry lock poisoned");
        if sources.contains_key(&name) {
            bail!("tool source '{}' is already registered", name);
        }
        sources.insert(name, source);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn ToolSource>> {
        let sources = self.sources.read().expect("source registry lock poisoned");
        sources
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("tool '{}' is not supported", name))
    }

    /// Registered source names, sorted.
    pub fn list(&self) -> Vec<String> {
        let sources = self.sources.read().expect("source registry lock poisoned");
        let mut names: Vec<String> = sources.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
}

/// Fetches release tags for a GitHub `owner/repo`, drafts and prereleases
/// filtered out and the `v` prefix guaranteed. Order is as published;
/// callers sort.
pub(crate) fn github_release_tags(repo: &str) -> Result<Vec<String>> {
    let url = format!("https://api.github.com/repos/{repo}/releases?per_page=100");
    let client = reqwest::blocking::Client::builder()
        .timeout(LIST_TIMEOUT)
        .build()
        .context("failed to build the HTTP client")?;
    let response = client
        .get(&url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .with_context(|| format!("failed to fetch releases for {repo}"))?;
    if !response.status().is_success() {
        bail!("failed to fetch releases for {}: HTTP {}", repo, response.status());
    }
    let releases: Vec<GitHubRelease> = response
        .json()
        .with_context(|| format!("failed to parse releases for {repo}"))?;

    Ok(releases
        .into_iter()
        .filter(|release| !release.draft && !release.prerelease)
        .map(|release| {
            if release.tag_name.starts_with('v') {
                release.tag_name
            } else {
                format!("v{}", release.tag_name)
            }
        })
        .collect())
}
