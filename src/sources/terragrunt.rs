use anyhow::Result;
use crate::extract::ArchiveFormat;
use crate::util::sort_versions_desc;
use super::{ToolSource, github_release_tags};

/// Terragrunt ships raw binaries on GitHub, one per platform, with a single
/// version-level SHA256SUMS file.
pub struct Terragrunt;

fn ensure_tag(version: &str) -> String {
    if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{version}")
    }
}

impl ToolSource for Terragrunt {
    fn name(&self) -> &str {
        "terragrunt"
    }

    fn download_url(&self, version: &str, os: &str, arch: &str) -> String {
        let tag = ensure_tag(version);
        format!(
            "https://github.com/gruntwork-io/terragrunt/releases/download/{tag}/terragrunt_{os}_{arch}"
        )
    }

    fn checksum_url(&self, version: &str, _os: &str, _arch: &str) -> String {
        let tag = ensure_tag(version);
        format!("https://github.com/gruntwork-io/terragrunt/releases/download/{tag}/SHA256SUMS")
    }

    fn list_versions(&self) -> Result<Vec<String>> {
        let mut versions = github_release_tags("gruntwork-io/terragrunt")?;
        // terragrunt publishes dated alpha tags alongside releases
        versions.retain(|tag| !tag.starts_with("alpha-") && !tag.contains("-alpha"));
        sort_versions_desc(&mut versions);
        Ok(versions)
    }

    fn binary_name(&self) -> &str {
        "terragrunt"
    }

    fn archive_format(&self) -> ArchiveFormat {
        ArchiveFormat::Binary
    }

    fn supported_archs(&self) -> &[&str] {
        &["amd64", "arm64"]
    }
}
