use anyhow::Result;
use crate::extract::ArchiveFormat;
use crate::util::sort_versions_desc;
use super::{ToolSource, github_release_tags};

/// OpenTofu, the Linux Foundation fork of Terraform, released on GitHub.
///
/// Release tags keep the `v` prefix while artifact filenames drop it:
/// `.../download/v1.8.0/tofu_1.8.0_<os>_<arch>.zip`
pub struct OpenTofu;

fn split_tag(version: &str) -> (String, &str) {
    let tag = if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{version}")
    };
    (tag, version.trim_start_matches('v'))
}

impl ToolSource for OpenTofu {
    fn name(&self) -> &str {
        "tofu"
    }

    fn download_url(&self, version: &str, os: &str, arch: &str) -> String {
        let (tag, number) = split_tag(version);
        format!(
            "https://github.com/opentofu/opentofu/releases/download/{tag}/tofu_{number}_{os}_{arch}.zip"
        )
    }

    fn checksum_url(&self, version: &str, _os: &str, _arch: &str) -> String {
        let (tag, number) = split_tag(version);
        format!(
            "https://github.com/opentofu/opentofu/releases/download/{tag}/tofu_{number}_SHA256SUMS"
        )
    }

    fn list_versions(&self) -> Result<Vec<String>> {
        let mut versions = github_release_tags("opentofu/opentofu")?;
        sort_versions_desc(&mut versions);
        Ok(versions)
    }

    fn binary_name(&self) -> &str {
        "tofu"
    }

    fn archive_format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn supported_archs(&self) -> &[&str] {
        &["amd64", "arm64", "386", "arm"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_url_keeps_v_in_the_tag_only() {
        let url = OpenTofu.download_url("v1.8.0", "linux", "arm64");
        assert_eq!(
            url,
            "https://github.com/opentofu/opentofu/releases/download/v1.8.0/tofu_1.8.0_linux_arm64.zip"
        );
        assert_eq!(url, OpenTofu.download_url("1.8.0", "linux", "arm64"));
    }

    #[test]
    fn test_checksum_url_follows_the_same_shape() {
        assert_eq!(
            OpenTofu.checksum_url("1.8.0", "linux", "arm64"),
            "https://github.com/opentofu/opentofu/releases/download/v1.8.0/tofu_1.8.0_SHA256SUMS"
        );
    }

    #[test]
    fn test_artifact_shape() {
        assert_eq!(OpenTofu.binary_name(), "tofu");
        assert_eq!(OpenTofu.archive_format(), ArchiveFormat::Zip);
    }
}
