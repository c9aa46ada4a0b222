use std::collections::HashMap;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use crate::extract::ArchiveFormat;
use crate::util::sort_versions_desc;
use super::{LIST_TIMEOUT, ToolSource, USER_AGENT};

/// HashiCorp Terraform, served from releases.hashicorp.com.
///
/// Release URLs drop the `v` prefix:
/// `https://releases.hashicorp.com/terraform/<ver>/terraform_<ver>_<os>_<arch>.zip`
pub struct Terraform;

impl ToolSource for Terraform {
    fn name(&self) -> &str {
        "terraform"
    }

    fn download_url(&self, version: &str, os: &str, arch: &str) -> String {
        let version = version.trim_start_matches('v');
        format!(
            "https://releases.hashicorp.com/terraform/{version}/terraform_{version}_{os}_{arch}.zip"
        )
    }

    fn checksum_url(&self, version: &str, _os: &str, _arch: &str) -> String {
        let version = version.trim_start_matches('v');
        format!(
            "https://releases.hashicorp.com/terraform/{version}/terraform_{version}_SHA256SUMS"
        )
    }

    fn list_versions(&self) -> Result<Vec<String>> {
        #[derive(Deserialize)]
        struct Index {
            versions: HashMap<String, serde_json::Value>,
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(LIST_TIMEOUT)
            .build()
            .context("failed to build the HTTP client")?;
        let response = client
            .get("https://releases.hashicorp.com/terraform/index.json")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .context("failed to fetch the terraform version index")?;
        if !response.status().is_success() {
            bail!("failed to fetch terraform versions: HTTP {}", response.status());
        }
        let index: Index = response
            .json()
            .context("failed to parse the terraform version index")?;

        let mut versions: Vec<String> = index
            .versions
            .into_keys()
            .map(|version| {
                if version.starts_with('v') {
                    version
                } else {
                    format!("v{version}")
                }
            })
            .collect();
        sort_versions_desc(&mut versions);
        Ok(versions)
    }

    fn binary_name(&self) -> &str {
        "terraform"
    }

    fn archive_format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn supported_archs(&self) -> &[&str] {
        &["amd64", "arm64", "386", "arm"]
    }
}
