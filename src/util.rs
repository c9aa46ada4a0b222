use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow, bail};
use regex::Regex;
use semver::Version;
use walkdir::WalkDir;

/// Checks a tool name: lowercase alphanumeric and hyphens, with no leading,
/// trailing or doubled hyphen.
pub fn validate_tool_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("tool name cannot be empty");
    }
    let re = Regex::new(r"^[a-z0-9-]+$")?;
    if !re.is_match(name) {
        bail!(
            "invalid tool name '{}': only lowercase letters, digits and hyphens are allowed",
            name
        );
    }
    if name.starts_with('-') || name.ends_with('-') || name.contains("--") {
        bail!("invalid tool name '{}': stray hyphen", name);
    }
    Ok(())
}

/// Checks a version string: semver with an optional `v` prefix and an
/// optional pre-release suffix.
pub fn validate_version(version: &str) -> Result<()> {
    if version.is_empty() {
        bail!("version cannot be empty");
    }
    let re = Regex::new(r"^v?\d+\.\d+\.\d+(-[a-zA-Z0-9.-]+)?$")?;
    if !re.is_match(version) {
        bail!(
            "invalid version '{}': expected semantic versioning like v1.6.0 or 1.6.0-beta1",
            version
        );
    }
    Ok(())
}

/// Normalizes a version string so it carries the leading `v`.
pub fn normalize_version(version: &str) -> Result<String> {
    validate_version(version)?;
    if version.starts_with('v') {
        Ok(version.to_string())
    } else {
        Ok(format!("v{version}"))
    }
}

/// Splits a `<tool>@<version>` argument into its two halves.
pub fn split_spec(spec: &str) -> Result<(String, String)> {
    match spec.split_once('@') {
        Some((tool, version)) if !tool.is_empty() && !version.is_empty() => {
            Ok((tool.to_string(), version.to_string()))
        }
        _ => bail!("invalid argument '{}': expected <tool>@<version>, e.g. terraform@v1.6.0", spec),
    }
}

/// Resolves the digest for `filename` out of a `<hex-digest>  <filename>`
/// checksum list.
pub fn digest_for_file(list: &str, filename: &str) -> Result<String> {
    for line in list.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(digest), Some(name)) = (fields.next(), fields.next()) else {
            continue;
        };
        // sha256sum marks binary-mode entries with a leading '*'
        if name.trim_start_matches('*') == filename {
            return Ok(digest.to_string());
        }
    }
    bail!("no checksum entry for '{}' in the checksum list", filename)
}

/// Sorts version strings newest first. Tags that do not parse as semver sort
/// after everything that does.
pub fn sort_versions_desc(versions: &mut [String]) {
    versions.sort_by(|a, b| {
        let a_parsed = Version::parse(a.trim_start_matches('v'));
        let b_parsed = Version::parse(b.trim_start_matches('v'));
        match (a_parsed, b_parsed) {
            (Ok(a), Ok(b)) => b.cmp(&a),
            (Ok(_), Err(_)) => std::cmp::Ordering::Less,
            (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
            (Err(_), Err(_)) => b.cmp(a),
        }
    });
}

/// Host platform as the (os, arch) pair used in release artifact names.
pub fn current_platform() -> (&'static str, &'static str) {
    let os = match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    };
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        other => other,
    };
    (os, arch)
}

/// `os/arch` tag recorded alongside every installation.
pub fn arch_tag() -> String {
    let (os, arch) = current_platform();
    format!("{os}/{arch}")
}

/// Finds the named binary below `dir`, preferring the shallowest match.
/// Some releases nest the binary in a subdirectory of the archive.
pub fn locate_binary(dir: &Path, name: &str) -> Result<PathBuf> {
    let direct = dir.join(name);
    if direct.is_file() {
        return Ok(direct);
    }
    let mut candidates = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if entry.file_type().is_file() && entry.file_name().to_string_lossy() == name {
            candidates.push(entry.into_path());
        }
    }
    candidates.sort_by_key(|p| p.components().count());
    candidates
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("no binary named '{}' found under '{}'", name, dir.display()))
}

/// Formats a byte count for humans.
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let units = ["KB", "MB", "GB", "TB"];
    format!("{:.1} {}", bytes as f64 / div as f64, units[exp])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_validate_tool_name_accepts_plain_names() {
        assert!(validate_tool_name("terraform").is_ok());
        assert!(validate_tool_name("my-tool2").is_ok());
    }

    #[test]
    fn test_validate_tool_name_rejects_bad_names() {
        assert!(validate_tool_name("").is_err());
        assert!(validate_tool_name("Terraform").is_err());
        assert!(validate_tool_name("-tool").is_err());
        assert!(validate_tool_name("tool-").is_err());
        assert!(validate_tool_name("to--ol").is_err());
        assert!(validate_tool_name("tool name").is_err());
    }

    #[test]
    fn test_validate_version() {
        assert!(validate_version("v1.6.0").is_ok());
        assert!(validate_version("1.6.0").is_ok());
        assert!(validate_version("1.6.0-beta1").is_ok());
        assert!(validate_version("1.6").is_err());
        assert!(validate_version("latest").is_err());
    }

    #[test]
    fn test_normalize_version_adds_prefix_once() {
        assert_eq!(normalize_version("1.6.0").unwrap(), "v1.6.0");
        assert_eq!(normalize_version("v1.6.0").unwrap(), "v1.6.0");
    }

    #[test]
    fn test_split_spec() {
        assert_eq!(
            split_spec("terraform@v1.6.0").unwrap(),
            ("terraform".to_string(), "v1.6.0".to_string())
        );
        assert!(split_spec("terraform").is_err());
        assert!(split_spec("@v1.6.0").is_err());
        assert!(split_spec("terraform@").is_err());
    }

    #[test]
    fn test_digest_for_file_picks_matching_line() {
        let list = "aaaa  terraform_1.6.0_linux_amd64.zip\nbbbb  terraform_1.6.0_darwin_arm64.zip\n";
        assert_eq!(digest_for_file(list, "terraform_1.6.0_darwin_arm64.zip").unwrap(), "bbbb");
        assert!(digest_for_file(list, "missing.zip").is_err());
    }

    #[test]
    fn test_digest_for_file_handles_binary_marker() {
        let list = "cccc  *terragrunt_linux_amd64\n";
        assert_eq!(digest_for_file(list, "terragrunt_linux_amd64").unwrap(), "cccc");
    }

    #[test]
    fn test_sort_versions_desc_orders_newest_first() {
        let mut versions = vec![
            "v1.0.0".to_string(),
            "v1.10.0".to_string(),
            "v1.2.0".to_string(),
        ];
        sort_versions_desc(&mut versions);
        assert_eq!(versions, vec!["v1.10.0", "v1.2.0", "v1.0.0"]);
    }

    #[test]
    fn test_sort_versions_desc_pushes_unparsable_tags_last() {
        let mut versions = vec!["garbage".to_string(), "v1.0.0".to_string()];
        sort_versions_desc(&mut versions);
        assert_eq!(versions, vec!["v1.0.0", "garbage"]);
    }

    #[test]
    fn test_locate_binary_prefers_top_level() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("tool"), b"deep").unwrap();
        fs::write(dir.path().join("tool"), b"shallow").unwrap();
        let found = locate_binary(dir.path(), "tool").unwrap();
        assert_eq!(found, dir.path().join("tool"));
    }

    #[test]
    fn test_locate_binary_descends_when_needed() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("tool"), b"deep").unwrap();
        let found = locate_binary(dir.path(), "tool").unwrap();
        assert_eq!(found, dir.path().join("sub").join("tool"));
        assert!(locate_binary(dir.path(), "other").is_err());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
