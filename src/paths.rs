use std::path::PathBuf;
use anyhow::{Result, anyhow};
use directories::BaseDirs;

/// Overrides the toolchest home directory (default `~/.toolchest`).
pub const HOME_ENV: &str = "TOOLCHEST_HOME";
/// Overrides the activation-link directory (default `~/.local/bin`).
pub const BIN_DIR_ENV: &str = "TOOLCHEST_BIN_DIR";
/// Overrides the download cache directory (default `<home>/cache`).
pub const CACHE_DIR_ENV: &str = "TOOLCHEST_CACHE_DIR";

fn home_dir() -> Result<PathBuf> {
    let dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not determine the user home directory"))?;
    Ok(dirs.home_dir().to_path_buf())
}

fn expand_tilde(raw: &str) -> Result<PathBuf> {
    if raw == "~" {
        return home_dir();
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        return Ok(home_dir()?.join(rest));
    }
    Ok(PathBuf::from(raw))
}

fn env_or(var: &str, fallback: impl FnOnce() -> Result<PathBuf>) -> Result<PathBuf> {
    match std::env::var(var) {
        Ok(raw) if !raw.is_empty() => expand_tilde(&raw),
        _ => fallback(),
    }
}

/// Root directory holding installed tools, the cache, the config and the
/// installation registry.
pub fn toolchest_home() -> Result<PathBuf> {
    env_or(HOME_ENV, || Ok(home_dir()?.join(".toolchest")))
}

/// Directory holding one activation link per tool.
pub fn bin_dir() -> Result<PathBuf> {
    env_or(BIN_DIR_ENV, || Ok(home_dir()?.join(".local").join("bin")))
}

/// Directory downloaded archives and checksum lists land in.
pub fn cache_dir() -> Result<PathBuf> {
    env_or(CACHE_DIR_ENV, || Ok(toolchest_home()?.join("cache")))
}

/// Directory holding one subdirectory per installed (tool, version) pair.
pub fn tools_dir() -> Result<PathBuf> {
    Ok(toolchest_home()?.join("tools"))
}

/// Path of the installation registry document.
pub fn registry_path() -> Result<PathBuf> {
    Ok(toolchest_home()?.join("installations.json"))
}

/// Path of the user defaults config.
pub fn config_path() -> Result<PathBuf> {
    Ok(toolchest_home()?.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_and_config_live_under_home() {
        let home = toolchest_home().unwrap();
        assert!(registry_path().unwrap().starts_with(&home));
        assert!(config_path().unwrap().starts_with(&home));
        assert!(tools_dir().unwrap().starts_with(&home));
    }

    #[test]
    fn test_expand_tilde_passthrough_for_plain_paths() {
        assert_eq!(expand_tilde("/opt/x").unwrap(), PathBuf::from("/opt/x"));
        assert_eq!(expand_tilde("rel/x").unwrap(), PathBuf::from("rel/x"));
    }

    #[test]
    fn test_expand_tilde_rewrites_home_prefix() {
        let expanded = expand_tilde("~/tools").unwrap();
        assert!(expanded.ends_with("tools"));
        assert!(!expanded.to_string_lossy().contains('~'));
    }
}
