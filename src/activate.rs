use std::fs;
use std::io;
use std::path::Path;
use anyhow::{Result, anyhow};
use log::debug;
use crate::error::UserError;

#[cfg(unix)]
use std::os::unix::fs::symlink;
#[cfg(windows)]
use std::os::windows::fs::symlink_file as symlink;

/// Creates the activation link for a tool, refusing to touch an existing one.
///
/// `symlink_metadata` is used for the existence check so a dangling link
/// counts as existing too.
pub fn create_link(source: &Path, link: &Path) -> Result<()> {
    ensure_source_exists(source, link)?;
    if fs::symlink_metadata(link).is_ok() {
        return Err(UserError::new(
            format!("failed to create link {}", link.display()),
            "the link already exists",
            "Use the update operation to replace an existing link",
        )
        .into());
    }
    symlink(source, link).map_err(|e| {
        UserError::new(
            format!("failed to create link {}", link.display()),
            e.to_string(),
            "Check write permissions for the bin directory",
        )
    })?;
    debug!("linked {} -> {}", link.display(), source.display());
    Ok(())
}

/// Atomically points `link` at `source`, creating it if absent.
///
/// The replacement link is materialized under a temporary name in the same
/// directory as `link` and renamed over it, so the rename never crosses a
/// filesystem and a reader resolves either the previous or the new target,
/// never a missing or half-written one. A failed rename removes the
/// temporary link again.
pub fn update_link(source: &Path, link: &Path) -> Result<()> {
    ensure_source_exists(source, link)?;
    let dir = link
        .parent()
        .ok_or_else(|| anyhow!("link path {} has no parent directory", link.display()))?;
    fs::create_dir_all(dir).map_err(|e| {
        UserError::new(
            format!("failed to create directory {}", dir.display()),
            e.to_string(),
            "Check write permissions for the bin directory",
        )
    })?;

    let staged = tempfile::Builder::new()
        .prefix(".toolchest-link-")
        .make_in(dir, |path| symlink(source, path))
        .map_err(|e| {
            UserError::new(
                format!("failed to stage a replacement link in {}", dir.display()),
                e.to_string(),
                "Check write permissions for the bin directory",
            )
        })?;

    staged.into_temp_path().persist(link).map_err(|e| {
        UserError::new(
            format!("failed to update link {}", link.display()),
            e.to_string(),
            "Check write permissions for the bin directory",
        )
    })?;
    debug!("linked {} -> {}", link.display(), source.display());
    Ok(())
}

/// Removes the activation link. Succeeds when it is already gone.
pub fn remove_link(link: &Path) -> Result<()> {
    match fs::symlink_metadata(link) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(UserError::new(
            format!("failed to inspect link {}", link.display()),
            e.to_string(),
            "Check permissions for the bin directory",
        )
        .into()),
        Ok(_) => fs::remove_file(link).map_err(|e| {
            UserError::new(
                format!("failed to remove link {}", link.display()),
                e.to_string(),
                "Check write permissions for the bin directory",
            )
            .into()
        }),
    }
}

/// Checks that `link` still resolves to `expected_source`.
///
/// Detects drift between the registry and the filesystem; it never repairs.
pub fn verify_link(link: &Path, expected_source: &Path) -> Result<()> {
    let target = fs::read_link(link).map_err(|e| {
        UserError::new(
            format!("failed to read link {}", link.display()),
            e.to_string(),
            "Activate a version to recreate the link",
        )
    })?;
    if target != expected_source {
        return Err(UserError::new(
            format!("link {} is out of sync", link.display()),
            format!(
                "points at {}, expected {}",
                target.display(),
                expected_source.display()
            ),
            "Re-activate the wanted version to fix the link",
        )
        .into());
    }
    Ok(())
}

/// Reads the version segment out of a link target shaped like
/// `<tools>/<tool>/<version>/<binary>`. Returns `None` when the link is
/// absent or the target has a different shape.
pub fn active_version(link: &Path, tool: &str) -> Option<String> {
    let target = fs::read_link(link).ok()?;
    let mut components = target.components();
    while let Some(component) = components.next() {
        if component.as_os_str() == std::ffi::OsStr::new(tool) {
            return components
                .next()
                .map(|v| v.as_os_str().to_string_lossy().into_owned());
        }
    }
    None
}

fn ensure_source_exists(source: &Path, link: &Path) -> Result<()> {
    fs::metadata(source).map_err(|e| {
        UserError::new(
            format!("failed to link {}", link.display()),
            format!("source {} does not exist: {e}", source.display()),
            "Install the version before activating it",
        )
    })?;
    Ok(())
}
