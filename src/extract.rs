use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use log::debug;
use tar::Archive;
use zip::ZipArchive;
use crate::error::UserError;

/// Container format of a downloaded release artifact.
///
/// Always selected by the tool source, never sniffed from content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
    /// The artifact is the executable itself, no container.
    Binary,
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveFormat::Zip => write!(f, "zip"),
            ArchiveFormat::TarGz => write!(f, "tar.gz"),
            ArchiveFormat::Binary => write!(f, "binary"),
        }
    }
}

/// Unpacks `archive` into `dest`.
///
/// `binary_name` names the executable for `Binary` artifacts, which are
/// copied to `dest/<binary_name>` as-is. Regular entries are written with the
/// executable bit set. Entry types other than files and directories are
/// skipped, so archive content can never plant symlinks.
///
/// Every entry path is validated against `dest` before anything is written;
/// an entry that escapes fails the whole extraction. Writes that already
/// happened are left on disk for the caller to clean up.
pub fn extract(archive: &Path, dest: &Path, format: ArchiveFormat, binary_name: &str) -> Result<()> {
    fs::create_dir_all(dest)
        .with_context(|| format!("failed to create destination {}", dest.display()))?;
    debug!("extracting {} ({}) into {}", archive.display(), format, dest.display());
    match format {
        ArchiveFormat::Zip => extract_zip(archive, dest),
        ArchiveFormat::TarGz => extract_tar_gz(archive, dest),
        ArchiveFormat::Binary => place_binary(archive, dest, binary_name),
    }
}

fn open_archive(archive: &Path) -> Result<File> {
    File::open(archive).map_err(|e| {
        UserError::new(
            format!("failed to open archive {}", archive.display()),
            e.to_string(),
            "Ensure the download completed and the file is readable",
        )
        .into()
    })
}

fn corrupt(archive: &Path, reason: impl ToString) -> anyhow::Error {
    UserError::new(
        format!("failed to read archive {}", archive.display()),
        reason.to_string(),
        "The archive is corrupt; delete it from the cache and download it again",
    )
    .into()
}

fn place_binary(src: &Path, dest: &Path, binary_name: &str) -> Result<()> {
    let target = dest.join(binary_name);
    fs::copy(src, &target).map_err(|e| {
        UserError::new(
            format!("failed to copy binary to {}", target.display()),
            e.to_string(),
            "Check write permissions for the tools directory",
        )
    })?;
    mark_executable(&target)
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    let mut zip = ZipArchive::new(open_archive(archive)?).map_err(|e| corrupt(archive, e))?;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|e| corrupt(archive, e))?;
        let name = entry.name().to_string();
        let target = checked_join(dest, Path::new(&name))?;

        if entry.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("failed to create directory {}", target.display()))?;
            continue;
        }
        // the unix file type rides in the external attributes
        if let Some(mode) = entry.unix_mode() {
            if mode & 0o170000 == 0o120000 {
                debug!("skipping symlink entry {name}");
                continue;
            }
        }
        write_entry(&mut entry, &target)?;
    }
    Ok(())
}

fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<()> {
    let mut tar = Archive::new(GzDecoder::new(open_archive(archive)?));

    for entry in tar.entries().map_err(|e| corrupt(archive, e))? {
        let mut entry = entry.map_err(|e| corrupt(archive, e))?;
        let name = entry.path().map_err(|e| corrupt(archive, e))?.into_owned();
        let target = checked_join(dest, &name)?;

        let kind = entry.header().entry_type();
        if kind.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("failed to create directory {}", target.display()))?;
        } else if kind.is_file() {
            write_entry(&mut entry, &target)?;
        } else {
            debug!("skipping {:?} entry {}", kind, name.display());
        }
    }
    Ok(())
}

fn write_entry(reader: &mut impl io::Read, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let mut out = File::create(target).map_err(|e| {
        UserError::new(
            format!("failed to create {}", target.display()),
            e.to_string(),
            "The disk may be full or the directory unwritable",
        )
    })?;
    io::copy(reader, &mut out).map_err(|e| {
        UserError::new(
            format!("failed to write {}", target.display()),
            e.to_string(),
            "The disk may be full; clean up the partial extraction before retrying",
        )
    })?;
    drop(out);
    mark_executable(target)
}

/// Joins `entry_name` onto `dest` and proves the result stays inside `dest`.
///
/// The check is purely lexical: the joined path is normalized component by
/// component and must equal `dest` or sit strictly below it. Absolute entry
/// names and `..` escapes both fail here, before anything touches the disk.
fn checked_join(dest: &Path, entry_name: &Path) -> Result<PathBuf> {
    let dest_abs = lexical_normalize(
        &std::path::absolute(dest)
            .with_context(|| format!("failed to resolve destination {}", dest.display()))?,
    );
    let candidate = lexical_normalize(&dest_abs.join(entry_name));
    if candidate != dest_abs && !candidate.starts_with(&dest_abs) {
        return Err(UserError::new(
            "path traversal attempt detected",
            format!("archive entry '{}' resolves outside the destination", entry_name.display()),
            "This archive may be malicious. Do not install tools from untrusted sources",
        )
        .into());
    }
    Ok(candidate)
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("failed to mark {} executable", path.display()))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    fn build_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, bytes) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
    }

    #[cfg(unix)]
    fn is_executable(path: &Path) -> bool {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(path).unwrap().permissions().mode() & 0o111 != 0
    }

    #[test]
    fn test_extract_zip_with_nested_entries() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("a.zip");
        build_zip(&archive, &[("tool", b"bin"), ("docs/LICENSE", b"mit")]);

        let dest = dir.path().join("out");
        extract(&archive, &dest, ArchiveFormat::Zip, "tool").unwrap();

        assert_eq!(fs::read(dest.join("tool")).unwrap(), b"bin");
        assert_eq!(fs::read(dest.join("docs").join("LICENSE")).unwrap(), b"mit");
        #[cfg(unix)]
        assert!(is_executable(&dest.join("tool")));
    }

    #[test]
    fn test_extract_raw_binary() {
        let dir = tempdir().unwrap();
        let artifact = dir.path().join("terragrunt_linux_amd64");
        fs::write(&artifact, b"elf-bytes").unwrap();

        let dest = dir.path().join("out");
        extract(&artifact, &dest, ArchiveFormat::Binary, "terragrunt").unwrap();

        let placed = dest.join("terragrunt");
        assert_eq!(fs::read(&placed).unwrap(), b"elf-bytes");
        #[cfg(unix)]
        assert!(is_executable(&placed));
    }

    #[test]
    fn test_extract_rejects_parent_dir_escape() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("evil.zip");
        build_zip(&archive, &[("../evil", b"boom")]);

        let dest = dir.path().join("inner").join("out");
        fs::create_dir_all(&dest).unwrap();
        let err = extract(&archive, &dest, ArchiveFormat::Zip, "evil").unwrap_err();
        assert!(format!("{err:#}").contains("traversal"));
        assert!(!dir.path().join("inner").join("evil").exists());
    }

    #[test]
    fn test_extract_rejects_absolute_entry() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("abs.zip");
        build_zip(&archive, &[("/tmp/elsewhere", b"boom")]);

        let dest = dir.path().join("out");
        let err = extract(&archive, &dest, ArchiveFormat::Zip, "x").unwrap_err();
        assert!(format!("{err:#}").contains("traversal"));
    }

    #[test]
    fn test_extract_unparsable_archive_fails_before_writes() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("garbage.zip");
        fs::write(&archive, b"this is not a zip").unwrap();

        let dest = dir.path().join("out");
        assert!(extract(&archive, &dest, ArchiveFormat::Zip, "x").is_err());
        assert!(fs::read_dir(&dest).unwrap().next().is_none());
    }

    #[test]
    fn test_checked_join_allows_plain_nesting() {
        let dir = tempdir().unwrap();
        let joined = checked_join(dir.path(), Path::new("sub/tool")).unwrap();
        assert!(joined.starts_with(dir.path()));
    }

    #[test]
    fn test_lexical_normalize_folds_dot_segments() {
        assert_eq!(
            lexical_normalize(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
        assert_eq!(lexical_normalize(Path::new("/a/../../b")), PathBuf::from("/b"));
    }
}
