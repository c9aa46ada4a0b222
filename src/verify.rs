use std::fs::File;
use std::io::Read;
use std::path::Path;
use anyhow::Result;
use sha2::{Digest, Sha256};
use crate::error::UserError;

/// Compares the SHA-256 of the file at `path` against `expected_hex`.
///
/// The file is digested in fixed-size chunks so large downloads never sit in
/// memory whole. The expected value may use any case and carry surrounding
/// whitespace; only whole-file digests are supported.
pub fn verify(path: &Path, expected_hex: &str) -> Result<()> {
    let mut file = File::open(path).map_err(|e| {
        UserError::new(
            format!("failed to open {} for checksum verification", path.display()),
            e.to_string(),
            "Ensure the file exists and is readable",
        )
    })?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(|e| {
            UserError::new(
                format!("failed to read {} for checksum verification", path.display()),
                e.to_string(),
                "The file may be corrupted; download it again",
            )
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let computed = hex::encode(hasher.finalize());
    let expected = expected_hex.trim().to_ascii_lowercase();
    if computed != expected {
        return Err(UserError::new(
            "checksum verification failed",
            format!("expected {expected}, computed {computed}"),
            "The download may be corrupted or tampered with. Delete it and try again",
        )
        .into());
    }

    Ok(())
}
