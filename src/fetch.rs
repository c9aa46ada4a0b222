use std::fs::{self, File};
use std::path::Path;
use std::time::Duration;
use anyhow::{Context, Result};
use log::debug;
use reqwest::blocking::Client;
use crate::error::UserError;

/// Upper bound on one whole transfer, multi-hundred-MB binaries included.
const FETCH_TIMEOUT: Duration = Duration::from_secs(300);

/// Streams `url` to `dest`.
///
/// The destination file only comes into existence once the server has
/// answered with a success status, and a failed transfer removes it again,
/// so a file at `dest` afterwards is always a complete body.
pub fn fetch(url: &str, dest: &Path) -> Result<()> {
    let client = Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .context("failed to build the HTTP client")?;

    let mut response = client.get(url).send().map_err(|e| {
        UserError::new(
            format!("failed to download {url}"),
            e.to_string(),
            "Check your internet connection and that the URL is correct",
        )
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(UserError::new(
            format!("failed to download {url}"),
            format!("HTTP status {status}"),
            "The file may not exist for this version. Verify the version and try again",
        )
        .into());
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            UserError::new(
                format!("failed to create directory {}", parent.display()),
                e.to_string(),
                "Check write permissions for the cache directory",
            )
        })?;
    }

    let mut file = File::create(dest).map_err(|e| {
        UserError::new(
            format!("failed to create {}", dest.display()),
            e.to_string(),
            "Check write permissions for the cache directory",
        )
    })?;

    debug!("downloading {} -> {}", url, dest.display());
    if let Err(e) = response.copy_to(&mut file) {
        drop(file);
        let _ = fs::remove_file(dest);
        return Err(UserError::new(
            format!("download of {url} was interrupted"),
            e.to_string(),
            "The connection may have dropped or the disk may be full. Try again",
        )
        .into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn serve_once(response: tiny_http::Response<std::io::Cursor<Vec<u8>>>) -> String {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        std::thread::spawn(move || {
            let request = server.recv().unwrap();
            request.respond(response).unwrap();
        });
        format!("http://{addr}/artifact.bin")
    }

    #[test]
    fn test_fetch_streams_body_to_disk() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("cache").join("artifact.bin");
        let url = serve_once(tiny_http::Response::from_data(b"payload-bytes".to_vec()));

        fetch(&url, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"payload-bytes");
    }

    #[test]
    fn test_fetch_leaves_no_file_on_http_error() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("missing.bin");
        let url = serve_once(
            tiny_http::Response::from_data(b"not found".to_vec()).with_status_code(404),
        );

        let err = fetch(&url, &dest).unwrap_err();
        assert!(format!("{err:#}").contains("404"));
        assert!(!dest.exists());
    }

    #[test]
    fn test_fetch_fails_on_unreachable_host() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("never.bin");
        // port 1 is refused immediately, no server runs there
        let err = fetch("http://127.0.0.1:1/never.bin", &dest).unwrap_err();
        assert!(format!("{err:#}").contains("failed to download"));
        assert!(!dest.exists());
    }
}
