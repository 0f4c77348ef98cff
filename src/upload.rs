//! Pushing certificate images to cloud storage.

use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CertissueError, Result};

/// Destination for uploaded certificates. `put` returns the file ID the
/// store assigned.
pub trait ObjectStore: Send + Sync {
    fn put(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<String>;
}

/// Copies files into a directory, typically one synchronised with a
/// cloud drive.
pub struct FolderStore {
    root: PathBuf,
}

impl FolderStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

fn content_id(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)[..16].to_string()
}

fn safe_name(name: &str) -> Result<&str> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(CertissueError::Upload(format!("invalid object name '{}'", name)));
    }
    Ok(name)
}

impl ObjectStore for FolderStore {
    fn put(&self, name: &str, bytes: &[u8], _content_type: &str) -> Result<String> {
        let name = safe_name(name)?;
        fs::create_dir_all(&self.root)?;
        let path = self.root.join(name);
        fs::write(&path, bytes)?;

        let id = content_id(bytes);
        info!("Certificate copied to {} ({})", path.display(), id);
        Ok(id)
    }
}

/// Uploads with `PUT {base}/{name}` to an HTTP object store.
///
/// The blocking client is built per upload so it is never created or
/// dropped on an async worker thread.
pub struct HttpStore {
    base: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct PutResponse {
    id: Option<String>,
}

impl HttpStore {
    pub fn new(base: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            token,
        }
    }
}

impl ObjectStore for HttpStore {
    fn put(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<String> {
        let name = safe_name(name)?;
        let url = format!("{}/{}", self.base, name);
        debug!("Uploading {} bytes to {}", bytes.len(), url);

        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let mut request = client
            .put(&url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes.to_vec());
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(CertissueError::Upload(format!("{} answered {}", url, status)));
        }

        let body = response.text()?;
        let id = serde_json::from_str::<PutResponse>(&body)
            .ok()
            .and_then(|r| r.id)
            .unwrap_or_else(|| name.to_string());
        info!("Certificate uploaded: {}", id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_store_copies_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FolderStore::new(dir.path().join("drive"));
        let id = store.put("JOHN_DOE.png", b"png-bytes", "image/png").unwrap();

        assert_eq!(id.len(), 16);
        assert_eq!(id, content_id(b"png-bytes"));
        assert_eq!(fs::read(dir.path().join("drive/JOHN_DOE.png")).unwrap(), b"png-bytes");
    }

    #[test]
    fn test_rejects_path_names() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FolderStore::new(dir.path());
        assert!(store.put("../escape.png", b"x", "image/png").is_err());
        assert!(store.put("", b"x", "image/png").is_err());
    }
}
