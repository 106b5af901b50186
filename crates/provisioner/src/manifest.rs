//! Sidecar metadata written next to each stored image

use chrono::{DateTime, Utc};
use provision_errors::{Error, ProvisionError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Metadata describing a stored image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageManifest {
    pub name: String,
    pub size: u64,
    /// Hex-encoded BLAKE3 digest of the image
    pub blake3: String,
    pub provisioner: String,
    pub created_at: DateTime<Utc>,
}

impl ImageManifest {
    /// Read a manifest from disk
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or
    /// `ProvisionError::ManifestCorrupted` if it is not a valid manifest.
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|e| Error::io_with_path(&e, path))?;
        serde_json::from_str(&contents).map_err(|e| {
            ProvisionError::ManifestCorrupted {
                message: format!("{}: {e}", path.display()),
            }
            .into()
        })
    }

    /// Write the manifest as pretty-printed JSON
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be serialized or written.
    pub async fn save(&self, path: &Path) -> Result<(), Error> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)
            .await
            .map_err(|e| Error::io_with_path(&e, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debian.json");
        let manifest = ImageManifest {
            name: "debian".to_string(),
            size: 42,
            blake3: "ab".repeat(32),
            provisioner: "local".to_string(),
            created_at: Utc::now(),
        };
        manifest.save(&path).await.unwrap();
        assert_eq!(ImageManifest::load(&path).await.unwrap(), manifest);
    }

    #[tokio::test]
    async fn test_corrupted_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").await.unwrap();
        let err = ImageManifest::load(&path).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Provision(ProvisionError::ManifestCorrupted { .. })
        ));
    }
}
