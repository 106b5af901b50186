#![deny(clippy::pedantic, unsafe_code)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_precision_loss // Byte counts are reported as f64 progress
)]

//! Image provisioners
//!
//! A [`Provisioner`] turns a disk image byte stream into a stored machine
//! image, reporting its stages and byte progress through a
//! [`Tracker`](provision_progress::Tracker). Vendor back ends plug in behind
//! the trait; [`LocalProvisioner`] stages images into a directory.

mod local;
mod manifest;

pub use local::LocalProvisioner;
pub use manifest::ImageManifest;

use async_trait::async_trait;
use provision_errors::Error;
use provision_progress::Tracker;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncRead;

/// Turns a disk image into a machine image.
///
/// Implementations initialize `tracker`, report stages and progress while
/// they work, and close it with the outcome before returning.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Short name of the back end, recorded in manifests
    fn name(&self) -> &'static str;

    /// Provision `source` as an image called `image_name`.
    async fn provision(
        &self,
        image_name: &str,
        source: ImageSource,
        tracker: &Tracker,
    ) -> Result<ProvisionReport, Error>;
}

/// Byte stream of a disk image, with its size when known up front
pub struct ImageSource {
    reader: Box<dyn AsyncRead + Send + Unpin>,
    size: Option<u64>,
}

impl ImageSource {
    pub fn new(reader: impl AsyncRead + Send + Unpin + 'static, size: Option<u64>) -> Self {
        Self {
            reader: Box::new(reader),
            size,
        }
    }

    /// In-memory image, mostly useful for tests
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let size = bytes.len() as u64;
        Self::new(std::io::Cursor::new(bytes), Some(size))
    }

    /// Open an image file; its size is taken from the file metadata
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or inspected.
    pub async fn from_file(path: &Path) -> Result<Self, Error> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| Error::io_with_path(&e, path))?;
        let metadata = file
            .metadata()
            .await
            .map_err(|e| Error::io_with_path(&e, path))?;
        Ok(Self::new(file, Some(metadata.len())))
    }

    /// Size of the image in bytes, if known
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        self.size
    }
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageSource")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Summary of a successfully provisioned image
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionReport {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub blake3: String,
    pub elapsed: Duration,
}
