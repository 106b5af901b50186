//! Provisioner that stages images into a local directory

use crate::manifest::ImageManifest;
use crate::{ImageSource, ProvisionReport, Provisioner};
use async_trait::async_trait;
use chrono::Utc;
use provision_errors::{Error, ProvisionError};
use provision_progress::{Tracker, Units};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Stores images as `<root>/<name>.img` with a `<name>.json` manifest.
///
/// Images are streamed into a `.partial` file first and only renamed into
/// place once they are complete (and verified, unless disabled).
#[derive(Debug, Clone)]
pub struct LocalProvisioner {
    root: PathBuf,
    chunk_size: usize,
    verify: bool,
}

impl LocalProvisioner {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            verify: true,
        }
    }

    /// Read and write in chunks of `chunk_size` bytes (minimum 1)
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Re-read and hash the image after upload
    #[must_use]
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a stored image lives at
    #[must_use]
    pub fn image_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.img"))
    }

    fn manifest_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }

    fn partial_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.img.partial"))
    }

    /// Load the manifest of a stored image
    ///
    /// # Errors
    ///
    /// Returns `ProvisionError::ImageNotFound` if no such image is stored.
    pub async fn manifest(&self, name: &str) -> Result<ImageManifest, Error> {
        validate_name(name)?;
        let path = self.manifest_path(name);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ProvisionError::ImageNotFound {
                name: name.to_string(),
            }
            .into());
        }
        ImageManifest::load(&path).await
    }

    /// Manifests of every stored image, sorted by name
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read. A missing store is
    /// treated as empty.
    pub async fn list(&self) -> Result<Vec<ImageManifest>, Error> {
        let mut manifests = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(manifests),
            Err(e) => return Err(Error::io_with_path(&e, &self.root)),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match ImageManifest::load(&path).await {
                Ok(manifest) => manifests.push(manifest),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable manifest"),
            }
        }

        manifests.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(manifests)
    }

    async fn run(
        &self,
        name: &str,
        source: &mut ImageSource,
        tracker: &Tracker,
    ) -> Result<ProvisionReport, Error> {
        let started = Instant::now();
        let steps = if self.verify { 4.0 } else { 3.0 };
        tracker.initialize(format!("provision {name}"), steps, Units::Steps)?;

        tracker.set_stage("preparing image store")?;
        self.prepare(name).await?;
        tracker.increment_progress(1.0)?;

        tracker.set_stage("uploading image")?;
        let partial = self.partial_path(name);
        let file = create_partial(name, &partial).await?;

        // From here on the partial file is ours to clean up
        let result = self.stage(name, file, source, tracker).await;
        if result.is_err() {
            discard(&partial).await;
        }
        let (size, digest) = result?;

        Ok(ProvisionReport {
            name: name.to_string(),
            path: self.image_path(name),
            size,
            blake3: digest,
            elapsed: started.elapsed(),
        })
    }

    async fn prepare(&self, name: &str) -> Result<(), Error> {
        validate_name(name)?;
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Error::io_with_path(&e, &self.root))?;

        for path in [self.image_path(name), self.manifest_path(name)] {
            if fs::try_exists(&path).await.unwrap_or(false) {
                return Err(image_exists(name));
            }
        }
        Ok(())
    }

    /// Upload, verify and publish into an already created partial file
    async fn stage(
        &self,
        name: &str,
        file: fs::File,
        source: &mut ImageSource,
        tracker: &Tracker,
    ) -> Result<(u64, String), Error> {
        let upload = tracker.new_subtracker();
        let (size, digest) = close_with(&upload, self.upload(name, file, source, &upload).await)?;
        tracker.increment_progress(1.0)?;

        if self.verify {
            tracker.set_stage("verifying image")?;
            let verify = tracker.new_subtracker();
            close_with(&verify, self.verify(name, size, &digest, &verify).await)?;
            tracker.increment_progress(1.0)?;
        }

        tracker.set_stage("creating machine image")?;
        let manifest = ImageManifest {
            name: name.to_string(),
            size,
            blake3: digest.clone(),
            provisioner: self.name().to_string(),
            created_at: Utc::now(),
        };
        self.publish(&manifest).await?;
        tracker.increment_progress(1.0)?;

        Ok((size, digest))
    }

    /// Move the partial file into place and write its manifest.
    ///
    /// The image is linked rather than renamed so an image that appeared in
    /// the meantime is never replaced. A failed manifest write removes the
    /// image again, leaving the store as it was.
    async fn publish(&self, manifest: &ImageManifest) -> Result<(), Error> {
        let name = manifest.name.as_str();
        let partial = self.partial_path(name);
        let path = self.image_path(name);

        fs::hard_link(&partial, &path).await.map_err(|e| {
            if e.kind() == io::ErrorKind::AlreadyExists {
                image_exists(name)
            } else {
                Error::io_with_path(&e, &path)
            }
        })?;
        discard(&partial).await;

        let manifest_path = self.manifest_path(name);
        if let Err(e) = manifest.save(&manifest_path).await {
            discard(&path).await;
            return Err(e);
        }
        Ok(())
    }

    async fn upload(
        &self,
        name: &str,
        mut file: fs::File,
        source: &mut ImageSource,
        tracker: &Tracker,
    ) -> Result<(u64, String), Error> {
        let total = source.size.map_or(0.0, |size| size as f64);
        tracker.initialize("upload", total, Units::Bytes)?;
        tracker.set_stage(format!("writing {name}.img"))?;

        let partial = self.partial_path(name);
        let mut hasher = blake3::Hasher::new();
        let mut buf = vec![0u8; self.chunk_size];
        let mut written: u64 = 0;

        loop {
            let n = source.reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            let chunk = &buf[..n];
            file.write_all(chunk)
                .await
                .map_err(|e| Error::io_with_path(&e, &partial))?;
            hasher.update(chunk);
            io::Write::write_all(&mut &*tracker, chunk)?;
            written += n as u64;
        }
        file.sync_all()
            .await
            .map_err(|e| Error::io_with_path(&e, &partial))?;

        if let Some(expected) = source.size {
            if expected != written {
                return Err(ProvisionError::SizeMismatch {
                    name: name.to_string(),
                    expected,
                    actual: written,
                }
                .into());
            }
        }

        let digest = hasher.finalize().to_hex().to_string();
        debug!(image = name, bytes = written, blake3 = %digest, "image uploaded");
        Ok((written, digest))
    }

    async fn verify(
        &self,
        name: &str,
        size: u64,
        expected: &str,
        tracker: &Tracker,
    ) -> Result<(), Error> {
        tracker.initialize("verify", size as f64, Units::Bytes)?;
        tracker.set_stage("hashing image")?;

        let partial = self.partial_path(name);
        let mut file = fs::File::open(&partial)
            .await
            .map_err(|e| Error::io_with_path(&e, &partial))?;
        let mut hasher = blake3::Hasher::new();
        let mut buf = vec![0u8; self.chunk_size];
        let mut read: u64 = 0;

        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            read += n as u64;
            tracker.set_progress(read as f64)?;
        }

        let actual = hasher.finalize().to_hex().to_string();
        if actual != expected {
            return Err(ProvisionError::ChecksumMismatch {
                name: name.to_string(),
                expected: expected.to_string(),
                actual,
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl Provisioner for LocalProvisioner {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn provision(
        &self,
        image_name: &str,
        mut source: ImageSource,
        tracker: &Tracker,
    ) -> Result<ProvisionReport, Error> {
        info!(
            image = image_name,
            root = %self.root.display(),
            size = ?source.size,
            "provisioning image"
        );

        let result = self.run(image_name, &mut source, tracker).await;
        if let Err(e) = &result {
            warn!(image = image_name, error = %e, "provisioning failed");
        }
        close_with(tracker, result)
    }
}

/// Close `tracker` with the outcome of `result` and hand the result back
fn close_with<T>(tracker: &Tracker, result: Result<T, Error>) -> Result<T, Error> {
    match &result {
        Ok(_) => tracker.complete(),
        Err(e) => tracker.fail(e.clone()),
    }
    result
}

/// Create the partial file, refusing one left by a concurrent or crashed run
async fn create_partial(name: &str, partial: &Path) -> Result<fs::File, Error> {
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(partial)
        .await
        .map_err(|e| {
            if e.kind() == io::ErrorKind::AlreadyExists {
                image_exists(name)
            } else {
                Error::io_with_path(&e, partial)
            }
        })
}

/// Remove a file on a cleanup path
async fn discard(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove file"),
    }
}

fn image_exists(name: &str) -> Error {
    ProvisionError::ImageExists {
        name: name.to_string(),
    }
    .into()
}

fn validate_name(name: &str) -> Result<(), Error> {
    let invalid = name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if invalid {
        return Err(ProvisionError::InvalidImageName {
            name: name.to_string(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("debian-12").is_ok());
        assert!(validate_name("ubuntu_24.04").is_ok());
        for bad in ["", ".", "..", "a/b", "a\\b", "../etc", "bad\nname"] {
            assert!(validate_name(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_paths() {
        let provisioner = LocalProvisioner::new("/srv/images").with_chunk_size(0);
        assert_eq!(provisioner.chunk_size, 1);
        assert_eq!(
            provisioner.image_path("debian"),
            PathBuf::from("/srv/images/debian.img")
        );
        assert_eq!(
            provisioner.partial_path("debian"),
            PathBuf::from("/srv/images/debian.img.partial")
        );
    }

    #[test]
    fn test_close_with() {
        let tracker = Tracker::new();
        let result: Result<(), Error> = Err(Error::internal("boom"));
        assert!(close_with(&tracker, result).is_err());
        assert_eq!(
            tracker.status().error.unwrap().to_string(),
            "internal error: boom"
        );
    }

    fn manifest_for(name: &str) -> ImageManifest {
        ImageManifest {
            name: name.to_string(),
            size: 4,
            blake3: blake3::hash(b"data").to_hex().to_string(),
            provisioner: "local".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_failed_manifest_write_removes_image() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = LocalProvisioner::new(dir.path());
        fs::write(provisioner.partial_path("debian"), b"data").await.unwrap();
        // A directory where the manifest should go makes the write fail
        fs::create_dir(provisioner.manifest_path("debian")).await.unwrap();

        let err = provisioner.publish(&manifest_for("debian")).await.unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(!provisioner.image_path("debian").exists());
        assert!(!provisioner.partial_path("debian").exists());
    }

    #[tokio::test]
    async fn test_publish_never_replaces_an_image() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = LocalProvisioner::new(dir.path());
        fs::write(provisioner.image_path("debian"), b"old").await.unwrap();
        fs::write(provisioner.partial_path("debian"), b"data").await.unwrap();

        let err = provisioner.publish(&manifest_for("debian")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Provision(ProvisionError::ImageExists { .. })
        ));
        assert_eq!(fs::read(provisioner.image_path("debian")).await.unwrap(), b"old");
        assert!(!provisioner.manifest_path("debian").exists());
    }

    #[tokio::test]
    async fn test_publish_writes_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = LocalProvisioner::new(dir.path());
        fs::write(provisioner.partial_path("debian"), b"data").await.unwrap();

        provisioner.publish(&manifest_for("debian")).await.unwrap();
        assert!(!provisioner.partial_path("debian").exists());
        assert_eq!(fs::read(provisioner.image_path("debian")).await.unwrap(), b"data");
        assert_eq!(provisioner.manifest("debian").await.unwrap().size, 4);
    }

    #[tokio::test]
    async fn test_discard_ignores_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.img.partial");
        discard(&path).await;
        fs::write(&path, b"x").await.unwrap();
        discard(&path).await;
        assert!(!path.exists());
    }
}
