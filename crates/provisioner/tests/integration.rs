//! Integration tests for the local provisioner

#[cfg(test)]
mod tests {
    use provision_errors::{Error, ProgressError, ProvisionError};
    use provision_progress::{Tracker, Units};
    use provision_provisioner::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn image(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_provision_success() {
        let dir = TempDir::new().unwrap();
        let provisioner = LocalProvisioner::new(dir.path()).with_chunk_size(1000);
        let tracker = Tracker::new();
        let mut join = tracker.join();

        let bytes = image(10_500);
        let report = provisioner
            .provision("debian", ImageSource::from_bytes(bytes.clone()), &tracker)
            .await
            .unwrap();

        assert!(join.recv().await.unwrap().is_ok());
        assert_eq!(report.size, 10_500);
        assert_eq!(report.blake3, blake3::hash(&bytes).to_hex().to_string());
        assert_eq!(tokio::fs::read(&report.path).await.unwrap(), bytes);
        assert!(!dir.path().join("debian.img.partial").exists());

        let status = tracker.status();
        assert!(status.finished);
        assert_eq!(status.operation, "provision debian");
        assert_eq!(status.units, Units::Steps);
        assert_eq!(status.progress, status.total);
        assert_eq!(status.stage, "creating machine image");

        let names: Vec<_> = status.subtasks.iter().map(|s| s.operation.as_str()).collect();
        assert_eq!(names, vec!["upload", "verify"]);
        for subtask in &status.subtasks {
            assert!(subtask.finished);
            assert!(subtask.error.is_none());
            assert_eq!(subtask.units, Units::Bytes);
            assert_eq!(subtask.progress, 10_500.0);
            assert_eq!(subtask.fraction(), Some(1.0));
        }

        let manifest = provisioner.manifest("debian").await.unwrap();
        assert_eq!(manifest.size, 10_500);
        assert_eq!(manifest.blake3, report.blake3);
        assert_eq!(manifest.provisioner, "local");
    }

    #[tokio::test]
    async fn test_provision_without_verify() {
        let dir = TempDir::new().unwrap();
        let provisioner = LocalProvisioner::new(dir.path()).with_verify(false);
        let tracker = Tracker::new();

        provisioner
            .provision("alpine", ImageSource::from_bytes(image(64)), &tracker)
            .await
            .unwrap();

        let status = tracker.status();
        assert_eq!(status.total, 3.0);
        assert_eq!(status.progress, 3.0);
        assert_eq!(status.subtasks.len(), 1);
    }

    #[tokio::test]
    async fn test_existing_image_is_refused() {
        let dir = TempDir::new().unwrap();
        let provisioner = LocalProvisioner::new(dir.path());

        provisioner
            .provision("debian", ImageSource::from_bytes(image(16)), &Tracker::new())
            .await
            .unwrap();

        let tracker = Tracker::new();
        let err = provisioner
            .provision("debian", ImageSource::from_bytes(image(32)), &tracker)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Provision(ProvisionError::ImageExists { .. })
        ));

        let status = tracker.status();
        assert!(status.failed());
        assert_eq!(status.stage, "preparing image store");
        assert!(status.subtasks.is_empty());
        // The first image is untouched
        assert_eq!(provisioner.manifest("debian").await.unwrap().size, 16);
    }

    #[tokio::test]
    async fn test_invalid_name_fails_tracker() {
        let dir = TempDir::new().unwrap();
        let provisioner = LocalProvisioner::new(dir.path());
        let tracker = Tracker::new();
        let mut join = tracker.join();

        let err = provisioner
            .provision("../escape", ImageSource::from_bytes(image(8)), &tracker)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Provision(ProvisionError::InvalidImageName { .. })
        ));

        let outcome = join.recv().await.unwrap().unwrap_err();
        assert!(matches!(
            outcome.downcast_ref::<Error>(),
            Some(Error::Provision(ProvisionError::InvalidImageName { .. }))
        ));
    }

    #[tokio::test]
    async fn test_short_source_is_size_mismatch() {
        let dir = TempDir::new().unwrap();
        let provisioner = LocalProvisioner::new(dir.path());
        let tracker = Tracker::new();

        let source = ImageSource::new(std::io::Cursor::new(image(100)), Some(200));
        let err = provisioner
            .provision("short", source, &tracker)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Provision(ProvisionError::SizeMismatch {
                expected: 200,
                actual: 100,
                ..
            })
        ));

        let status = tracker.status();
        assert!(status.failed());
        assert!(status.subtasks[0].failed());
        assert!(!dir.path().join("short.img.partial").exists());
        assert!(!dir.path().join("short.img").exists());
    }

    #[tokio::test]
    async fn test_unknown_size_is_indeterminate() {
        let dir = TempDir::new().unwrap();
        let provisioner = LocalProvisioner::new(dir.path()).with_verify(false);
        let tracker = Tracker::new();

        let source = ImageSource::new(std::io::Cursor::new(image(300)), None);
        let report = provisioner.provision("stream", source, &tracker).await.unwrap();
        assert_eq!(report.size, 300);

        let upload = &tracker.status().subtasks[0];
        assert!(upload.is_indeterminate());
        assert_eq!(upload.progress, 300.0);
    }

    #[tokio::test]
    async fn test_provision_from_file_and_list() {
        let dir = TempDir::new().unwrap();
        let source_path = dir.path().join("disk.raw");
        tokio::fs::write(&source_path, image(2048)).await.unwrap();

        let provisioner = Arc::new(LocalProvisioner::new(dir.path().join("store")));
        assert!(provisioner.list().await.unwrap().is_empty());

        for name in ["zeta", "alpha"] {
            let source = ImageSource::from_file(&source_path).await.unwrap();
            assert_eq!(source.size(), Some(2048));
            provisioner
                .provision(name, source, &Tracker::new())
                .await
                .unwrap();
        }

        let names: Vec<_> = provisioner
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);

        let err = provisioner.manifest("missing").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Provision(ProvisionError::ImageNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_observer_sees_progress_from_another_task() {
        let dir = TempDir::new().unwrap();
        let provisioner = LocalProvisioner::new(dir.path()).with_chunk_size(512);
        let tracker = Tracker::new();

        let observer = {
            let tracker = tracker.clone();
            tokio::spawn(async move {
                let mut join = tracker.join();
                let outcome = join.recv().await.unwrap();
                (outcome, tracker.status())
            })
        };

        let driver = {
            let tracker = tracker.clone();
            tokio::spawn(async move {
                provisioner
                    .provision("ubuntu", ImageSource::from_bytes(image(8192)), &tracker)
                    .await
            })
        };

        driver.await.unwrap().unwrap();
        let (outcome, status) = observer.await.unwrap();
        assert!(outcome.is_ok());
        assert!(status.finished);
        assert_eq!(status.subtasks[0].progress, 8192.0);
    }

    #[tokio::test]
    async fn test_initialized_tracker_is_closed_with_error() {
        let dir = TempDir::new().unwrap();
        let provisioner = LocalProvisioner::new(dir.path());
        let tracker = Tracker::new();
        tracker.initialize("already running", 1.0, Units::Steps).unwrap();
        let mut join = tracker.join();

        let err = provisioner
            .provision("debian", ImageSource::from_bytes(image(8)), &tracker)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Progress(ProgressError::AlreadyInitialized)
        ));

        assert!(tracker.is_finished());
        let outcome = join.try_recv().unwrap().unwrap_err();
        assert!(matches!(
            outcome.downcast_ref::<Error>(),
            Some(Error::Progress(ProgressError::AlreadyInitialized))
        ));
        assert!(!dir.path().join("debian.img").exists());
    }

    #[tokio::test]
    async fn test_leftover_partial_is_refused_and_kept() {
        let dir = TempDir::new().unwrap();
        let provisioner = LocalProvisioner::new(dir.path());
        let partial = dir.path().join("debian.img.partial");
        tokio::fs::write(&partial, b"in progress").await.unwrap();

        let tracker = Tracker::new();
        let err = provisioner
            .provision("debian", ImageSource::from_bytes(image(64)), &tracker)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Provision(ProvisionError::ImageExists { .. })
        ));
        assert!(tracker.status().failed());
        assert_eq!(tokio::fs::read(&partial).await.unwrap(), b"in progress");
        assert!(!dir.path().join("debian.img").exists());
    }

    #[tokio::test]
    async fn test_concurrent_provisions_of_one_name() {
        for verify in [false, true] {
            let dir = TempDir::new().unwrap();
            let provisioner = LocalProvisioner::new(dir.path())
                .with_chunk_size(1)
                .with_verify(verify);
            let first = image(4096);
            let second: Vec<u8> = first.iter().map(|b| b.wrapping_add(1)).collect();

            let tracker_a = Tracker::new();
            let tracker_b = Tracker::new();
            let (a, b) = tokio::join!(
                provisioner.provision("img", ImageSource::from_bytes(first.clone()), &tracker_a),
                provisioner.provision("img", ImageSource::from_bytes(second.clone()), &tracker_b),
            );

            let (winner, loser) = match (a, b) {
                (Ok(report), Err(err)) => ((report, &first), err),
                (Err(err), Ok(report)) => ((report, &second), err),
                (a, b) => panic!("expected exactly one success, got {a:?} and {b:?}"),
            };
            assert!(matches!(
                loser,
                Error::Provision(ProvisionError::ImageExists { .. })
            ));

            let (report, bytes) = winner;
            let stored = tokio::fs::read(dir.path().join("img.img")).await.unwrap();
            assert_eq!(&stored, bytes);
            assert_eq!(report.blake3, blake3::hash(bytes).to_hex().to_string());
            assert_eq!(provisioner.manifest("img").await.unwrap().blake3, report.blake3);
            assert!(!dir.path().join("img.img.partial").exists());
        }
    }
}
