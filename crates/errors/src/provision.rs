//! Image provisioning error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ProvisionError {
    #[error("invalid image name: {name:?}")]
    InvalidImageName { name: String },

    #[error("image already exists: {name}")]
    ImageExists { name: String },

    #[error("image not found: {name}")]
    ImageNotFound { name: String },

    #[error("checksum mismatch for {name}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("size mismatch for {name}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },

    #[error("image manifest corrupted: {message}")]
    ManifestCorrupted { message: String },
}

impl UserFacingError for ProvisionError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidImageName { .. } => {
                Some("Image names must be non-empty and must not contain path separators.")
            }
            Self::ImageExists { .. } => {
                Some("Choose a different --name or remove the existing image from the store.")
            }
            Self::ImageNotFound { .. } => Some("Run `provision list` to see stored images."),
            Self::ChecksumMismatch { .. } | Self::SizeMismatch { .. } => {
                Some("The source changed while it was being read. Retry the upload.")
            }
            Self::ManifestCorrupted { .. } => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMismatch { .. } | Self::SizeMismatch { .. }
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::InvalidImageName { .. } => "provision.invalid_name",
            Self::ImageExists { .. } => "provision.image_exists",
            Self::ImageNotFound { .. } => "provision.image_not_found",
            Self::ChecksumMismatch { .. } => "provision.checksum_mismatch",
            Self::SizeMismatch { .. } => "provision.size_mismatch",
            Self::ManifestCorrupted { .. } => "provision.manifest_corrupted",
        })
    }
}
