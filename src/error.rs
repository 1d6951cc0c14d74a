//! Typed error conditions callers may want to match on.
//!
//! Everything else propagates as `anyhow::Error` and aborts the run.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// A credential file could not be read.
    #[error("Failed to read credentials from {path}: {source}")]
    CredentialsRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A required key is absent from a credential file.
    #[error("Credential key '{key}' not found in {path}")]
    MissingCredential { key: String, path: PathBuf },

    /// The image format can be read but not re-encoded for upload.
    #[error("Unsupported image format for {name}: {file_type}")]
    UnsupportedFormat { name: String, file_type: String },

    /// The thumbnail endpoint answered with a non-success status and the
    /// configured policy treats that as fatal.
    #[error("Thumbnail for {name} rejected with HTTP status {status}")]
    ThumbnailRejected { name: String, status: u16 },
}
