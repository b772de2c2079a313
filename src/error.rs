// src/error.rs

use thiserror::Error;

/// Core error types for Parcel
#[derive(Error, Debug)]
pub enum Error {
    /// No mirror could supply the archive (or none are configured)
    #[error("Package unavailable: {0}")]
    Unavailable(String),

    /// Archive is empty, corrupt, or its manifest is missing or unparsable
    #[error("Malformed package: {0}")]
    Malformed(String),

    /// Manifest is missing required fields or lists unsafe entries
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// Manifest references a file absent from the extracted package
    #[error("Missing file in package: {0}")]
    MissingFile(String),

    /// Package or archive is not present
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation requires a capability that is not available
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Declared payload checksum does not match the extracted contents
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// File is already owned by another installed package
    #[error("File conflict: {0}")]
    Conflict(String),

    /// Caller supplied an unusable argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A single mirror download attempt failed
    #[error("Download failed: {0}")]
    DownloadError(String),

    /// Registry file could not be read or parsed
    #[error("Registry error: {0}")]
    Registry(String),

    /// I/O error with context
    #[error("I/O error: {0}")]
    IoError(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit code reported by the command-line front end
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Unavailable(_) | Error::DownloadError(_) => 3,
            Error::NotFound(_) => 4,
            Error::Malformed(_)
            | Error::InvalidManifest(_)
            | Error::MissingFile(_)
            | Error::ChecksumMismatch { .. } => 5,
            Error::Unsupported(_) => 6,
            Error::Conflict(_) => 7,
            Error::InvalidArgument(_) => 2,
            Error::Registry(_) | Error::IoError(_) | Error::Io(_) => 1,
        }
    }
}

/// Result type alias using Parcel's Error type
pub type Result<T> = std::result::Result<T, Error>;
