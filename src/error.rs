//! Error types for the tail reader library.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for tail reader operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The tailed path could not be opened, either at construction or on reopen.
    #[error("Failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Metadata could not be read for a path or an open handle.
    #[error("Failed to stat {subject}: {source}")]
    Stat {
        subject: String,
        #[source]
        source: std::io::Error,
    },

    /// The platform metadata carries no device/inode information.
    #[error("File identity is not supported on this platform")]
    UnsupportedPlatform,

    /// I/O errors from the underlying read or seek, passed through unmodified.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 decoding errors when splitting content into lines.
    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// The reader's cancellation token fired while waiting for data.
    #[error("Read cancelled")]
    Cancelled,
}

/// A convenient Result type for tail reader operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Open {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn stat(subject: impl Into<String>, source: std::io::Error) -> Self {
        Error::Stat {
            subject: subject.into(),
            source,
        }
    }
}
