//! A `tail -f` style file reader.
//!
//! A [`TailReader`] opens a file at its current end and returns only data
//! appended afterwards. At end-of-file it either returns (no following), keeps
//! polling the same open handle (follow by descriptor), or keeps polling while
//! watching for the path being rotated or truncated and reopening it (follow by
//! name). Waiting is plain polling and can be interrupted with a
//! [`CancellationToken`].
//!
//! # Example
//!
//! ```rust,no_run
//! use log_tail::open_tail_by_name;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut reader = open_tail_by_name("app.log").await?;
//!     let mut buf = vec![0u8; 4096];
//!
//!     loop {
//!         let n = reader.read(&mut buf).await?;
//!         print!("{}", String::from_utf8_lossy(&buf[..n]));
//!     }
//! }
//! ```

// Internal modules - not part of public API
mod error;
mod identity;
mod reader;
mod rotation;
mod stream;

#[cfg(test)]
mod test_helpers;

// Public API exports
pub use error::{Error, Result};
pub use identity::{
    FileIdentity, FileMetadataProvider, PlatformMetadata, identify_file, identify_path,
};
pub use reader::{
    DEFAULT_IDLE_POLLS_BEFORE_CHECK, DEFAULT_POLL_INTERVAL, FollowMode, TailConfig, TailReader,
};
pub use rotation::{RotationReason, detect_rotation};
pub use stream::LineStream;
pub use tokio_util::sync::CancellationToken;

use std::path::Path;

/// Opens `path` at its end without following.
pub async fn open_tail<P: AsRef<Path>>(path: P) -> Result<TailReader> {
    TailReader::open(path).await
}

/// Opens `path` at its end and follows the open file descriptor.
pub async fn open_tail_by_descriptor<P: AsRef<Path>>(path: P) -> Result<TailReader> {
    TailReader::open_by_descriptor(path).await
}

/// Opens `path` at its end and follows the path name across rotations.
pub async fn open_tail_by_name<P: AsRef<Path>>(path: P) -> Result<TailReader> {
    TailReader::open_by_name(path).await
}

/// Creates a stream of line batches appended to a file.
///
/// # Arguments
///
/// * `path` - File path to tail
/// * `follow` - What to do at end-of-file
/// * `separator` - Content separator (defaults to newline)
///
/// # Example
///
/// ```rust,no_run
/// use log_tail::{FollowMode, tail_lines};
/// use tokio_stream::StreamExt;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut stream = tail_lines("app.log", FollowMode::ByName, None).await?;
///
///     while let Some(lines) = stream.next().await {
///         for line in lines? {
///             println!("{}", line);
///         }
///     }
///
///     Ok(())
/// }
/// ```
pub async fn tail_lines<P: AsRef<Path>>(
    path: P,
    follow: FollowMode,
    separator: Option<String>,
) -> Result<LineStream> {
    let config = TailConfig::default().with_follow(follow);
    let reader = TailReader::open_with(path, config).await?;
    Ok(LineStream::new(reader, separator))
}
