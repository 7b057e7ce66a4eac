//! File identity extraction from filesystem metadata.
//!
//! A [`FileIdentity`] pairs the device and inode numbers of a file with its
//! current size. Comparing the identity behind a path with the identity behind
//! an open handle tells whether the path still refers to the file being read.

use crate::error::{Error, Result};
use std::fmt;
use std::fs::Metadata;
use std::path::Path;
use tokio::fs::File;

/// A snapshot of the on-disk identity of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    /// Device the file lives on.
    pub device_id: u64,
    /// Inode number on that device.
    pub inode: u64,
    /// Size in bytes at the time of the stat call.
    pub size: u64,
}

impl FileIdentity {
    pub fn new(device_id: u64, inode: u64, size: u64) -> Self {
        Self {
            device_id,
            inode,
            size,
        }
    }

    /// Returns true when both identities name the same on-disk object,
    /// regardless of size.
    pub fn same_file(&self, other: &FileIdentity) -> bool {
        self.device_id == other.device_id && self.inode == other.inode
    }
}

impl fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({} bytes)", self.device_id, self.inode, self.size)
    }
}

/// Turns platform metadata into a [`FileIdentity`].
///
/// Implementations must not touch the filesystem themselves; the caller has
/// already performed the stat.
pub trait FileMetadataProvider: Send + Sync {
    fn identity(&self, metadata: &Metadata) -> Result<FileIdentity>;
}

/// The metadata provider for the current target.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformMetadata;

#[cfg(unix)]
impl FileMetadataProvider for PlatformMetadata {
    fn identity(&self, metadata: &Metadata) -> Result<FileIdentity> {
        use std::os::unix::fs::MetadataExt;

        Ok(FileIdentity {
            device_id: metadata.dev(),
            inode: metadata.ino(),
            size: metadata.size(),
        })
    }
}

#[cfg(not(unix))]
impl FileMetadataProvider for PlatformMetadata {
    fn identity(&self, _metadata: &Metadata) -> Result<FileIdentity> {
        Err(Error::UnsupportedPlatform)
    }
}

/// Identity of whatever the path currently resolves to.
pub async fn identify_path(
    provider: &dyn FileMetadataProvider,
    path: &Path,
) -> Result<FileIdentity> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| Error::stat(format!("path {}", path.display()), e))?;
    provider.identity(&metadata)
}

/// Identity of the file behind an open handle.
pub async fn identify_file(
    provider: &dyn FileMetadataProvider,
    file: &File,
) -> Result<FileIdentity> {
    let metadata = file
        .metadata()
        .await
        .map_err(|e| Error::stat("open handle", e))?;
    provider.identity(&metadata)
}
