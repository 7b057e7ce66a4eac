//! Rotation and truncation detection for followed files.

use crate::error::Result;
use crate::identity::{FileIdentity, FileMetadataProvider, identify_file, identify_path};
use std::fmt;
use std::path::Path;
use tokio::fs::File;

/// Why the file at a path no longer matches the file being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationReason {
    /// The path now resolves to a different device.
    DeviceChanged,
    /// The path now resolves to a different inode (rename or delete+recreate).
    InodeChanged,
    /// The file shrank below the amount already consumed (copy-truncate).
    Truncated,
}

impl fmt::Display for RotationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            RotationReason::DeviceChanged => "device changed",
            RotationReason::InodeChanged => "inode changed",
            RotationReason::Truncated => "truncated",
        };
        f.write_str(reason)
    }
}

/// Compare the identity at the path (`current`) with the identity of the open
/// handle (`tracked`). The first matching heuristic wins.
pub fn detect_rotation(
    current: &FileIdentity,
    tracked: &FileIdentity,
    last_read_position: u64,
) -> Option<RotationReason> {
    if current.device_id != tracked.device_id {
        Some(RotationReason::DeviceChanged)
    } else if current.inode != tracked.inode {
        Some(RotationReason::InodeChanged)
    } else if detect_file_truncation(current.size, last_read_position) {
        Some(RotationReason::Truncated)
    } else {
        None
    }
}

/// Detect if the file was truncated by comparing current size with last position
fn detect_file_truncation(current_size: u64, last_position: u64) -> bool {
    current_size < last_position
}

/// Stat both the path and the open handle and compare them.
///
/// Stat failures on either side are returned rather than treated as rotation.
pub(crate) async fn check_rotation(
    provider: &dyn FileMetadataProvider,
    path: &Path,
    file: &File,
    last_read_position: u64,
) -> Result<Option<RotationReason>> {
    let current = identify_path(provider, path).await?;
    let tracked = identify_file(provider, file).await?;

    let reason = detect_rotation(&current, &tracked, last_read_position);
    tracing::trace!(
        path = %path.display(),
        %current,
        %tracked,
        last_read_position,
        ?reason,
        "Checked file rotation"
    );
    Ok(reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unchanged_file_is_not_rotated() {
        let tracked = FileIdentity::new(1, 100, 50);
        let current = FileIdentity::new(1, 100, 80);

        assert_eq!(detect_rotation(&current, &tracked, 50), None);
    }

    #[test]
    fn test_device_change_is_rotation() {
        let tracked = FileIdentity::new(1, 100, 50);
        let current = FileIdentity::new(2, 100, 50);

        assert_eq!(
            detect_rotation(&current, &tracked, 50),
            Some(RotationReason::DeviceChanged)
        );
    }

    #[test]
    fn test_inode_change_is_rotation() {
        let tracked = FileIdentity::new(1, 100, 50);
        let current = FileIdentity::new(1, 101, 500);

        assert_eq!(
            detect_rotation(&current, &tracked, 50),
            Some(RotationReason::InodeChanged)
        );
    }

    #[test]
    fn test_shrunk_file_is_truncation() {
        let tracked = FileIdentity::new(1, 100, 10);
        let current = FileIdentity::new(1, 100, 10);

        assert_eq!(
            detect_rotation(&current, &tracked, 11),
            Some(RotationReason::Truncated)
        );
    }

    #[test]
    fn test_device_change_reported_before_inode_and_truncation() {
        let tracked = FileIdentity::new(1, 100, 50);
        let current = FileIdentity::new(2, 200, 0);

        assert_eq!(
            detect_rotation(&current, &tracked, 50),
            Some(RotationReason::DeviceChanged)
        );
    }

    #[test]
    fn test_file_truncation_edge_cases() {
        // Test with equal sizes
        assert!(!detect_file_truncation(100, 100));

        // Test with zero values
        assert!(!detect_file_truncation(0, 0));
        assert!(detect_file_truncation(0, 1));

        // Test with large values
        assert!(detect_file_truncation(u64::MAX - 1, u64::MAX));
        assert!(!detect_file_truncation(u64::MAX, u64::MAX - 1));
    }

    #[test]
    fn test_rotation_reason_display() {
        assert_eq!(RotationReason::DeviceChanged.to_string(), "device changed");
        assert_eq!(RotationReason::InodeChanged.to_string(), "inode changed");
        assert_eq!(RotationReason::Truncated.to_string(), "truncated");
    }

    #[cfg(unix)]
    mod on_disk {
        use super::super::*;
        use crate::error::Error;
        use crate::identity::PlatformMetadata;
        use crate::test_helpers::TempLogFile;

        #[tokio::test]
        async fn test_check_rotation_same_file() {
            let temp_file = TempLogFile::with_content("hello").unwrap();
            let file = File::open(temp_file.path()).await.unwrap();

            let reason = check_rotation(&PlatformMetadata, temp_file.path(), &file, 6)
                .await
                .unwrap();
            assert_eq!(reason, None);
        }

        #[tokio::test]
        async fn test_check_rotation_after_recreate() {
            let temp_file = TempLogFile::with_content("hello").unwrap();
            let file = File::open(temp_file.path()).await.unwrap();

            temp_file.rotate().unwrap();
            temp_file.append_content("a much longer first line").unwrap();

            let reason = check_rotation(&PlatformMetadata, temp_file.path(), &file, 6)
                .await
                .unwrap();
            assert_eq!(reason, Some(RotationReason::InodeChanged));
        }

        #[tokio::test]
        async fn test_check_rotation_after_truncate() {
            let temp_file = TempLogFile::with_content("hello world").unwrap();
            let file = File::open(temp_file.path()).await.unwrap();

            temp_file.truncate().unwrap();
            temp_file.append_content("abc").unwrap();

            let reason = check_rotation(&PlatformMetadata, temp_file.path(), &file, 12)
                .await
                .unwrap();
            assert_eq!(reason, Some(RotationReason::Truncated));
        }

        #[tokio::test]
        async fn test_check_rotation_missing_path_is_error() {
            let temp_file = TempLogFile::with_content("hello").unwrap();
            let file = File::open(temp_file.path()).await.unwrap();

            temp_file.remove().unwrap();

            let result = check_rotation(&PlatformMetadata, temp_file.path(), &file, 6).await;
            assert!(matches!(result, Err(Error::Stat { .. })));
        }
    }
}
