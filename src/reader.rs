//! The follow-mode read loop.
//!
//! A [`TailReader`] reads like a plain file until end-of-stream. What happens
//! there depends on its [`FollowMode`]: return, keep polling the same handle, or
//! keep polling while periodically checking whether the path was rotated.

use crate::error::{Error, Result};
use crate::identity::{FileMetadataProvider, PlatformMetadata};
use crate::rotation::{RotationReason, check_rotation};
use std::fmt;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Delay between polls when no interval is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Number of idle polls in [`FollowMode::ByName`] that are retried without
/// checking for rotation.
pub const DEFAULT_IDLE_POLLS_BEFORE_CHECK: u32 = 4;

/// Behavior of a [`TailReader`] at end-of-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FollowMode {
    /// Return end-of-stream like a plain file.
    #[default]
    Disabled,
    /// Keep polling the open handle, even if the path is renamed or unlinked.
    ByDescriptor,
    /// Keep polling, and reopen the path when it stops naming the open file.
    ByName,
}

impl FollowMode {
    pub fn is_following(&self) -> bool {
        !matches!(self, FollowMode::Disabled)
    }
}

/// Configuration for a [`TailReader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailConfig {
    pub follow: FollowMode,
    pub poll_interval: Duration,
    pub idle_polls_before_check: u32,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            follow: FollowMode::Disabled,
            poll_interval: DEFAULT_POLL_INTERVAL,
            idle_polls_before_check: DEFAULT_IDLE_POLLS_BEFORE_CHECK,
        }
    }
}

impl TailConfig {
    pub fn with_follow(mut self, follow: FollowMode) -> Self {
        self.follow = follow;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_idle_polls_before_check(mut self, idle_polls: u32) -> Self {
        self.idle_polls_before_check = idle_polls;
        self
    }
}

/// A file handle that waits for appended data instead of stopping at end-of-file.
///
/// Reads take `&mut self`, so a reader is driven by a single task at a time and
/// cannot be reconfigured while a read is waiting.
pub struct TailReader {
    file: File,
    path: PathBuf,
    name_pattern: PathBuf,
    config: TailConfig,
    last_read_position: u64,
    consecutive_no_change: u32,
    reopen_count: u64,
    provider: Arc<dyn FileMetadataProvider>,
    cancel: CancellationToken,
}

impl TailReader {
    /// Opens `path` positioned at its current end, without following.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, TailConfig::default()).await
    }

    /// Opens `path` positioned at its current end, following the open handle.
    pub async fn open_by_descriptor<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = TailConfig::default().with_follow(FollowMode::ByDescriptor);
        Self::open_with(path, config).await
    }

    /// Opens `path` positioned at its current end, following the path name.
    pub async fn open_by_name<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = TailConfig::default().with_follow(FollowMode::ByName);
        Self::open_with(path, config).await
    }

    /// Opens `path` read-only and seeks to its end.
    ///
    /// Only bytes appended after this call are ever returned by [`read`](Self::read),
    /// unless the file is later rotated and reopened.
    pub async fn open_with<P: AsRef<Path>>(path: P, config: TailConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)
            .await
            .map_err(|e| Error::open(path.clone(), e))?;
        let end = file.seek(SeekFrom::End(0)).await?;

        debug!(
            path = %path.display(),
            offset = end,
            follow = ?config.follow,
            "Opened file for tailing"
        );

        Ok(Self {
            file,
            name_pattern: path.clone(),
            path,
            config,
            last_read_position: end,
            consecutive_no_change: 0,
            reopen_count: 0,
            provider: Arc::new(PlatformMetadata),
            cancel: CancellationToken::new(),
        })
    }

    /// Replaces the token that interrupts waits between polls.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Replaces the provider used to derive file identities.
    pub fn with_metadata_provider<M>(mut self, provider: M) -> Self
    where
        M: FileMetadataProvider + 'static,
    {
        self.provider = Arc::new(provider);
        self
    }

    /// Reads appended bytes into `buf`, waiting for them if following.
    ///
    /// Returns `Ok(0)` at end-of-stream only when following is disabled, or when
    /// `buf` is empty. Otherwise the call waits, polling every `poll_interval`,
    /// until data arrives, an error occurs, or the cancellation token fires.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            let n = self.file.read(buf).await?;
            self.last_read_position += n as u64;
            if n > 0 {
                return Ok(n);
            }

            match self.config.follow {
                FollowMode::Disabled => return Ok(0),
                FollowMode::ByDescriptor => self.wait().await?,
                FollowMode::ByName => {
                    self.wait().await?;

                    self.consecutive_no_change += 1;
                    if self.consecutive_no_change <= self.config.idle_polls_before_check {
                        continue;
                    }
                    self.consecutive_no_change = 0;

                    if let Some(reason) = self.rotation_reason().await? {
                        debug!(
                            path = %self.name_pattern.display(),
                            %reason,
                            consumed = self.last_read_position,
                            "Followed file rotated, reopening"
                        );
                        self.reopen().await?;
                    }
                }
            }
        }
    }

    /// Returns true when the path no longer names the file being read, or the
    /// file shrank below what has been consumed.
    pub async fn is_inaccessible(&self) -> Result<bool> {
        Ok(self.rotation_reason().await?.is_some())
    }

    /// Like [`is_inaccessible`](Self::is_inaccessible), reporting which check matched.
    pub async fn rotation_reason(&self) -> Result<Option<RotationReason>> {
        check_rotation(
            self.provider.as_ref(),
            &self.name_pattern,
            &self.file,
            self.last_read_position,
        )
        .await
    }

    /// Opens the name pattern again and restarts reading at byte 0.
    ///
    /// On failure the current handle is kept.
    pub async fn reopen(&mut self) -> Result<()> {
        let file = File::open(&self.name_pattern)
            .await
            .map_err(|e| Error::open(self.name_pattern.clone(), e))?;

        drop(std::mem::replace(&mut self.file, file));
        self.path = self.name_pattern.clone();
        self.last_read_position = 0;
        self.reopen_count += 1;

        debug!(
            path = %self.path.display(),
            reopens = self.reopen_count,
            "Reopened followed file"
        );
        Ok(())
    }

    async fn wait(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!(path = %self.path.display(), "Tail read cancelled");
                Err(Error::Cancelled)
            }
            _ = tokio::time::sleep(self.config.poll_interval) => Ok(()),
        }
    }

    /// Path of the currently open file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path re-resolved when following by name.
    pub fn name_pattern(&self) -> &Path {
        &self.name_pattern
    }

    pub fn follow_mode(&self) -> FollowMode {
        self.config.follow
    }

    pub fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    pub fn config(&self) -> &TailConfig {
        &self.config
    }

    /// Bytes consumed from the current handle, including the open-time offset.
    pub fn last_read_position(&self) -> u64 {
        self.last_read_position
    }

    /// Number of successful reopens since the reader was created.
    pub fn reopen_count(&self) -> u64 {
        self.reopen_count
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn set_cancellation_token(&mut self, token: CancellationToken) {
        self.cancel = token;
    }

    pub fn set_follow_mode(&mut self, follow: FollowMode) {
        self.config.follow = follow;
        self.consecutive_no_change = 0;
    }

    pub fn set_poll_interval(&mut self, poll_interval: Duration) {
        self.config.poll_interval = poll_interval;
    }

    /// Sets the path checked for rotation and reopened in [`FollowMode::ByName`].
    pub fn set_name_pattern<P: AsRef<Path>>(&mut self, name_pattern: P) {
        self.name_pattern = name_pattern.as_ref().to_path_buf();
    }

    /// Replaces the whole configuration.
    pub fn reconfigure(&mut self, config: TailConfig) {
        self.config = config;
        self.consecutive_no_change = 0;
    }
}

impl fmt::Debug for TailReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TailReader")
            .field("path", &self.path)
            .field("name_pattern", &self.name_pattern)
            .field("config", &self.config)
            .field("last_read_position", &self.last_read_position)
            .field("consecutive_no_change", &self.consecutive_no_change)
            .field("reopen_count", &self.reopen_count)
            .finish_non_exhaustive()
    }
}
