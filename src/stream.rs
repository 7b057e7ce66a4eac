//! Stream adapter that turns a [`TailReader`] into batches of lines.

use crate::error::{Error, Result};
use crate::reader::TailReader;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Longest partial line held while waiting for a separator.
const MAX_PENDING_BYTES: usize = 1024 * 1024;

/// A stream of line batches read from a followed file.
///
/// Each item holds the complete, non-empty lines that arrived in one read.
/// A trailing partial line is held back until its separator shows up.
pub struct LineStream {
    receiver: mpsc::UnboundedReceiver<Result<Vec<String>>>,
    shutdown: CancellationToken,
    _task_handle: Option<JoinHandle<()>>,
}

impl LineStream {
    /// Moves `reader` onto a background task and streams its lines.
    ///
    /// The reader's own cancellation token still applies; dropping the stream
    /// additionally cancels any wait in progress.
    pub fn new(mut reader: TailReader, separator: Option<String>) -> Self {
        let separator = separator
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "\n".to_string());

        let shutdown = reader.cancellation_token().child_token();
        reader.set_cancellation_token(shutdown.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        let task_handle = tokio::spawn(line_reader_task(reader, separator, tx, MAX_PENDING_BYTES));

        LineStream {
            receiver: rx,
            shutdown,
            _task_handle: Some(task_handle),
        }
    }

    /// Check if the stream has been closed/dropped
    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.receiver.is_closed()
    }

    #[cfg(test)]
    fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    #[cfg(test)]
    fn take_task_handle(&mut self) -> JoinHandle<()> {
        self._task_handle.take().expect("task handle already taken")
    }
}

impl Drop for LineStream {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl Stream for LineStream {
    type Item = Result<Vec<String>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_recv(cx)
    }
}

/// Background task that reads from the tail reader and sends line batches
async fn line_reader_task(
    mut reader: TailReader,
    separator: String,
    tx: mpsc::UnboundedSender<Result<Vec<String>>>,
    max_pending: usize,
) {
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];
    let mut pending = Vec::new();
    let mut reopens = reader.reopen_count();

    loop {
        let result = reader.read(&mut chunk).await;

        // A partial line never continues into a different file
        if reader.reopen_count() != reopens {
            reopens = reader.reopen_count();
            if !pending.is_empty() {
                tracing::debug!(
                    path = %reader.path().display(),
                    bytes = pending.len(),
                    "Flushing partial line from rotated file"
                );
            }
            if let Err(e) = send_lines(std::mem::take(&mut pending), &separator, &tx) {
                let _ = tx.send(Err(e));
                break;
            }
        }

        let n = match result {
            Ok(n) => n,
            Err(Error::Cancelled) => break,
            Err(e) => {
                tracing::warn!(
                    path = %reader.path().display(),
                    error = %e,
                    pending = pending.len(),
                    "Tail read failed"
                );
                let rest = std::mem::take(&mut pending);
                if let Err(flush_error) = send_lines(rest, &separator, &tx) {
                    let _ = tx.send(Err(flush_error));
                }
                let _ = tx.send(Err(e));
                break;
            }
        };

        // End-of-stream only reaches us when following is disabled
        if n == 0 {
            let rest = std::mem::take(&mut pending);
            if let Err(e) = send_lines(rest, &separator, &tx) {
                let _ = tx.send(Err(e));
            }
            break;
        }

        pending.extend_from_slice(&chunk[..n]);
        let mut complete = take_complete_lines(&mut pending, separator.as_bytes());
        if pending.len() >= max_pending {
            tracing::debug!(
                path = %reader.path().display(),
                bytes = pending.len(),
                "Partial line exceeds limit, emitting it early"
            );
            complete.extend(take_oversized(&mut pending, max_pending));
            complete.extend_from_slice(separator.as_bytes());
        }
        if let Err(e) = send_lines(complete, &separator, &tx) {
            let _ = tx.send(Err(e));
            break;
        }

        if tx.is_closed() {
            break;
        }
    }

    tracing::debug!(path = %reader.path().display(), "Line reader task finished");
}

/// Decode and split `content`, sending the batch if it holds any lines
fn send_lines(
    content: Vec<u8>,
    separator: &str,
    tx: &mpsc::UnboundedSender<Result<Vec<String>>>,
) -> Result<()> {
    if content.is_empty() {
        return Ok(());
    }

    let content = String::from_utf8(content)?;
    let parts = split_and_filter_content(&content, separator);
    if !parts.is_empty() {
        let _ = tx.send(Ok(parts));
    }
    Ok(())
}

/// Remove and return everything up to and including the last separator
fn take_complete_lines(pending: &mut Vec<u8>, separator: &[u8]) -> Vec<u8> {
    let last = pending
        .windows(separator.len())
        .rposition(|window| window == separator);

    match last {
        Some(index) => {
            let rest = pending.split_off(index + separator.len());
            std::mem::replace(pending, rest)
        }
        None => Vec::new(),
    }
}

/// Remove and return the whole of an oversized `pending` buffer, keeping back
/// an incomplete UTF-8 sequence at its end
fn take_oversized(pending: &mut Vec<u8>, max_pending: usize) -> Vec<u8> {
    if pending.len() < max_pending {
        return Vec::new();
    }

    let cut = match std::str::from_utf8(pending) {
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        _ => pending.len(),
    };
    let rest = pending.split_off(cut);
    std::mem::replace(pending, rest)
}

/// Split content by separator and filter out empty/whitespace-only parts
fn split_and_filter_content(content: &str, separator: &str) -> Vec<String> {
    content
        .split(separator)
        .filter_map(|part| {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(part.to_string())
            }
        })
        .collect()
}
