//! Access log tailing.
//!
//! The file is read from the beginning and then polled for appended data. It is reopened
//! when it shrinks (truncation) or when the path starts pointing at a different file
//! (rotation by rename). A rotated-away path is waited for until it reappears.
//!
//! After a rename the old file is still read alongside the new one, since the writer
//! keeps appending to its open descriptor until it reopens its log. It is released once
//! a poll finds no new data in it.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

/// Upper bound on the lines returned by one [`FileTailer::read_available`] call.
pub const MAX_BATCH_LINES: usize = 1024;

/// Lines longer than this many bytes are dropped.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Follows an access log and yields complete lines.
#[derive(Debug)]
pub struct FileTailer {
    path: PathBuf,
    poll_interval: Duration,
    current: LogReader,
    rotated: Option<LogReader>,
}

#[cfg(unix)]
type FileIdentity = (u64, u64);
#[cfg(not(unix))]
type FileIdentity = ();

#[cfg(unix)]
fn file_identity(metadata: &std::fs::Metadata) -> Option<FileIdentity> {
    use std::os::unix::fs::MetadataExt;
    Some((metadata.dev(), metadata.ino()))
}

#[cfg(not(unix))]
fn file_identity(_metadata: &std::fs::Metadata) -> Option<FileIdentity> {
    None
}

/// Read state of one opened file.
#[derive(Debug)]
struct LogReader {
    reader: BufReader<File>,
    identity: Option<FileIdentity>,
    position: u64,
    pending: Vec<u8>,
    oversized: bool,
}

impl LogReader {
    async fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path).await?;
        let identity = file_identity(&file.metadata().await?);
        Ok(Self {
            reader: BufReader::new(file),
            identity,
            position: 0,
            pending: Vec::new(),
            oversized: false,
        })
    }

    /// Appends up to `max` complete lines to `lines`.
    ///
    /// Returns the number of bytes consumed. Stops early at end of file.
    async fn read_lines(&mut self, max: usize, lines: &mut Vec<String>) -> io::Result<u64> {
        let start = self.position;
        let mut taken = 0;

        while taken < max {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                break;
            }

            let newline = available.iter().position(|&b| b == b'\n');
            let consumed = newline.map_or(available.len(), |i| i + 1);

            if !self.oversized {
                if self.pending.len() + consumed > MAX_LINE_BYTES {
                    tracing::warn!(limit = MAX_LINE_BYTES, "Dropping oversized access log line");
                    self.pending.clear();
                    self.oversized = true;
                } else {
                    self.pending.extend_from_slice(&available[..consumed]);
                }
            }

            self.reader.consume(consumed);
            self.position += consumed as u64;

            if newline.is_some() {
                if self.oversized {
                    self.oversized = false;
                } else {
                    lines.push(decode_line(&self.pending));
                    self.pending.clear();
                    taken += 1;
                }
            }
        }

        Ok(self.position - start)
    }

    /// Returns the unterminated tail of the file, if any.
    fn take_partial(&mut self) -> Option<String> {
        if self.oversized || self.pending.is_empty() {
            return None;
        }
        let line = decode_line(&self.pending);
        self.pending.clear();
        Some(line)
    }
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

impl FileTailer {
    /// Opens `path` for tailing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub async fn open(path: impl Into<PathBuf>, poll_interval: Duration) -> io::Result<Self> {
        let path = path.into();
        let current = LogReader::open(&path).await?;

        Ok(Self {
            path,
            poll_interval,
            current,
            rotated: None,
        })
    }

    /// The tailed path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the complete lines currently available, at most [`MAX_BATCH_LINES`] per call.
    ///
    /// Lines left in a rotated-away file come first. A trailing line without a newline is
    /// kept back until it is completed.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    pub async fn read_available(&mut self) -> io::Result<Vec<String>> {
        let mut lines = Vec::new();

        if let Some(old) = &mut self.rotated {
            let read = old.read_lines(MAX_BATCH_LINES, &mut lines).await?;
            if lines.len() == MAX_BATCH_LINES {
                return Ok(lines);
            }
            if read == 0 {
                lines.extend(old.take_partial());
                tracing::info!(path = %self.path.display(), "Finished reading rotated access log");
                self.rotated = None;
            }
        }

        let remaining = MAX_BATCH_LINES - lines.len();
        self.current.read_lines(remaining, &mut lines).await?;
        Ok(lines)
    }

    /// Reopens the file if it was truncated or replaced.
    ///
    /// Returns whether the file was reopened. A missing path is not an error: the file is
    /// assumed to be mid-rotation and checked again on the next call. While a rotated-away
    /// file is still being read, no further rotation is looked for.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be inspected or reopened.
    pub async fn reopen_if_rotated(&mut self) -> io::Result<bool> {
        if self.rotated.is_some() {
            return Ok(false);
        }

        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };

        let replaced = file_identity(&metadata) != self.current.identity;
        let truncated = !replaced && metadata.len() < self.current.position;
        if !truncated && !replaced {
            return Ok(false);
        }

        tracing::info!(
            path = %self.path.display(),
            truncated,
            replaced,
            "Reopening access log"
        );
        let reopened = LogReader::open(&self.path).await?;
        let previous = std::mem::replace(&mut self.current, reopened);
        if replaced {
            self.rotated = Some(previous);
        }
        Ok(true)
    }

    /// Forwards lines until shutdown is signalled or the line receiver is dropped.
    ///
    /// A backlog is forwarded batch by batch without waiting for the poll interval; the
    /// bounded line channel paces it. Read errors are logged and tailing continues on the
    /// next poll.
    pub async fn run(mut self, lines: mpsc::Sender<String>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(path = %self.path.display(), "Tailing access log");

        loop {
            let backlog = match self.read_available().await {
                Ok(batch) => {
                    let full = batch.len() == MAX_BATCH_LINES;
                    for line in batch {
                        if lines.send(line).await.is_err() {
                            tracing::warn!("Line pipeline closed, stopping access log tailer");
                            return;
                        }
                    }
                    full
                }
                Err(e) => {
                    tracing::warn!(error = %e, path = %self.path.display(), "Failed to read access log");
                    false
                }
            };

            if backlog {
                if *shutdown.borrow() {
                    break;
                }
                continue;
            }

            tokio::select! {
                _ = shutdown.wait_for(|&stop| stop) => break,
                () = tokio::time::sleep(self.poll_interval) => {}
            }

            if let Err(e) = self.reopen_if_rotated().await {
                tracing::warn!(error = %e, path = %self.path.display(), "Failed to reopen access log");
            }
        }

        tracing::info!("Access log tailer stopped");
    }
}
