//! Streaming zip output.
//!
//! Entries are queued on a bounded channel and written one at a time by a
//! single writer task, so [`ArchiveSink::append`] can be called from any
//! number of concurrent leaves. Each append returns an [`EntryHandle`]
//! that resolves once the writer has drained that entry's stream.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_zip::tokio::write::ZipFileWriter;
use async_zip::{Compression, DeflateOption, ZipEntryBuilder};
use futures::io::AsyncWriteExt;
use futures::StreamExt;
use log::{debug, warn};
use tokio::fs::File;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{DriveError, Result};
use crate::gateway::ByteStream;

/// Entries that may wait for the writer before `append` suspends.
const QUEUE_CAPACITY: usize = 32;

struct QueuedEntry {
    path: String,
    stream: ByteStream,
    done: oneshot::Sender<Result<u64>>,
}

/// Completion signal for one appended entry.
#[derive(Debug)]
pub struct EntryHandle {
    path: String,
    done: oneshot::Receiver<Result<u64>>,
}

impl EntryHandle {
    /// Wait until the writer has consumed the entry's stream. Yields the
    /// number of uncompressed bytes stored.
    pub async fn wait(self) -> Result<u64> {
        match self.done.await {
            Ok(outcome) => outcome,
            Err(_) => Err(DriveError::ArchiveWriteError(format!(
                "archive writer stopped before '{}' was written",
                self.path
            ))),
        }
    }
}

/// Zip archive written to a file by a background writer task.
pub struct ArchiveSink {
    path: PathBuf,
    queue: mpsc::Sender<QueuedEntry>,
    pending: Arc<AtomicUsize>,
    writer: JoinHandle<Result<u64>>,
}

impl ArchiveSink {
    /// Create the output file and start the writer.
    pub async fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .await
            .map_err(|e| archive_error(format!("{}: {}", path.display(), e)))?;

        let (queue, entries) = mpsc::channel(QUEUE_CAPACITY);
        let pending = Arc::new(AtomicUsize::new(0));
        let writer = tokio::spawn(write_entries(file, entries, Arc::clone(&pending)));

        Ok(Self {
            path,
            queue,
            pending,
            writer,
        })
    }

    /// Entries appended but not yet completed.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Queue an entry. The stream is read later by the writer task; await
    /// the returned handle to know when it has been fully archived.
    pub async fn append(&self, path: String, stream: ByteStream) -> Result<EntryHandle> {
        let (done_tx, done_rx) = oneshot::channel();
        self.pending.fetch_add(1, Ordering::SeqCst);

        let entry = QueuedEntry {
            path: path.clone(),
            stream,
            done: done_tx,
        };
        if self.queue.send(entry).await.is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(archive_error("archive writer is no longer accepting entries"));
        }

        Ok(EntryHandle {
            path,
            done: done_rx,
        })
    }

    /// Close the archive and return its size in bytes.
    ///
    /// Fails with [`DriveError::PendingEntries`] if any appended entry has
    /// not completed; the partial file is removed in that case, as it is
    /// on any write error.
    pub async fn finalize(self) -> Result<u64> {
        let pending = self.pending();
        if pending > 0 {
            self.abort().await;
            return Err(DriveError::PendingEntries(pending));
        }

        let Self {
            path,
            queue,
            writer,
            ..
        } = self;
        drop(queue);

        let outcome = match writer.await {
            Ok(outcome) => outcome,
            Err(e) => Err(archive_error(e)),
        };
        if outcome.is_err() {
            remove_partial(&path).await;
        }
        outcome
    }

    /// Stop writing and delete the partial archive.
    pub async fn abort(self) {
        let Self {
            path,
            queue,
            writer,
            ..
        } = self;
        drop(queue);
        writer.abort();
        let _ = writer.await;
        remove_partial(&path).await;
    }
}

async fn remove_partial(path: &Path) {
    warn!("Removing incomplete archive {}", path.display());
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Could not remove {}: {}", path.display(), e);
    }
}

fn archive_error(err: impl Display) -> DriveError {
    DriveError::ArchiveWriteError(err.to_string())
}

/// Writer task: drain the queue one entry at a time, then close the zip.
/// The first failure stops the task; entries still queued are dropped and
/// their handles report the writer as stopped.
async fn write_entries(
    file: File,
    mut entries: mpsc::Receiver<QueuedEntry>,
    pending: Arc<AtomicUsize>,
) -> Result<u64> {
    let mut zip = ZipFileWriter::with_tokio(file);

    while let Some(entry) = entries.recv().await {
        let QueuedEntry { path, stream, done } = entry;
        let outcome = write_entry(&mut zip, &path, stream).await;
        pending.fetch_sub(1, Ordering::SeqCst);

        match outcome {
            Ok(bytes) => {
                debug!("Archived '{}' ({} bytes)", path, bytes);
                let _ = done.send(Ok(bytes));
            }
            Err(e) => {
                let fatal = archive_error(format!("'{}': {}", path, e));
                let _ = done.send(Err(e));
                entries.close();
                return Err(fatal);
            }
        }
    }

    let file = zip.close().await.map_err(archive_error)?.into_inner();
    file.sync_all().await.map_err(archive_error)?;
    let total = file.metadata().await.map_err(archive_error)?.len();
    Ok(total)
}

async fn write_entry(zip: &mut ZipFileWriter<File>, path: &str, mut stream: ByteStream) -> Result<u64> {
    let builder = ZipEntryBuilder::new(path.to_string().into(), Compression::Deflate)
        .deflate_option(DeflateOption::Maximum);
    let mut entry = zip
        .write_entry_stream(builder)
        .await
        .map_err(archive_error)?;

    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        entry.write_all(&chunk).await.map_err(archive_error)?;
        written += chunk.len() as u64;
    }

    entry.close().await.map_err(archive_error)?;
    Ok(written)
}
