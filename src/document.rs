//! Whole-document storage primitives.
//!
//! The note store and the retention policy each own one document. A document
//! is read in full and overwritten in full; there are no partial writes.
use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use log::{debug, error, trace};
use tempfile::NamedTempFile;

use crate::{NoteError, Result};

/// Read/write access to a single text document
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns the full document, or `None` when it does not exist yet
    async fn read_document(&self) -> Result<Option<String>>;

    /// Replaces the full document, creating it (and its directory) if absent
    async fn write_document(&self, text: &str) -> Result<()>;
}

/// A document backed by a file on the local filesystem
#[derive(Debug, Clone)]
pub struct FileDocument {
    path: PathBuf,
}

impl FileDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, e: impl std::fmt::Display) -> NoteError {
        NoteError::StorageUnavailable {
            path: self.path.clone(),
            message: e.to_string(),
        }
    }

    fn write_atomically(&self, text: &str) -> Result<()> {
        // Ensure the parent directory exists
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if !dir.exists() {
            debug!("Creating document directory: {}", dir.display());
            fs::create_dir_all(dir).map_err(|e| {
                error!("Failed to create directory {}: {}", dir.display(), e);
                self.unavailable(e)
            })?;
        }

        // Write next to the target so the final rename stays on one filesystem
        let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| {
            error!("Failed to create temporary file: {}", e);
            self.unavailable(e)
        })?;

        trace!("Writing {} bytes to temporary file", text.len());
        temp_file.write_all(text.as_bytes()).map_err(|e| {
            error!("Failed to write to temporary file: {}", e);
            self.unavailable(e)
        })?;

        temp_file.flush().map_err(|e| {
            error!("Failed to flush temporary file: {}", e);
            self.unavailable(e)
        })?;

        temp_file.persist(&self.path).map_err(|e| {
            error!(
                "Failed to persist file {}: {}",
                self.path.display(),
                e.error
            );
            self.unavailable(e.error)
        })?;

        debug!("Document written: {}", self.path.display());
        Ok(())
    }

    fn read(&self) -> Result<Option<String>> {
        trace!("Reading document: {}", self.path.display());
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Document does not exist yet: {}", self.path.display());
                Ok(None)
            }
            Err(e) => {
                error!("Failed to read document {}: {}", self.path.display(), e);
                Err(self.unavailable(e))
            }
        }
    }
}

#[async_trait]
impl DocumentStore for FileDocument {
    async fn read_document(&self) -> Result<Option<String>> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.read())
            .await
            .map_err(|e| NoteError::ApplicationError {
                message: format!("Document read task failed: {}", e),
            })?
    }

    async fn write_document(&self, text: &str) -> Result<()> {
        let this = self.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || this.write_atomically(&text))
            .await
            .map_err(|e| NoteError::ApplicationError {
                message: format!("Document write task failed: {}", e),
            })?
    }
}

/// An in-memory document, used by tests and by callers that do not need
/// durability. Writes can be made to fail on demand.
#[derive(Debug, Default)]
pub struct MemoryDocument {
    text: Mutex<Option<String>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Mutex::new(Some(text.into())),
            ..Self::default()
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Current document contents
    pub fn contents(&self) -> Option<String> {
        self.text.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn unavailable(message: &str) -> NoteError {
        NoteError::StorageUnavailable {
            path: PathBuf::from("<memory>"),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocument {
    async fn read_document(&self) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unavailable("read failure injected"));
        }
        Ok(self.contents())
    }

    async fn write_document(&self, text: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::unavailable("write failure injected"));
        }
        *self.text.lock().unwrap_or_else(|e| e.into_inner()) = Some(text.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
