//! Error types for the notekeep library.
//!
//! This module defines the error type shared by the note store, the trash
//! manager and the retention policy.

use std::{io, path::PathBuf};

use thiserror::Error;

/// The main error type for notekeep.
#[derive(Error, Debug)]
pub enum NoteError {
    /// The underlying document could not be read or written.
    #[error("Storage unavailable at {path}: {message}")]
    StorageUnavailable { path: PathBuf, message: String },

    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored document is structurally valid JSON but breaks a store invariant.
    #[error("Invalid note format: {message}")]
    InvalidFormat { message: String },

    /// Note was not found when performing an operation.
    #[error("Note not found: {id}")]
    NoteNotFound { id: String },

    /// Content operations are not allowed on trashed notes.
    #[error("Note is in the trash: {id}")]
    NoteInTrash { id: String },

    /// Only trashed notes can be purged.
    #[error("Note is not in the trash: {id}")]
    NoteNotInTrash { id: String },

    #[error("Note {id} has no history entry {index}")]
    VersionNotFound { id: String, index: usize },

    #[error("Note {id} has no task {index}")]
    TaskNotFound { id: String, index: usize },

    /// Retention input that is not an integer >= 1.
    #[error("Invalid retention value: {input:?}")]
    InvalidRetentionValue { input: String },

    /// Errors related to configuration.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Directory creation or access failed.
    #[error("Failed to create or access directory: {path}")]
    DirectoryError { path: PathBuf },

    /// Generic application error with a custom message.
    #[error("{message}")]
    ApplicationError { message: String },
}
