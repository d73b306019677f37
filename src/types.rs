//! Shared types for the notekeep application.
//!
//! Holds the crate-wide `Result` alias and the CLI subcommand definitions.
use std::path::PathBuf;

use clap::Subcommand;

use crate::NoteError;

/// A specialized Result type for notekeep operations.
pub type Result<T> = std::result::Result<T, NoteError>;

/// Available subcommands for the notekeep application
#[derive(Subcommand)]
pub enum Commands {
    /// Create a new note
    Add {
        /// Title of the note
        #[clap(short = 'T', long)]
        title: String,

        /// Body text of the note
        #[clap(short, long)]
        content: Option<String>,

        /// Checklist tasks (comma-separated); makes this a checklist note
        #[clap(short = 'k', long)]
        tasks: Option<String>,

        /// Media reference (path or URI); makes this a media note
        #[clap(short, long, conflicts_with = "tasks")]
        media: Option<String>,

        /// Color label (default, red, orange, yellow, green, blue, purple)
        #[clap(long)]
        color: Option<String>,
    },

    /// List active notes
    List {
        /// Only show favorites
        #[clap(short, long)]
        favorites: bool,

        /// Show hidden notes instead of visible ones
        #[clap(long)]
        hidden: bool,

        /// Limit the number of notes returned
        #[clap(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Show a single note
    Show {
        /// ID of the note
        id: String,

        /// Format output as raw JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Edit an existing note
    Edit {
        /// ID of the note to edit
        id: String,

        /// New title
        #[clap(short = 'T', long)]
        title: Option<String>,

        /// New body text
        #[clap(short, long)]
        content: Option<String>,

        /// New color label
        #[clap(long)]
        color: Option<String>,

        /// Path to a file containing the new body text
        #[clap(short, long)]
        file: Option<PathBuf>,
    },

    /// Search active notes by title or content
    Search {
        /// Search query text
        query: String,

        /// Limit the number of search results
        #[clap(short = 'n', long, default_value_t = 10)]
        limit: usize,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Mark or unmark a note as favorite
    Favorite {
        id: String,

        /// Remove the favorite flag
        #[clap(long)]
        off: bool,
    },

    /// Hide or unhide a note
    Hide {
        id: String,

        /// Make the note visible again
        #[clap(long)]
        off: bool,
    },

    /// Toggle a checklist task (0-based index)
    Task { id: String, index: usize },

    /// Move a note to the trash
    Delete { id: String },

    /// Show the trash, purging expired notes first
    Trash {
        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Restore a note from the trash
    Restore { id: String },

    /// Permanently delete a trashed note
    Purge {
        id: String,

        /// Skip confirmation prompt
        #[clap(short, long)]
        force: bool,
    },

    /// Permanently delete every trashed note
    EmptyTrash {
        /// Skip confirmation prompt
        #[clap(short, long)]
        force: bool,
    },

    /// Show or change the trash retention window (days)
    Retention {
        /// New retention value; invalid input falls back to the default
        #[clap(short, long)]
        set: Option<String>,
    },

    /// List prior versions of a note
    History { id: String },

    /// Restore a prior version of a note
    Revert {
        id: String,

        /// History index as shown by `history`
        index: usize,
    },
}
