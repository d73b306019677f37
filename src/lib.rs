//! Local note-keeping library
//!
//! This library stores notes in a single JSON document, moves deleted notes
//! to a trash with a configurable retention window, and purges them once
//! that window has passed.

mod cli;
mod clock;
mod config;
mod document;
mod errors;
mod note;
mod pending;
mod purge_scheduler;
mod retention;
mod storage;
mod trash;
mod types;

// Re-export key components
pub use cli::*;
pub use clock::*;
pub use config::*;
pub use document::*;
pub use errors::*;
pub use note::*;
pub use pending::*;
pub use purge_scheduler::*;
pub use retention::*;
pub use storage::*;
pub use trash::*;
pub use types::*;
