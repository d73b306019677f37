//! Command-line front end for the note store.
mod app;
mod args;

pub use app::*;
pub use args::*;
