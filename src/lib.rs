//! Client-side note model library
//!
//! This library provides a fully specified note (title, rich content, tags,
//! attached resources, reminder flag) that can be assembled for upload to a
//! note-taking service or obtained from a download, and renders notes into
//! self-contained web archives for display in an embedded web view.

mod cli;
mod config;
mod content;
mod errors;
mod helper;
mod markup;
mod note;
mod resource;
mod service;
mod tags;
mod types;
mod web_archive;

// Re-export key components
pub use cli::*;
pub use config::*;
pub use content::*;
pub use errors::*;
pub use helper::*;
pub use markup::*;
pub use note::*;
pub use resource::*;
pub use service::*;
pub use tags::*;
pub use types::*;
pub use web_archive::*;
