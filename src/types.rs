//! Shared types for notekit.
//!
//! This module contains the result alias, the completion callback types and
//! the CLI subcommands.
use std::path::PathBuf;

use clap::Subcommand;

use crate::{Note, NoteError, WebArchiveData};

/// A specialized Result type for notekit operations.
pub type Result<T> = std::result::Result<T, NoteError>;

/// Receives the finished note after it was populated from an embedded web view.
pub type PopulateFromWebViewCompletion = Box<dyn FnOnce(Note) + Send + 'static>;

/// Receives the produced archive data after web archive generation.
pub type GenerateWebArchiveDataCompletion = Box<dyn FnOnce(WebArchiveData) + Send + 'static>;

/// Available subcommands for the notekit binary
#[derive(Subcommand)]
pub enum Commands {
    /// Build a note and write its web archive
    Archive {
        /// Title of the note
        #[clap(short = 'T', long)]
        title: String,

        /// Plain text file used as the note content
        #[clap(long, group = "source")]
        text: Option<PathBuf>,

        /// Markdown file used as the note content
        #[clap(short, long, group = "source")]
        markdown: Option<PathBuf>,

        /// HTML file, sanitized into note content
        #[clap(long, group = "source")]
        html: Option<PathBuf>,

        /// ENML file used verbatim as the note content
        #[clap(long, group = "source")]
        enml: Option<PathBuf>,

        /// Files to attach as resources
        #[clap(short, long)]
        attach: Vec<PathBuf>,

        /// Attach every file under this directory
        #[clap(long)]
        attach_dir: Option<PathBuf>,

        /// Glob filter for --attach-dir (e.g. "*.png")
        #[clap(long, requires = "attach_dir")]
        include: Option<String>,

        /// Tags to associate with the note (comma-separated)
        #[clap(short = 't', long)]
        tags: Option<String>,

        /// Mark the note as a reminder
        #[clap(short, long)]
        reminder: bool,

        /// Path of the archive to write
        #[clap(short, long)]
        output: PathBuf,
    },

    /// Print the manifest of a web archive
    Inspect {
        /// Path to the archive
        archive: PathBuf,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Convert a document to ENML and print it
    Enml {
        /// Markdown input
        #[clap(short, long, group = "source")]
        markdown: Option<PathBuf>,

        /// HTML input
        #[clap(long, group = "source")]
        html: Option<PathBuf>,

        /// Plain text input
        #[clap(long, group = "source")]
        text: Option<PathBuf>,
    },

    /// Show what an upload client would send for a note stored as JSON
    UploadPreview {
        /// Path to the note JSON file
        note: PathBuf,

        /// Tags that already exist on the service (comma-separated)
        #[clap(long)]
        existing_tags: Option<String>,
    },
}
