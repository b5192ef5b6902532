//! CLI application handler
//!
//! This module builds notes from files on disk and drives web archive
//! generation and inspection for the command-line interface.
use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};

use globset::Glob;
use log::{debug, info};
use walkdir::WalkDir;

use crate::{
    load_note_from_file, parse_tags, resolve_tag_names, Commands, Config, MemoryTagStore, Note,
    NoteContent, NoteError, Resource, Result, WebArchive,
};

/// Where the content of a new note comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    Text(PathBuf),
    Markdown(PathBuf),
    Html(PathBuf),
    Enml(PathBuf),
    Empty,
}

impl ContentSource {
    fn from_flags(
        text: Option<PathBuf>,
        markdown: Option<PathBuf>,
        html: Option<PathBuf>,
        enml: Option<PathBuf>,
    ) -> Self {
        match (text, markdown, html, enml) {
            (Some(path), _, _, _) => ContentSource::Text(path),
            (_, Some(path), _, _) => ContentSource::Markdown(path),
            (_, _, Some(path), _) => ContentSource::Html(path),
            (_, _, _, Some(path)) => ContentSource::Enml(path),
            _ => ContentSource::Empty,
        }
    }

    /// Reads the source and converts it into note content
    pub fn load(&self) -> Result<NoteContent> {
        match self {
            ContentSource::Text(path) => Ok(NoteContent::from_plain_text(&read_source(path)?)),
            ContentSource::Markdown(path) => NoteContent::from_markdown(&read_source(path)?),
            ContentSource::Html(path) => NoteContent::from_sanitized_html(&read_source(path)?),
            ContentSource::Enml(path) => NoteContent::from_enml(read_source(path)?),
            ContentSource::Empty => Ok(NoteContent::default()),
        }
    }
}

/// Options for building a note and its archive
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub title: String,
    pub source: ContentSource,
    pub attach: Vec<PathBuf>,
    pub attach_dir: Option<PathBuf>,
    pub include: Option<String>,
    pub tags: Option<String>,
    pub reminder: bool,
    pub output: PathBuf,
}

/// CLI Application handler
pub struct App {
    /// Application configuration
    config: Config,

    /// Whether to display verbose output
    verbose: bool,
}

impl App {
    /// Create a new CLI application with the given config
    pub fn new(config: Config, verbose: bool) -> Self {
        Self { config, verbose }
    }

    /// Run the CLI application with the given command
    pub async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Archive {
                title,
                text,
                markdown,
                html,
                enml,
                attach,
                attach_dir,
                include,
                tags,
                reminder,
                output,
            } => {
                let options = ArchiveOptions {
                    title,
                    source: ContentSource::from_flags(text, markdown, html, enml),
                    attach,
                    attach_dir,
                    include,
                    tags,
                    reminder,
                    output,
                };
                self.handle_archive(options).await?
            }

            Commands::Inspect { archive, json } => self.handle_inspect(&archive, json)?,

            Commands::Enml {
                markdown,
                html,
                text,
            } => {
                let content = ContentSource::from_flags(text, markdown, html, None).load()?;
                println!("{}", content.enml());
            }

            Commands::UploadPreview {
                note,
                existing_tags,
            } => self.handle_upload_preview(&note, existing_tags)?,
        }

        Ok(())
    }

    /// Builds a note from the options and writes its web archive
    pub async fn handle_archive(&self, options: ArchiveOptions) -> Result<()> {
        let note = self.build_note(&options)?;
        let data = note
            .generate_web_archive_data_with(&self.config.archive)
            .await?;
        data.write_to(&options.output)?;

        println!(
            "{} {} ({} bytes, {} resource{})",
            console::style("Wrote").green().bold(),
            options.output.display(),
            data.len(),
            note.resources().len(),
            if note.resources().len() == 1 { "" } else { "s" }
        );
        if self.verbose {
            println!("MIME type: {}", data.mime_type());
        }
        Ok(())
    }

    /// Assembles the note described by the options
    pub fn build_note(&self, options: &ArchiveOptions) -> Result<Note> {
        let mut note = Note::with_content(options.title.clone(), options.source.load()?);

        let mut tags = self.config.default_tags.clone();
        tags.extend(parse_tags(options.tags.clone()));
        note.set_tag_names(tags);
        note.set_is_reminder(options.reminder);

        for path in self.attachment_paths(options)? {
            let resource = Resource::from_path(&path)?;
            // Images are shown inline; everything else ends up in the attachment list
            if resource.is_image() {
                note.content_mut().append_media(&resource);
            }
            note.add_resource(resource);
        }

        info!(
            "Built note {:?} with {} resource(s)",
            note.title(),
            note.resources().len()
        );
        Ok(note)
    }

    fn attachment_paths(&self, options: &ArchiveOptions) -> Result<Vec<PathBuf>> {
        let mut paths = options.attach.clone();

        if let Some(dir) = &options.attach_dir {
            if !dir.is_dir() {
                return Err(NoteError::FileNotFound {
                    file_path: dir.display().to_string(),
                });
            }

            let matcher = match &options.include {
                Some(pattern) => Some(
                    Glob::new(pattern)
                        .map_err(|e| NoteError::Config {
                            message: format!("Invalid --include pattern {:?}: {}", pattern, e),
                        })?
                        .compile_matcher(),
                ),
                None => None,
            };

            for entry in WalkDir::new(dir)
                .min_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
                let keep = matcher.as_ref().map_or(true, |m| {
                    m.is_match(relative) || entry.path().file_name().is_some_and(|n| m.is_match(n))
                });
                if keep {
                    debug!("Attaching {}", entry.path().display());
                    paths.push(entry.path().to_path_buf());
                } else {
                    debug!("Skipping {}", entry.path().display());
                }
            }
        }

        Ok(paths)
    }

    fn handle_inspect(&self, path: &Path, json: bool) -> Result<()> {
        let archive = WebArchive::open(path)?;
        let manifest = archive.manifest();

        if json {
            println!("{}", serde_json::to_string_pretty(manifest)?);
            return Ok(());
        }

        let term_width = terminal_size::terminal_size()
            .map(|(w, _)| w.0 as usize)
            .unwrap_or(80);

        println!("Title: {}", console::style(&manifest.title).bold());
        println!(
            "Main resource: {} ({}, {})",
            manifest.main_resource.path,
            manifest.main_resource.mime_type,
            manifest.main_resource.text_encoding
        );
        println!("{}", "-".repeat(term_width.min(50)));

        if manifest.subresources.is_empty() {
            println!("No subresources.");
        }
        for sub in &manifest.subresources {
            println!(
                "{} {} {} bytes{}",
                sub.path,
                console::style(&sub.mime_type).dim(),
                sub.size,
                if sub.referenced { "" } else { " (attachment)" }
            );
            if self.verbose {
                if let Some(name) = &sub.filename {
                    println!("  filename: {}", name);
                }
                if let Some(url) = &sub.source_url {
                    println!("  source: {}", url);
                }
            }
        }
        Ok(())
    }

    fn handle_upload_preview(&self, path: &Path, existing_tags: Option<String>) -> Result<()> {
        let note = load_note_from_file(path)?;
        let mut service = note.to_service_note();

        let mut store = MemoryTagStore::with_existing(&parse_tags(existing_tags))?;
        let known = store.len();
        let tags = resolve_tag_names(&mut store, &service.tag_names)?;
        service.tag_guids = tags.iter().map(|tag| tag.guid.clone()).collect();

        let preview = serde_json::json!({
            "title": service.title,
            "tag_names": tags.iter().map(|tag| tag.name.clone()).collect::<Vec<_>>(),
            "tag_guids": service.tag_guids,
            "tags_created": store.len() - known,
            "content_length": service.content.len(),
            "resources": service
                .resources
                .iter()
                .map(|r| serde_json::json!({
                    "mime": r.mime,
                    "file_name": r.file_name,
                    "size": r.body.len(),
                    "body_hash": r.body_hash,
                }))
                .collect::<Vec<_>>(),
            "attributes": service.attributes,
        });
        println!("{}", serde_json::to_string_pretty(&preview)?);
        Ok(())
    }
}

fn read_source(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(NoteError::FileNotFound {
            file_path: path.display().to_string(),
        });
    }
    Ok(read_to_string(path)?)
}
