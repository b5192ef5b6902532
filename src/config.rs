use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{NoteError, Result};

/// Name of the configuration file inside the platform config directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Settings that control how a note is rendered into a web archive.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Deflate archive entries instead of storing them
    pub compress: bool,

    /// Directory inside the archive that holds resource entries
    pub resource_dir: String,

    /// Name of the main HTML document inside the archive
    pub main_document: String,

    /// Whether attached resources that the content never references are
    /// listed below the content
    pub list_unreferenced_resources: bool,

    /// Whether to embed the built-in stylesheet
    pub include_default_style: bool,

    /// Extra CSS appended after the built-in stylesheet
    pub extra_css: Option<String>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compress: true,
            resource_dir: "resources".to_string(),
            main_document: "index.html".to_string(),
            list_unreferenced_resources: true,
            include_default_style: true,
            extra_css: None,
        }
    }
}

impl ArchiveConfig {
    /// Checks that entry names are usable as relative archive paths.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("resource_dir", &self.resource_dir),
            ("main_document", &self.main_document),
        ] {
            if value.trim().is_empty() {
                return Err(NoteError::Config {
                    message: format!("{} must not be empty", field),
                });
            }
            if value.starts_with('/') || value.split('/').any(|part| part == "..") {
                return Err(NoteError::Config {
                    message: format!("{} must be a relative path without '..': {}", field, value),
                });
            }
        }

        if self.main_document == crate::MANIFEST_ENTRY {
            return Err(NoteError::Config {
                message: format!("main_document cannot be named {}", crate::MANIFEST_ENTRY),
            });
        }

        Ok(())
    }
}

/// Application configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Web archive rendering settings
    pub archive: ArchiveConfig,

    /// Tags added to every note built by the CLI
    pub default_tags: Vec<String>,
}

impl Config {
    /// Loads configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let raw = fs::read_to_string(path).map_err(|e| NoteError::Config {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.archive.validate()?;
        Ok(config)
    }

    /// Resolves the configuration to use.
    ///
    /// An explicit path must exist. Without one, the platform config
    /// directory is consulted and defaults are used when nothing is there.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                info!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Location of the configuration file in the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "notekit", "notekit")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }
}
