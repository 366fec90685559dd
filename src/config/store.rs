//! Loading and persisting the worker configuration file

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use super::document::ConfigDocument;
use super::error::ConfigError;
use crate::constants::config::{APP_DIR, DEFAULT_FILENAME, FILENAME, INDENT, TEMP_SUFFIX};

/// Template shipped with the manager, written out by `init`
pub const BUNDLED_TEMPLATE: &str = include_str!("../../assets/default_volume_config.json");

/// Locations of the live configuration and its read-only template
#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
    default_path: PathBuf,
}

impl ConfigStore {
    pub fn new(config_path: impl Into<PathBuf>, default_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            default_path: default_path.into(),
        }
    }

    /// `<config dir>/wiz-visualizer`
    pub fn default_dir() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        path
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_dir().join(FILENAME)
    }

    pub fn default_template_path() -> PathBuf {
        Self::default_dir().join(DEFAULT_FILENAME)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn default_path(&self) -> &Path {
        &self.default_path
    }

    /// Read and validate a document. Nothing is returned unless the whole file
    /// parsed and validated.
    pub fn load(path: &Path) -> Result<ConfigDocument, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;
        let root: serde_json::Value =
            serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let doc = ConfigDocument::from_json(root)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(doc)
    }

    /// Write the document to a sibling temp file, then rename it over `path`
    pub fn save(path: &Path, doc: &ConfigDocument) -> Result<(), ConfigError> {
        let bytes = to_pretty_json(doc)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ConfigError::write(parent, e))?;
        }

        let tmp = temp_path(path);
        let written = fs::File::create(&tmp).and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(ConfigError::write(&tmp, e));
        }

        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(ConfigError::write(path, e));
        }

        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    pub fn load_config(&self) -> Result<ConfigDocument, ConfigError> {
        Self::load(&self.config_path)
    }

    pub fn save_config(&self, doc: &ConfigDocument) -> Result<(), ConfigError> {
        Self::save(&self.config_path, doc)
    }

    /// Reload the template. Callers re-merge live state such as discovered lights.
    pub fn reset_to_default(&self) -> Result<ConfigDocument, ConfigError> {
        info!(path = %self.default_path.display(), "Resetting configuration to template");
        Self::load(&self.default_path)
    }

    /// Create the live config from the template when it does not exist yet.
    ///
    /// The template itself must exist. Returns true when a copy was made.
    pub fn ensure_config(&self) -> Result<bool, ConfigError> {
        if !self.default_path.exists() {
            error!(path = %self.default_path.display(), "Default configuration file is missing");
            return Err(ConfigError::NotFound {
                path: self.default_path.clone(),
            });
        }
        if self.config_path.exists() {
            return Ok(false);
        }

        warn!(path = %self.config_path.display(), "Creating configuration file from default");
        let template = Self::load(&self.default_path)?;
        Self::save(&self.config_path, &template)?;
        Ok(true)
    }

    /// Write the bundled template to `path` unless a file is already there
    pub fn write_bundled_template(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }
        let root: serde_json::Value =
            serde_json::from_str(BUNDLED_TEMPLATE).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let doc = ConfigDocument::from_json(root)?;
        Self::save(path, &doc)?;
        Ok(true)
    }
}

fn to_pretty_json(doc: &ConfigDocument) -> Result<Vec<u8>, ConfigError> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
    doc.to_json()?
        .serialize(&mut ser)
        .map_err(|e| ConfigError::validation("document", e.to_string()))?;
    buf.push(b'\n');
    Ok(buf)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}
