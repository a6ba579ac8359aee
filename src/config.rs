/// Form configuration
///
/// Stored as JSON in the user's config directory:
/// - Linux: ~/.config/attachment-editor/config.json
/// - macOS: ~/Library/Application Support/attachment-editor/config.json
/// - Windows: %APPDATA%\attachment-editor\config.json
///
/// A missing file means defaults; a malformed one is an error.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::validate::{ValidationMode, Validator};

/// Max attachments per content
pub const MAX_ATTACHMENTS: usize = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FormConfig {
    /// Upper bound on the number of attachment slots
    pub max_attachments: usize,
    /// Extensions accepted when validation checks extensions
    pub allowed_extensions: Vec<String>,
    pub validation: ValidationMode,
    /// Let one add restore a second stacked identifier into the
    /// previous slot when that slot has none
    pub redistribute_restored_identifiers: bool,
    /// Catalog key of the content being edited
    pub content_id: String,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            max_attachments: MAX_ATTACHMENTS,
            allowed_extensions: vec!["png".into(), "jpeg".into(), "jpg".into()],
            validation: ValidationMode::ContentTypeAndExtension,
            redistribute_restored_identifiers: true,
            content_id: "draft".into(),
        }
    }
}

impl FormConfig {
    /// Load the config from the user's config directory
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load the config from `path`, falling back to defaults if it is missing
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Validation rules described by this config
    pub fn validator(&self) -> Validator {
        Validator::new(self.validation, self.allowed_extensions.clone())
    }

    fn config_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("attachment-editor");
        path.push("config.json");
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = FormConfig::default();
        assert_eq!(config.max_attachments, 20);
        assert_eq!(config.allowed_extensions, vec!["png", "jpeg", "jpg"]);
        assert_eq!(config.validation, ValidationMode::ContentTypeAndExtension);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = FormConfig::from_json(r#"{"max_attachments": 3, "validation": "content_type"}"#).unwrap();
        assert_eq!(config.max_attachments, 3);
        assert_eq!(config.validation, ValidationMode::ContentType);
        assert_eq!(config.content_id, "draft");
    }

    #[test]
    fn test_serialization() {
        let mut config = FormConfig::default();
        config.content_id = "lecture-7".into();
        let restored = FormConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = FormConfig::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, FormConfig::default());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(FormConfig::load_from(&path), Err(ConfigError::Parse { .. })));
    }
}
