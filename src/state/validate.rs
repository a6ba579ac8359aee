/// File validation for attachment slots
///
/// A selection is accepted when a file is present, its content type
/// is an `image/*` type and (in the stricter mode) its extension is
/// on the allow-list.

use serde::{Deserialize, Serialize};

use super::data::LocalFile;

/// MIME type used when the content cannot be recognised
const UNKNOWN_CONTENT_TYPE: &str = "application/octet-stream";

/// How strictly a selected file is checked
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Only the major part of the content type must be `image`
    ContentType,
    /// Content type and filename extension must both match
    #[default]
    ContentTypeAndExtension,
}

/// Validation rules for a form
#[derive(Debug, Clone, PartialEq)]
pub struct Validator {
    pub mode: ValidationMode,
    pub allowed_extensions: Vec<String>,
}

impl Validator {
    pub fn new(mode: ValidationMode, allowed_extensions: Vec<String>) -> Self {
        Self { mode, allowed_extensions }
    }

    /// Check whether a selection may be bound to a slot
    pub fn is_valid(&self, file: Option<&LocalFile>) -> bool {
        let Some(file) = file else {
            return false;
        };

        if major_type(&file.content_type) != "image" {
            return false;
        }

        match self.mode {
            ValidationMode::ContentType => true,
            ValidationMode::ContentTypeAndExtension => {
                let ext = extension(&file.name);
                self.allowed_extensions.iter().any(|allowed| allowed == ext)
            }
        }
    }
}

/// Sniff the MIME type of a file from its leading bytes
pub fn sniff_content_type(bytes: &[u8]) -> String {
    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type().to_string(),
        Err(_) => UNKNOWN_CONTENT_TYPE.to_string(),
    }
}

/// Text after the last `.` of a filename, or the whole name when
/// there is nothing after it
pub fn extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(pos) if pos + 1 < filename.len() => &filename[pos + 1..],
        _ => filename,
    }
}

fn major_type(content_type: &str) -> &str {
    content_type.split('/').next().unwrap_or_default()
}
