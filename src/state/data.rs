/// Shared data structures for the attachment form
///
/// These structs represent the data model that flows between
/// the slot bookkeeping, the reference registry and the UI layer.

use std::fmt;
use std::path::PathBuf;

/// A file the user picked for a slot, already read into memory
#[derive(Debug, Clone, PartialEq)]
pub struct LocalFile {
    /// Filename only (e.g., "diagram.png")
    pub name: String,
    /// MIME type sniffed from the content (e.g., "image/png")
    pub content_type: String,
    /// Where the file lives on disk, if it came from the file picker
    pub path: Option<PathBuf>,
    /// Raw file content
    pub bytes: Vec<u8>,
}

impl LocalFile {
    /// Build a file from its name and bytes, sniffing the content type
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let content_type = super::validate::sniff_content_type(&bytes);
        Self {
            name: name.into(),
            content_type,
            path: None,
            bytes,
        }
    }
}

/// One attachment upload unit
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    /// Zero-based position, dense over `[0, count)`
    pub index: usize,
    /// Field prefix rendered from the form template (e.g., "form-3")
    pub prefix: String,
    /// Database record identifier carried by the hidden id field
    pub identifier: Option<String>,
    /// File chosen for this slot during the session
    pub file: Option<LocalFile>,
}

/// A temporary, revocable handle standing in for file content
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(pub String);

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the registry holds for a slot index
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// Created by a `ReferenceStore` during this session; must be revoked
    Temporary(ObjectUrl),
    /// Points at an attachment that was already saved; never revoked
    Persisted(ObjectUrl),
}

impl Reference {
    pub fn url(&self) -> &ObjectUrl {
        match self {
            Reference::Temporary(url) | Reference::Persisted(url) => url,
        }
    }
}

/// Outcome of a file selection, surfaced on the status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// A valid image is now bound to the slot
    Valid,
    /// A file was chosen but rejected by validation
    Invalid,
    /// The slot's file was cleared
    Cleared,
}

/// The placeholder token the editor embeds for an attachment
pub fn placeholder_token(index: usize) -> String {
    format!("Image-{}", index)
}

/// The markdown image that embeds the attachment at `index`
pub fn placeholder_markdown(index: usize) -> String {
    format!("![]({})", placeholder_token(index))
}
