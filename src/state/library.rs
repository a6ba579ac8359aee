use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::form::Submission;
use super::validate;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("could not determine the user data directory")]
    NoDataDir,
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{name} is not a readable image: {source}")]
    Image {
        name: String,
        #[source]
        source: image::ImageError,
    },
    #[error("attachment {0} does not belong to this content")]
    UnknownAttachment(String),
}

/// An attachment saved in the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAttachment {
    pub id: i64,
    pub content_id: String,
    /// Full path to the stored copy of the image
    pub path: String,
    /// Filename the user picked (e.g., "diagram.png")
    pub filename: String,
    pub uploaded_at: i64,
}

/// The Library manages the SQLite attachment catalog.
/// It stores one row per saved attachment and keeps the image files
/// in a media directory next to the database.
pub struct Library {
    conn: Connection,
    db_path: PathBuf,
    media_dir: PathBuf,
}

impl Library {
    /// Open the catalog in the user's data directory:
    /// - Linux: ~/.local/share/attachment-editor/catalog.db
    /// - macOS: ~/Library/Application Support/attachment-editor/catalog.db
    /// - Windows: %APPDATA%\attachment-editor\catalog.db
    pub fn new() -> Result<Self, LibraryError> {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or(LibraryError::NoDataDir)?;
        path.push("attachment-editor");
        path.push("catalog.db");
        Self::open(&path)
    }

    /// Open or create a catalog at `db_path`
    pub fn open(db_path: &Path) -> Result<Self, LibraryError> {
        let parent = db_path.parent().unwrap_or(Path::new("."));
        let media_dir = parent.join("media");
        fs::create_dir_all(&media_dir).map_err(|source| LibraryError::Io {
            path: media_dir.clone(),
            source,
        })?;

        let conn = Connection::open(db_path)?;
        info!("📁 Catalog initialized at: {}", db_path.display());

        let library = Library {
            conn,
            db_path: db_path.to_path_buf(),
            media_dir,
        };
        library.init_schema()?;
        Ok(library)
    }

    /// Create all tables and indexes if they don't exist.
    fn init_schema(&self) -> Result<(), LibraryError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS attachments (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                content_id      TEXT NOT NULL,
                path            TEXT NOT NULL,
                filename        TEXT NOT NULL,
                uploaded_at     INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_attachments_content_id
             ON attachments(content_id)",
            [],
        )?;
        Ok(())
    }

    /// Directory holding the stored image files
    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// All attachments of a content, oldest first
    pub fn attachments_for(&self, content_id: &str) -> Result<Vec<StoredAttachment>, LibraryError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, content_id, path, filename, uploaded_at
             FROM attachments WHERE content_id = ?1 ORDER BY id",
        )?;

        let rows = stmt.query_map([content_id], |row| {
            Ok(StoredAttachment {
                id: row.get(0)?,
                content_id: row.get(1)?,
                path: row.get(2)?,
                filename: row.get(3)?,
                uploaded_at: row.get(4)?,
            })
        })?;

        let mut attachments = Vec::new();
        for attachment in rows {
            attachments.push(attachment?);
        }
        Ok(attachments)
    }

    /// Write a submitted form back to the catalog.
    ///
    /// Surplus rows beyond the submitted slot count are deleted newest
    /// first. Slots carrying a file either replace the row named by their
    /// identifier or create a new one; slots without a file are left as
    /// they are.
    pub fn apply_submission(
        &mut self,
        content_id: &str,
        submission: &Submission,
    ) -> Result<Vec<StoredAttachment>, LibraryError> {
        let existing = self.attachments_for(content_id)?;
        let keep = existing.len().min(submission.management.total_forms);

        // Files that stop being referenced once the transaction commits
        let mut orphaned: Vec<String> = Vec::new();
        // Files written during this call, removed again on failure
        let mut written: Vec<PathBuf> = Vec::new();

        let result = self.write_submission(
            content_id,
            submission,
            &existing[keep..],
            &mut orphaned,
            &mut written,
        );

        if let Err(e) = result {
            for path in &written {
                let _ = fs::remove_file(path);
            }
            warn!(content_id, error = %e, "failed to save attachments");
            return Err(e);
        }

        for path in orphaned {
            let path = Path::new(&path);
            if path.starts_with(&self.media_dir) {
                if let Err(e) = fs::remove_file(path) {
                    warn!(path = %path.display(), error = %e, "failed to remove replaced attachment");
                }
            }
        }

        let saved = self.attachments_for(content_id)?;
        info!(content_id, count = saved.len(), "✅ attachments saved");
        Ok(saved)
    }

    /// Apply a submission inside one transaction
    fn write_submission(
        &mut self,
        content_id: &str,
        submission: &Submission,
        surplus: &[StoredAttachment],
        orphaned: &mut Vec<String>,
        written: &mut Vec<PathBuf>,
    ) -> Result<(), LibraryError> {
        let tx = self.conn.transaction()?;

        for attachment in surplus {
            tx.execute("DELETE FROM attachments WHERE id = ?1", [attachment.id])?;
            orphaned.push(attachment.path.clone());
        }

        let now = Utc::now().timestamp();
        for slot in &submission.slots {
            let Some(file) = &slot.file else {
                continue;
            };

            image::load_from_memory(&file.bytes).map_err(|source| LibraryError::Image {
                name: file.name.clone(),
                source,
            })?;

            let stored = self.media_dir.join(format!(
                "{}.{}",
                Uuid::new_v4(),
                validate::extension(&file.name)
            ));
            fs::write(&stored, &file.bytes).map_err(|source| LibraryError::Io {
                path: stored.clone(),
                source,
            })?;
            written.push(stored.clone());
            let stored = stored.to_string_lossy().to_string();

            match &slot.identifier {
                Some(identifier) => {
                    let id: i64 = identifier
                        .parse()
                        .map_err(|_| LibraryError::UnknownAttachment(identifier.clone()))?;
                    let old_path: Option<String> = tx
                        .query_row(
                            "SELECT path FROM attachments WHERE id = ?1 AND content_id = ?2",
                            params![id, content_id],
                            |row| row.get(0),
                        )
                        .optional()?;
                    let Some(old_path) = old_path else {
                        return Err(LibraryError::UnknownAttachment(identifier.clone()));
                    };
                    tx.execute(
                        "UPDATE attachments SET path = ?1, filename = ?2, uploaded_at = ?3 WHERE id = ?4",
                        params![stored, file.name, now, id],
                    )?;
                    orphaned.push(old_path);
                }
                None => {
                    tx.execute(
                        "INSERT INTO attachments (content_id, path, filename, uploaded_at)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![content_id, stored, file.name, now],
                    )?;
                }
            }
        }

        tx.commit()?;
        Ok(())
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .field("media_dir", &self.media_dir)
            .finish()
    }
}
