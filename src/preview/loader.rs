/// Picked-file loader
///
/// Reads a file chosen in the file dialog and sniffs its content type.
/// Runs on the blocking pool so large images don't stall the UI.

use std::path::{Path, PathBuf};
use tokio::task;

use crate::state::data::LocalFile;

/// Load a picked file for slot `index`
///
/// # Returns
/// * `Ok((index, file))` - The slot index and the loaded file
/// * `Err(String)` - Error message if reading fails
pub async fn load_local_file(index: usize, path: PathBuf) -> Result<(usize, LocalFile), String> {
    task::spawn_blocking(move || load_local_file_blocking(&path).map(|file| (index, file)))
        .await
        .map_err(|e| format!("Task join error: {}", e))?
}

/// Blocking implementation of file loading
fn load_local_file_blocking(path: &Path) -> Result<LocalFile, String> {
    if !path.is_file() {
        return Err(format!("File not found: {}", path.display()));
    }

    let bytes = std::fs::read(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut file = LocalFile::from_bytes(name, bytes);
    file.path = Some(path.to_path_buf());
    Ok(file)
}
