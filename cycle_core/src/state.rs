//! JSON document persistence with file locking.
//!
//! Used for small whole-file documents (preferences, the snapshot cache)
//! that are read and rewritten as a unit.

use crate::{Error, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Load a JSON document under a shared lock
///
/// Returns `Ok(None)` if the file doesn't exist. Read and parse failures
/// are errors; callers decide whether to fall back.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let mut contents = String::new();
    let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
    file.unlock()?;
    read?;

    let value = serde_json::from_str(&contents)?;
    tracing::debug!("Loaded {:?}", path);
    Ok(Some(value))
}

/// Load a JSON document, using the default on any failure
///
/// A missing file is silent; an unreadable or corrupt one logs a warning.
pub fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match load_json(path) {
        Ok(Some(value)) => value,
        Ok(None) => {
            tracing::info!("No file at {:?}, using defaults", path);
            T::default()
        }
        Err(e) => {
            tracing::warn!("Failed to load {:?}: {}. Using defaults.", path, e);
            T::default()
        }
    }
}

/// Save a JSON document atomically
///
/// 1. Write to a temp file in the same directory
/// 2. Sync it to disk
/// 3. Rename it over the original
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::Other(format!("path {:?} has no parent", path)))?;
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;

    // Serialize concurrent writers on the temp file
    temp.as_file().lock_exclusive()?;

    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        let contents = serde_json::to_string_pretty(value)?;
        writer.write_all(contents.as_bytes())?;
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.as_file().unlock()?;

    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::debug!("Saved {:?}", path);
    Ok(())
}
