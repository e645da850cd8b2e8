//! User preference persistence.
//!
//! Preferences live in a small JSON document next to the journal. A
//! missing or corrupt file never blocks the tracker; defaults are used.

use crate::state::{load_json_or_default, save_json};
use crate::{Result, UserPreferences};
use chrono::Utc;
use std::path::Path;

impl UserPreferences {
    /// Load preferences, falling back to defaults if absent or unreadable
    pub fn load(path: &Path) -> Self {
        load_json_or_default(path)
    }

    /// Save preferences atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        save_json(path, self)
    }

    /// Load preferences, modify them, stamp `updated_at` and save
    pub fn update<F>(path: &Path, f: F) -> Result<Self>
    where
        F: FnOnce(&mut UserPreferences) -> Result<()>,
    {
        let mut prefs = Self::load(path);
        f(&mut prefs)?;
        prefs.updated_at = Some(Utc::now());
        prefs.save(path)?;
        tracing::info!("Updated preferences at {:?}", path);
        Ok(prefs)
    }
}
