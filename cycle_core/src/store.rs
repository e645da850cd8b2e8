//! Record storage.
//!
//! `RecordStore` is the interface the rest of the application uses to
//! create, replace and delete records and to take snapshots. The engine
//! itself never touches a store; it only reads the snapshots.

use crate::journal::{self, JournalEntry, JsonlJournal, RecordKind};
use crate::types::{CycleData, CycleRecord, NoteEntry, SymptomEntry};
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Storage for logged records
pub trait RecordStore {
    /// Consistent view of all records, newest-created first
    fn snapshot(&self) -> Result<CycleData>;

    fn add_cycle(&mut self, cycle: CycleRecord) -> Result<CycleRecord>;

    /// Replace the cycle with the same id
    fn replace_cycle(&mut self, cycle: CycleRecord) -> Result<CycleRecord>;

    fn delete_cycle(&mut self, id: &str) -> Result<()>;

    fn add_symptom(&mut self, entry: SymptomEntry) -> Result<SymptomEntry>;

    fn delete_symptom(&mut self, id: &str) -> Result<()>;

    fn add_note(&mut self, note: NoteEntry) -> Result<NoteEntry>;

    fn delete_note(&mut self, id: &str) -> Result<()>;
}

/// Store backed by an append-only JSONL journal
///
/// Existence checks run under the journal's write lock, so two processes
/// adding the same id can't both succeed.
pub struct JournalStore {
    journal: JsonlJournal,
}

impl JournalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            journal: JsonlJournal::new(path),
        }
    }

    /// Store at `<data_dir>/records.jsonl`
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("records.jsonl"))
    }

    pub fn path(&self) -> &Path {
        self.journal.path()
    }

    /// Rewrite the journal as one event per live record
    ///
    /// Returns the number of events dropped.
    pub fn compact(&mut self) -> Result<usize> {
        let dropped = self.journal.compact()?;
        tracing::info!("Compacted journal, dropped {} events", dropped);
        Ok(dropped)
    }

    /// Remove the journal file and every record in it
    pub fn clear(&mut self) -> Result<()> {
        if self.journal.remove()? {
            tracing::info!("Removed journal {:?}", self.path());
        }
        Ok(())
    }

    fn put_new(&mut self, kind: RecordKind, id: &str, entry: JournalEntry) -> Result<()> {
        self.journal.append_if(&entry, |data| {
            if contains(data, kind, id) {
                return Err(Error::AlreadyExists {
                    kind: kind.as_str(),
                    id: id.to_string(),
                });
            }
            Ok(())
        })
    }

    fn put_existing(&mut self, kind: RecordKind, id: &str, entry: JournalEntry) -> Result<()> {
        self.journal.append_if(&entry, |data| {
            if !contains(data, kind, id) {
                return Err(Error::NotFound {
                    kind: kind.as_str(),
                    id: id.to_string(),
                });
            }
            Ok(())
        })
    }

    fn delete(&mut self, kind: RecordKind, id: &str) -> Result<()> {
        let entry = JournalEntry::Delete {
            kind,
            id: id.to_string(),
        };
        self.put_existing(kind, id, entry)?;
        tracing::info!("Deleted {} {}", kind.as_str(), id);
        Ok(())
    }
}

fn contains(data: &CycleData, kind: RecordKind, id: &str) -> bool {
    match kind {
        RecordKind::Cycle => data.cycles.iter().any(|c| c.id == id),
        RecordKind::Symptom => data.symptoms.iter().any(|s| s.id == id),
        RecordKind::Note => data.notes.iter().any(|n| n.id == id),
    }
}

impl RecordStore for JournalStore {
    fn snapshot(&self) -> Result<CycleData> {
        let mut data = journal::replay(self.journal.read_entries()?);

        data.cycles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        data.symptoms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        data.notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        tracing::debug!(
            "Snapshot: {} cycles, {} symptom entries, {} notes",
            data.cycles.len(),
            data.symptoms.len(),
            data.notes.len()
        );
        Ok(data)
    }

    fn add_cycle(&mut self, cycle: CycleRecord) -> Result<CycleRecord> {
        let entry = JournalEntry::PutCycle {
            record: cycle.clone(),
        };
        self.put_new(RecordKind::Cycle, &cycle.id, entry)?;
        tracing::info!("Created cycle with ID: {}", cycle.id);
        Ok(cycle)
    }

    fn replace_cycle(&mut self, cycle: CycleRecord) -> Result<CycleRecord> {
        let entry = JournalEntry::PutCycle {
            record: cycle.clone(),
        };
        self.put_existing(RecordKind::Cycle, &cycle.id, entry)?;
        tracing::info!("Replaced cycle with ID: {}", cycle.id);
        Ok(cycle)
    }

    fn delete_cycle(&mut self, id: &str) -> Result<()> {
        self.delete(RecordKind::Cycle, id)
    }

    fn add_symptom(&mut self, entry: SymptomEntry) -> Result<SymptomEntry> {
        let event = JournalEntry::PutSymptom {
            record: entry.clone(),
        };
        self.put_new(RecordKind::Symptom, &entry.id, event)?;
        tracing::info!("Created symptom entry with ID: {}", entry.id);
        Ok(entry)
    }

    fn delete_symptom(&mut self, id: &str) -> Result<()> {
        self.delete(RecordKind::Symptom, id)
    }

    fn add_note(&mut self, note: NoteEntry) -> Result<NoteEntry> {
        let entry = JournalEntry::PutNote {
            record: note.clone(),
        };
        self.put_new(RecordKind::Note, &note.id, entry)?;
        tracing::info!("Created note with ID: {}", note.id);
        Ok(note)
    }

    fn delete_note(&mut self, id: &str) -> Result<()> {
        self.delete(RecordKind::Note, id)
    }
}
