//! Append-only record journal.
//!
//! Every create, replace and delete is appended to a JSONL (JSON Lines)
//! file as one event. Replaying the events in order yields the current
//! records.
//!
//! Every access goes through an advisory lock on a sidecar
//! `<journal>.lock` file: shared for reads, exclusive for appends and
//! compaction. The lock lives beside the journal because compaction
//! renames a new file over it.

use crate::types::{CycleData, CycleRecord, NoteEntry, SymptomEntry};
use crate::{Error, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Which collection a record belongs to
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Cycle,
    Symptom,
    Note,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Cycle => "cycle",
            RecordKind::Symptom => "symptom",
            RecordKind::Note => "note",
        }
    }
}

/// One journal event
///
/// A `put_*` event for an id that already exists replaces that record.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JournalEntry {
    PutCycle { record: CycleRecord },
    PutSymptom { record: SymptomEntry },
    PutNote { record: NoteEntry },
    Delete { kind: RecordKind, id: String },
}

impl JournalEntry {
    fn op_name(&self) -> &'static str {
        match self {
            JournalEntry::PutCycle { .. } => "put_cycle",
            JournalEntry::PutSymptom { .. } => "put_symptom",
            JournalEntry::PutNote { .. } => "put_note",
            JournalEntry::Delete { .. } => "delete",
        }
    }
}

/// Journal sink trait for persisting events
pub trait JournalSink {
    fn append(&mut self, entry: &JournalEntry) -> Result<()>;
}

/// Path of the lock file guarding `journal_path`
pub fn lock_path(journal_path: &Path) -> PathBuf {
    let mut name = journal_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    journal_path.with_file_name(name)
}

/// Held advisory lock on a journal; released on drop
///
/// flock locks belong to the open file, so a holder must not take the
/// lock again through a second guard.
struct JournalLock {
    file: File,
}

impl JournalLock {
    fn shared(journal_path: &Path) -> Result<Self> {
        let file = Self::open(journal_path)?;
        file.lock_shared()?;
        Ok(Self { file })
    }

    fn exclusive(journal_path: &Path) -> Result<Self> {
        let file = Self::open(journal_path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }

    fn open(journal_path: &Path) -> Result<File> {
        let path = lock_path(journal_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?)
    }
}

impl Drop for JournalLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!("Failed to release journal lock: {}", e);
        }
    }
}

/// JSONL-based journal with file locking
pub struct JsonlJournal {
    path: PathBuf,
}

impl JsonlJournal {
    /// Create a new JSONL journal for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All events, read under a shared lock
    pub fn read_entries(&self) -> Result<Vec<JournalEntry>> {
        read_entries(&self.path)
    }

    /// Append `entry` only if `check` accepts the current records
    ///
    /// The records are replayed and checked under the same exclusive lock
    /// that covers the append, so no other writer lands in between.
    pub fn append_if<F>(&mut self, entry: &JournalEntry, check: F) -> Result<()>
    where
        F: FnOnce(&CycleData) -> Result<()>,
    {
        let _lock = JournalLock::exclusive(&self.path)?;
        check(&replay(read_unlocked(&self.path)?))?;
        append_line(&self.path, entry)
    }

    /// Rewrite the journal as one `put_*` event per live record
    ///
    /// Returns the number of events dropped. Appends wait until the new
    /// journal is in place.
    pub fn compact(&mut self) -> Result<usize> {
        let _lock = JournalLock::exclusive(&self.path)?;

        let before = read_unlocked(&self.path)?;
        let after = entries_for(&replay(before.iter().cloned()));
        write_atomic(&self.path, &after)?;

        Ok(before.len().saturating_sub(after.len()))
    }

    /// Delete the journal file; returns false if there was none
    pub fn remove(&mut self) -> Result<bool> {
        let _lock = JournalLock::exclusive(&self.path)?;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl JournalSink for JsonlJournal {
    fn append(&mut self, entry: &JournalEntry) -> Result<()> {
        let _lock = JournalLock::exclusive(&self.path)?;
        append_line(&self.path, entry)
    }
}

/// Append one event line; the caller holds the exclusive lock
fn append_line(path: &Path, entry: &JournalEntry) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;

    let mut line = String::new();
    // A write cut short earlier leaves an unterminated line; close it off
    // so this event starts on a line of its own
    if ends_mid_line(&mut file)? {
        tracing::warn!("Journal {:?} ends with a partial line", path);
        line.push('\n');
    }
    line.push_str(&serde_json::to_string(entry)?);
    line.push('\n');

    file.write_all(line.as_bytes())?;
    file.flush()?;

    tracing::debug!("Appended {} event to journal", entry.op_name());
    Ok(())
}

fn ends_mid_line(file: &mut File) -> Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Read all events from a journal file
///
/// Lines that fail to parse (for example a write cut short by a crash)
/// are skipped with a warning.
pub fn read_entries(path: &Path) -> Result<Vec<JournalEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let _lock = JournalLock::shared(path)?;
    read_unlocked(path)
}

fn read_unlocked(path: &Path) -> Result<Vec<JournalEntry>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<JournalEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!("Skipping journal line {}: {}", line_num + 1, e);
            }
        }
    }

    tracing::debug!("Read {} events from journal", entries.len());
    Ok(entries)
}

/// Apply events in order to build the current records
pub fn replay(entries: impl IntoIterator<Item = JournalEntry>) -> CycleData {
    let mut data = CycleData::default();

    for entry in entries {
        match entry {
            JournalEntry::PutCycle { record } => upsert(&mut data.cycles, record, |c| &c.id),
            JournalEntry::PutSymptom { record } => upsert(&mut data.symptoms, record, |s| &s.id),
            JournalEntry::PutNote { record } => upsert(&mut data.notes, record, |n| &n.id),
            JournalEntry::Delete { kind, id } => match kind {
                RecordKind::Cycle => data.cycles.retain(|c| c.id != id),
                RecordKind::Symptom => data.symptoms.retain(|s| s.id != id),
                RecordKind::Note => data.notes.retain(|n| n.id != id),
            },
        }
    }

    data
}

fn upsert<T>(records: &mut Vec<T>, record: T, id: impl Fn(&T) -> &String) {
    match records.iter().position(|r| id(r) == id(&record)) {
        Some(i) => records[i] = record,
        None => records.push(record),
    }
}

/// Express a snapshot as one `put_*` event per record
pub fn entries_for(data: &CycleData) -> Vec<JournalEntry> {
    let cycles = data.cycles.iter().cloned().map(|record| JournalEntry::PutCycle { record });
    let symptoms = data
        .symptoms
        .iter()
        .cloned()
        .map(|record| JournalEntry::PutSymptom { record });
    let notes = data.notes.iter().cloned().map(|record| JournalEntry::PutNote { record });

    cycles.chain(symptoms).chain(notes).collect()
}

/// Atomically replace the journal with the given events
pub fn rewrite(path: &Path, entries: &[JournalEntry]) -> Result<()> {
    let _lock = JournalLock::exclusive(path)?;
    write_atomic(path, entries)
}

/// Write to a temp file in the same directory, sync it, then rename it
/// over the journal; the caller holds the exclusive lock
fn write_atomic(path: &Path, entries: &[JournalEntry]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::Other(format!("journal path {:?} has no parent", path)))?;
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        for entry in entries {
            serde_json::to_writer(&mut writer, entry)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::info!("Rewrote journal {:?} with {} events", path, entries.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Flow, Intensity};
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn create_test_cycle(start: &str) -> CycleRecord {
        CycleRecord::new(date(start), None, Flow::Medium, Some(28)).unwrap()
    }

    #[test]
    fn test_append_and_read_single_entry() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("records.jsonl");

        let cycle = create_test_cycle("2025-01-01");
        let mut journal = JsonlJournal::new(&path);
        journal
            .append(&JournalEntry::PutCycle {
                record: cycle.clone(),
            })
            .unwrap();

        let entries = read_entries(&path).unwrap();
        assert_eq!(entries, vec![JournalEntry::PutCycle { record: cycle }]);
    }

    #[test]
    fn test_read_missing_journal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let entries = read_entries(&temp_dir.path().join("nonexistent.jsonl")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("records.jsonl");

        let mut journal = JsonlJournal::new(&path);
        journal
            .append(&JournalEntry::PutCycle {
                record: create_test_cycle("2025-01-01"),
            })
            .unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{ not json").unwrap();
        write!(file, r#"{{"op":"put_cycle","record":{{"id":"x""#).unwrap();

        let entries = read_entries(&path).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_replay_applies_replace_and_delete() {
        let first = create_test_cycle("2025-01-01");
        let second = create_test_cycle("2025-01-29");
        let closed = first.with_end_date(date("2025-01-05")).unwrap();
        let symptom =
            SymptomEntry::new(date("2025-01-02"), vec!["cramps".into()], Intensity::Mild).unwrap();

        let data = replay(vec![
            JournalEntry::PutCycle {
                record: first.clone(),
            },
            JournalEntry::PutCycle {
                record: second.clone(),
            },
            JournalEntry::PutSymptom {
                record: symptom.clone(),
            },
            JournalEntry::PutCycle {
                record: closed.clone(),
            },
            JournalEntry::Delete {
                kind: RecordKind::Cycle,
                id: second.id.clone(),
            },
        ]);

        assert_eq!(data.cycles, vec![closed]);
        assert_eq!(data.symptoms, vec![symptom]);
        assert!(data.notes.is_empty());
    }

    #[test]
    fn test_rewrite_round_trips_through_replay() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("records.jsonl");

        let data = CycleData {
            cycles: vec![create_test_cycle("2025-01-01")],
            symptoms: vec![],
            notes: vec![NoteEntry::new(date("2025-01-02"), "tired").unwrap()],
        };
        rewrite(&path, &entries_for(&data)).unwrap();

        let replayed = replay(read_entries(&path).unwrap());
        assert_eq!(replayed, data);
    }

    #[test]
    fn test_event_wire_format() {
        let line = serde_json::to_string(&JournalEntry::Delete {
            kind: RecordKind::Note,
            id: "abc".into(),
        })
        .unwrap();
        assert_eq!(line, r#"{"op":"delete","kind":"note","id":"abc"}"#);
    }

    #[test]
    fn test_append_after_partial_line_keeps_new_event() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("records.jsonl");

        let mut journal = JsonlJournal::new(&path);
        journal
            .append(&JournalEntry::PutCycle {
                record: create_test_cycle("2025-01-01"),
            })
            .unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, r#"{{"op":"put_cycle","record":{{"id":"c2","startDa"#).unwrap();
        drop(file);

        let later = create_test_cycle("2025-01-29");
        journal
            .append(&JournalEntry::PutCycle {
                record: later.clone(),
            })
            .unwrap();

        let data = replay(read_entries(&path).unwrap());
        assert_eq!(data.cycles.len(), 2);
        assert!(data.cycles.contains(&later));
        assert!(std::fs::read_to_string(&path).unwrap().ends_with('\n'));
    }

    #[test]
    fn test_append_if_rejected_writes_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("records.jsonl");
        let mut journal = JsonlJournal::new(&path);
        let entry = JournalEntry::PutCycle {
            record: create_test_cycle("2025-01-01"),
        };

        journal.append_if(&entry, |data| {
            assert!(data.is_empty());
            Ok(())
        })
        .unwrap();

        let result = journal.append_if(&entry, |data| {
            assert_eq!(data.cycles.len(), 1);
            Err(Error::Validation("already there".into()))
        });
        assert!(result.is_err());
        assert_eq!(journal.read_entries().unwrap().len(), 1);
    }

    #[test]
    fn test_compact_does_not_lose_concurrent_appends() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("records.jsonl");

        let writers: Vec<_> = (0..4)
            .map(|w| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let mut journal = JsonlJournal::new(&path);
                    for i in 0..10 {
                        let start = date("2025-01-01") + chrono::Duration::days(w * 10 + i);
                        journal
                            .append(&JournalEntry::PutCycle {
                                record: CycleRecord::new(start, None, Flow::Medium, None).unwrap(),
                            })
                            .unwrap();
                    }
                })
            })
            .collect();

        let compactor = {
            let path = path.clone();
            std::thread::spawn(move || {
                let mut journal = JsonlJournal::new(&path);
                for _ in 0..10 {
                    journal.compact().unwrap();
                }
            })
        };

        for handle in writers {
            handle.join().unwrap();
        }
        compactor.join().unwrap();

        assert_eq!(replay(read_entries(&path).unwrap()).cycles.len(), 40);
    }

    #[test]
    fn test_lock_path_sits_beside_journal() {
        assert_eq!(
            lock_path(Path::new("/data/luna/records.jsonl")),
            PathBuf::from("/data/luna/records.jsonl.lock")
        );
    }
}
