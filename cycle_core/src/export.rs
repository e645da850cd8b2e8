//! Data export and import.
//!
//! Two formats are supported:
//! - JSON: every record plus preferences, in the document layout older
//!   exports use, so those files can be imported back
//! - CSV: cycles only, one row per cycle, for spreadsheets

use crate::cache::SnapshotCache;
use crate::store::{JournalStore, RecordStore};
use crate::types::{CycleData, CycleRecord, Flow, NoteEntry, SymptomEntry, UserPreferences};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Version string stamped into exports
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Output format for `luna export`
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(Error::Validation(format!("unknown export format '{}'", other))),
        }
    }
}

/// `cycle-data-YYYY-MM-DD.<ext>`
pub fn default_export_file_name(date: NaiveDate, format: ExportFormat) -> String {
    format!("cycle-data-{}.{}", date.format("%Y-%m-%d"), format.extension())
}

// ============================================================================
// JSON
// ============================================================================

/// Full export document
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    #[serde(default)]
    pub cycles: Vec<CycleRecord>,
    #[serde(default)]
    pub symptoms: Vec<SymptomEntry>,
    #[serde(default)]
    pub notes: Vec<NoteEntry>,
    #[serde(default)]
    pub preferences: Option<UserPreferences>,
    #[serde(default = "Utc::now")]
    pub export_date: DateTime<Utc>,
    #[serde(default)]
    pub app_version: String,
}

impl ExportDocument {
    pub fn new(data: CycleData, preferences: Option<UserPreferences>) -> Self {
        Self {
            cycles: data.cycles,
            symptoms: data.symptoms,
            notes: data.notes,
            preferences,
            export_date: Utc::now(),
            app_version: APP_VERSION.to_string(),
        }
    }
}

/// Write a pretty-printed JSON export
pub fn export_json(path: &Path, document: &ExportDocument) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = serde_json::to_string_pretty(document)?;
    std::fs::write(path, contents)?;

    tracing::info!(
        "Exported {} cycles, {} symptom entries, {} notes to {:?}",
        document.cycles.len(),
        document.symptoms.len(),
        document.notes.len(),
        path
    );
    Ok(())
}

/// Read a JSON export document
pub fn read_export(path: &Path) -> Result<ExportDocument> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Counts of records added by an import
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub cycles: usize,
    pub symptoms: usize,
    pub notes: usize,
    /// Records whose id was already present
    pub skipped: usize,
    /// Records that failed validation
    pub invalid: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.cycles + self.symptoms + self.notes
    }
}

/// Add every valid record of `document` the store doesn't already have
///
/// Records are matched by id, so importing the same file twice adds
/// nothing the second time. Records failing the same checks as freshly
/// logged ones are skipped with a warning and counted as invalid.
/// Preferences are not touched.
pub fn import_document(
    store: &mut dyn RecordStore,
    document: ExportDocument,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for cycle in document.cycles {
        match cycle.validate() {
            Ok(()) => {
                let added = store.add_cycle(cycle).map(drop);
                tally(added, &mut summary.cycles, &mut summary.skipped)?;
            }
            Err(e) => {
                tracing::warn!("Skipping invalid cycle {:?}: {}", cycle.id, e);
                summary.invalid += 1;
            }
        }
    }

    for entry in document.symptoms {
        match entry.validate() {
            Ok(()) => {
                let added = store.add_symptom(entry).map(drop);
                tally(added, &mut summary.symptoms, &mut summary.skipped)?;
            }
            Err(e) => {
                tracing::warn!("Skipping invalid symptom entry {:?}: {}", entry.id, e);
                summary.invalid += 1;
            }
        }
    }

    for note in document.notes {
        match note.validate() {
            Ok(()) => {
                let added = store.add_note(note).map(drop);
                tally(added, &mut summary.notes, &mut summary.skipped)?;
            }
            Err(e) => {
                tracing::warn!("Skipping invalid note {:?}: {}", note.id, e);
                summary.invalid += 1;
            }
        }
    }

    tracing::info!(
        "Imported {} records ({} skipped, {} invalid)",
        summary.total(),
        summary.skipped,
        summary.invalid
    );
    Ok(summary)
}

/// Count an add; an id the store already holds counts as skipped
fn tally(added: Result<()>, count: &mut usize, skipped: &mut usize) -> Result<()> {
    match added {
        Ok(()) => *count += 1,
        Err(Error::AlreadyExists { .. }) => *skipped += 1,
        Err(e) => return Err(e),
    }
    Ok(())
}

/// Import a `.json` export or a `.csv` cycle table
pub fn import_file(store: &mut dyn RecordStore, path: &Path) -> Result<ImportSummary> {
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    let document = if is_csv {
        ExportDocument::new(
            CycleData {
                cycles: read_cycles_csv(path)?,
                ..CycleData::default()
            },
            None,
        )
    } else {
        read_export(path)?
    };

    import_document(store, document)
}

/// Remove every logged record and the local snapshot mirror
///
/// Preferences and configuration are kept.
pub fn clear_all(store: &mut JournalStore, cache: &SnapshotCache) -> Result<()> {
    store.clear()?;
    cache.clear()?;
    tracing::info!("Cleared all records");
    Ok(())
}

// ============================================================================
// CSV
// ============================================================================

/// A row in the cycle CSV
#[derive(Debug, Serialize, Deserialize)]
pub struct CycleCsvRow {
    pub id: String,
    pub start_date: String,
    pub end_date: Option<String>,
    pub flow: String,
    pub length: Option<u32>,
    pub created_at: String,
}

impl From<&CycleRecord> for CycleCsvRow {
    fn from(cycle: &CycleRecord) -> Self {
        CycleCsvRow {
            id: cycle.id.clone(),
            start_date: cycle.start_date.to_string(),
            end_date: cycle.end_date.map(|d| d.to_string()),
            flow: cycle.flow.to_string(),
            length: cycle.length,
            created_at: cycle.created_at.to_rfc3339(),
        }
    }
}

impl TryFrom<CycleCsvRow> for CycleRecord {
    type Error = Error;

    fn try_from(row: CycleCsvRow) -> Result<Self> {
        let parse_date = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|e| Error::Validation(format!("Invalid date '{}': {}", s, e)))
        };

        let start_date = parse_date(&row.start_date)?;
        let end_date = match row.end_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(parse_date(s)?),
        };
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let cycle = CycleRecord {
            id: row.id,
            start_date,
            end_date,
            flow: row.flow.parse::<Flow>()?,
            length: row.length.filter(|&l| l > 0),
            created_at,
        };
        cycle.validate()?;
        Ok(cycle)
    }
}

/// Write cycles to a CSV file with headers, replacing any existing file
///
/// Returns the number of rows written.
pub fn export_cycles_csv(path: &Path, cycles: &[CycleRecord]) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for cycle in cycles {
        writer.serialize(CycleCsvRow::from(cycle))?;
    }
    if cycles.is_empty() {
        // serialize() emits headers lazily; write them for an empty table
        writer.write_record([
            "id",
            "start_date",
            "end_date",
            "flow",
            "length",
            "created_at",
        ])?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Wrote {} cycles to CSV {:?}", cycles.len(), path);
    Ok(cycles.len())
}

/// Read cycles from a CSV file written by `export_cycles_csv`
///
/// Rows that fail to parse are skipped with a warning.
pub fn read_cycles_csv(path: &Path) -> Result<Vec<CycleRecord>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut cycles = Vec::new();
    for result in reader.deserialize::<CycleCsvRow>() {
        match result {
            Ok(row) => match CycleRecord::try_from(row) {
                Ok(cycle) => cycles.push(cycle),
                Err(e) => {
                    tracing::warn!("Failed to parse CSV row: {}", e);
                }
            },
            Err(e) => {
                tracing::warn!("Failed to deserialize CSV row: {}", e);
            }
        }
    }

    tracing::debug!("Loaded {} cycles from CSV", cycles.len());
    Ok(cycles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Intensity;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn sample_data() -> CycleData {
        CycleData {
            cycles: vec![
                CycleRecord::new(date("2024-12-15"), Some(date("2024-12-19")), Flow::Medium, Some(28))
                    .unwrap(),
                CycleRecord::new(date("2024-11-17"), None, Flow::Heavy, None).unwrap(),
            ],
            symptoms: vec![SymptomEntry::new(
                date("2024-12-14"),
                vec!["cramps".into(), "mood_swings".into()],
                Intensity::Moderate,
            )
            .unwrap()],
            notes: vec![NoteEntry::new(date("2024-12-15"), "First day").unwrap()],
        }
    }

    #[test]
    fn test_default_file_name() {
        assert_eq!(
            default_export_file_name(date("2025-03-09"), ExportFormat::Json),
            "cycle-data-2025-03-09.json"
        );
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
    }

    #[test]
    fn test_json_export_then_import_into_empty_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("export.json");

        let document = ExportDocument::new(sample_data(), Some(UserPreferences::default()));
        export_json(&path, &document).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"exportDate\""));
        assert!(raw.contains("\"appVersion\""));

        let mut store = JournalStore::in_dir(&temp_dir.path().join("data"));
        let summary = import_file(&mut store, &path).unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                cycles: 2,
                symptoms: 1,
                notes: 1,
                skipped: 0,
                invalid: 0
            }
        );

        // Second import adds nothing
        let again = import_file(&mut store, &path).unwrap();
        assert_eq!(again.total(), 0);
        assert_eq!(again.skipped, 4);
    }

    #[test]
    fn test_import_minimal_document() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("old.json");
        std::fs::write(
            &path,
            r#"{"cycles":[{"id":"1","startDate":"2024-12-15","endDate":"2024-12-19","length":28,"flow":"medium","createdAt":"2024-12-15T00:00:00Z"}]}"#,
        )
        .unwrap();

        let mut store = JournalStore::in_dir(temp_dir.path());
        let summary = import_file(&mut store, &path).unwrap();
        assert_eq!(summary.cycles, 1);
        assert_eq!(store.snapshot().unwrap().cycles[0].id, "1");
    }

    #[test]
    fn test_csv_export_and_read_back() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("cycles.csv");
        let data = sample_data();

        let count = export_cycles_csv(&path, &data.cycles).unwrap();
        assert_eq!(count, 2);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("id,start_date,end_date,flow,length,created_at"));

        let cycles = read_cycles_csv(&path).unwrap();
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].id, data.cycles[0].id);
        assert_eq!(cycles[0].end_date, Some(date("2024-12-19")));
        assert_eq!(cycles[1].end_date, None);
        assert_eq!(cycles[1].flow, Flow::Heavy);
    }

    #[test]
    fn test_csv_empty_table_has_headers() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("cycles.csv");

        export_cycles_csv(&path, &[]).unwrap();
        assert!(read_cycles_csv(&path).unwrap().is_empty());
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("id,"));
    }

    #[test]
    fn test_csv_bad_rows_are_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("cycles.csv");
        std::fs::write(
            &path,
            "id,start_date,end_date,flow,length,created_at\n\
             a,2025-01-01,,light,28,2025-01-01T00:00:00Z\n\
             b,not-a-date,,light,28,2025-01-01T00:00:00Z\n\
             c,2025-02-05,2025-02-01,light,28,2025-01-01T00:00:00Z\n\
             d,2025-03-01,,purple,28,2025-01-01T00:00:00Z\n",
        )
        .unwrap();

        let cycles = read_cycles_csv(&path).unwrap();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].id, "a");
    }

    #[test]
    fn test_clear_all_keeps_preferences() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JournalStore::in_dir(temp_dir.path());
        let cache = SnapshotCache::in_dir(temp_dir.path());
        let prefs_path = temp_dir.path().join("preferences.json");

        for cycle in sample_data().cycles {
            store.add_cycle(cycle).unwrap();
        }
        cache.save(&store.snapshot().unwrap()).unwrap();
        UserPreferences::default().save(&prefs_path).unwrap();

        clear_all(&mut store, &cache).unwrap();

        assert!(store.snapshot().unwrap().is_empty());
        assert_eq!(cache.load().unwrap(), None);
        assert!(prefs_path.exists());

        // Clearing an empty data dir is fine
        clear_all(&mut store, &cache).unwrap();
    }

    #[test]
    fn test_import_skips_invalid_records() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{
                "cycles": [
                    {"id":"backwards","startDate":"2025-01-10","endDate":"2025-01-01","flow":"medium"},
                    {"id":"zero","startDate":"2025-02-10","length":0,"flow":"medium"},
                    {"id":"huge","startDate":"2025-03-10","length":4000000000,"flow":"medium"},
                    {"id":"good","startDate":"2025-04-10","length":29,"flow":"light"}
                ],
                "symptoms": [{"id":"s1","date":"2025-01-02","symptoms":[],"intensity":"mild"}],
                "notes": [{"id":"n1","date":"2025-01-02","content":""}]
            }"#,
        )
        .unwrap();

        let mut store = JournalStore::in_dir(temp_dir.path());
        let summary = import_file(&mut store, &path).unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                cycles: 1,
                symptoms: 0,
                notes: 0,
                skipped: 0,
                invalid: 5
            }
        );
        let data = store.snapshot().unwrap();
        assert_eq!(data.cycles.len(), 1);
        assert_eq!(data.cycles[0].id, "good");
        assert!(data.symptoms.is_empty() && data.notes.is_empty());
    }
}
