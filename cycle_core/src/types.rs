//! Core domain types for the Luna cycle tracker.
//!
//! This module defines the records the user logs and the snapshot the
//! engine reads:
//! - Cycles (period start/end, flow, length)
//! - Symptom entries and daily notes
//! - User preferences
//!
//! Records are immutable once created. Updating a record means building a
//! new value with the same id and handing it to the store.

use crate::{Error, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Cycle length assumed when a record carries none
pub const DEFAULT_CYCLE_LENGTH: u32 = 28;

/// Longest cycle length a record may carry
pub const MAX_CYCLE_LENGTH: u32 = 365;

/// Days after the start date an open-ended period is assumed to last
pub const ESTIMATED_PERIOD_DAYS: i64 = 5;

// ============================================================================
// Enumerations
// ============================================================================

/// Subjective bleeding intensity
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    Light,
    #[default]
    Medium,
    Heavy,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::Light => "light",
            Flow::Medium => "medium",
            Flow::Heavy => "heavy",
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flow {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Flow::Light),
            "medium" => Ok(Flow::Medium),
            "heavy" => Ok(Flow::Heavy),
            other => Err(Error::Validation(format!("unknown flow '{}'", other))),
        }
    }
}

/// Severity of the symptoms logged on a day
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    #[default]
    Mild,
    Moderate,
    Severe,
}

impl Intensity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intensity::Mild => "mild",
            Intensity::Moderate => "moderate",
            Intensity::Severe => "severe",
        }
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intensity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mild" => Ok(Intensity::Mild),
            "moderate" => Ok(Intensity::Moderate),
            "severe" => Ok(Intensity::Severe),
            other => Err(Error::Validation(format!("unknown intensity '{}'", other))),
        }
    }
}

// ============================================================================
// Logged records
// ============================================================================

/// One tracked period occurrence
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CycleRecord {
    pub id: String,
    pub start_date: NaiveDate,
    #[serde(default, deserialize_with = "blank_date_as_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub flow: Flow,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl CycleRecord {
    /// Create a validated cycle record with a fresh id
    ///
    /// When `length` is not given it is derived from the end date
    /// (inclusive day count), or defaults to 28 for an open period.
    pub fn new(
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        flow: Flow,
        length: Option<u32>,
    ) -> Result<Self> {
        if let Some(end) = end_date {
            check_end_not_before_start(start_date, end)?;
        }

        let length = length.or_else(|| end_date.map(|end| inclusive_days(start_date, end)));

        let cycle = Self {
            id: Uuid::new_v4().to_string(),
            start_date,
            end_date,
            flow,
            length: Some(length.unwrap_or(DEFAULT_CYCLE_LENGTH)),
            created_at: Utc::now(),
        };
        cycle.validate()?;
        Ok(cycle)
    }

    /// Check the rules every stored cycle must satisfy
    ///
    /// Records built with `new` already pass; imported ones may not.
    pub fn validate(&self) -> Result<()> {
        check_id(&self.id)?;
        if let Some(end) = self.end_date {
            check_end_not_before_start(self.start_date, end)?;
        }
        check_length(self.length)
    }

    /// Build the replacement record that closes this period on `end`
    ///
    /// The id is kept so the store replaces rather than adds.
    pub fn with_end_date(&self, end: NaiveDate) -> Result<Self> {
        let closed = Self {
            end_date: Some(end),
            length: Some(inclusive_days(self.start_date, end)),
            ..self.clone()
        };
        closed.validate()?;
        Ok(closed)
    }

    /// Cycle length in days, reading a missing or zero length as 28
    pub fn effective_length(&self) -> u32 {
        match self.length {
            Some(length) if length > 0 => length,
            _ => DEFAULT_CYCLE_LENGTH,
        }
    }

    /// Last day of bleeding: the logged end date, or start + 5 days
    pub fn period_end(&self) -> NaiveDate {
        self.end_date.unwrap_or_else(|| {
            self.start_date
                .checked_add_signed(Duration::days(ESTIMATED_PERIOD_DAYS))
                .unwrap_or(NaiveDate::MAX)
        })
    }

    /// Whether `date` falls within `[start_date, period_end()]`
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.period_end()
    }
}

fn check_end_not_before_start(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if end < start {
        return Err(Error::Validation(format!(
            "end date {} is before start date {}",
            end, start
        )));
    }
    Ok(())
}

fn check_length(length: Option<u32>) -> Result<()> {
    match length {
        Some(0) => Err(Error::Validation("cycle length must be positive".into())),
        Some(l) if l > MAX_CYCLE_LENGTH => Err(Error::Validation(format!(
            "cycle length {} exceeds {} days",
            l, MAX_CYCLE_LENGTH
        ))),
        _ => Ok(()),
    }
}

fn check_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::Validation("record id must not be empty".into()));
    }
    Ok(())
}

fn inclusive_days(start: NaiveDate, end: NaiveDate) -> u32 {
    u32::try_from((end - start).num_days() + 1).unwrap_or(u32::MAX)
}

/// Older exports store an unset end date as an empty string
fn blank_date_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Symptoms logged for one day
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SymptomEntry {
    pub id: String,
    pub date: NaiveDate,
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub intensity: Intensity,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl SymptomEntry {
    /// Create a validated symptom entry; at least one non-blank tag is required
    pub fn new(date: NaiveDate, symptoms: Vec<String>, intensity: Intensity) -> Result<Self> {
        let mut tags: Vec<String> = Vec::with_capacity(symptoms.len());
        for tag in symptoms {
            let tag = tag.trim().to_string();
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        if tags.is_empty() {
            return Err(Error::Validation("at least one symptom is required".into()));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            date,
            symptoms: tags,
            intensity,
            created_at: Utc::now(),
        })
    }

    /// At least one tag, none of them blank
    pub fn validate(&self) -> Result<()> {
        check_id(&self.id)?;
        if self.symptoms.is_empty() {
            return Err(Error::Validation("at least one symptom is required".into()));
        }
        if self.symptoms.iter().any(|t| t.trim().is_empty()) {
            return Err(Error::Validation("symptom tags must not be blank".into()));
        }
        Ok(())
    }
}

/// Free-text note attached to a day
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NoteEntry {
    pub id: String,
    pub date: NaiveDate,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl NoteEntry {
    /// Create a validated note; blank content is rejected
    pub fn new(date: NaiveDate, content: impl Into<String>) -> Result<Self> {
        let content = content.into().trim().to_string();
        if content.is_empty() {
            return Err(Error::Validation("note content must not be empty".into()));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            date,
            content,
            created_at: Utc::now(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        check_id(&self.id)?;
        if self.content.trim().is_empty() {
            return Err(Error::Validation("note content must not be empty".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Consistent view of every logged record at one point in time
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct CycleData {
    #[serde(default)]
    pub cycles: Vec<CycleRecord>,
    #[serde(default)]
    pub symptoms: Vec<SymptomEntry>,
    #[serde(default)]
    pub notes: Vec<NoteEntry>,
}

impl CycleData {
    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty() && self.symptoms.is_empty() && self.notes.is_empty()
    }
}

/// The cycle with the latest start date, if any
///
/// Ties on start date resolve to the one listed last.
pub fn most_recent_cycle(cycles: &[CycleRecord]) -> Option<&CycleRecord> {
    cycles.iter().max_by_key(|c| c.start_date)
}

// ============================================================================
// Preferences
// ============================================================================

/// Colour theme for rendering
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Neutral,
    Earthy,
    Monochrome,
}

impl FromStr for Theme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "neutral" => Ok(Theme::Neutral),
            "earthy" => Ok(Theme::Earthy),
            "monochrome" => Ok(Theme::Monochrome),
            other => Err(Error::Validation(format!("unknown theme '{}'", other))),
        }
    }
}

/// Interface language
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Fr,
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "en" => Ok(Language::En),
            "fr" => Ok(Language::Fr),
            other => Err(Error::Validation(format!("unknown language '{}'", other))),
        }
    }
}

/// Which reminders the user wants
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    #[serde(default = "enabled")]
    pub period_reminders: bool,
    #[serde(default = "enabled")]
    pub ovulation_reminders: bool,
    #[serde(default)]
    pub fertile_window: bool,
    #[serde(default)]
    pub daily_check: bool,
}

fn enabled() -> bool {
    true
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            period_reminders: true,
            ovulation_reminders: true,
            fertile_window: false,
            daily_check: false,
        }
    }
}

/// User's persistent display and reminder preferences
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_new_cycle_derives_length_from_end_date() {
        let cycle =
            CycleRecord::new(date("2025-01-01"), Some(date("2025-01-05")), Flow::Heavy, None)
                .unwrap();
        assert_eq!(cycle.length, Some(5));
        assert_eq!(cycle.flow, Flow::Heavy);
    }

    #[test]
    fn test_new_open_cycle_defaults_length() {
        let cycle = CycleRecord::new(date("2025-01-01"), None, Flow::Medium, None).unwrap();
        assert_eq!(cycle.length, Some(DEFAULT_CYCLE_LENGTH));
    }

    #[test]
    fn test_new_cycle_rejects_end_before_start() {
        let result =
            CycleRecord::new(date("2025-01-05"), Some(date("2025-01-01")), Flow::Light, None);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_new_cycle_rejects_zero_length() {
        let result = CycleRecord::new(date("2025-01-05"), None, Flow::Light, Some(0));
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_with_end_date_keeps_id() {
        let open = CycleRecord::new(date("2025-01-01"), None, Flow::Medium, None).unwrap();
        let closed = open.with_end_date(date("2025-01-04")).unwrap();

        assert_eq!(closed.id, open.id);
        assert_eq!(closed.end_date, Some(date("2025-01-04")));
        assert_eq!(closed.length, Some(4));
        assert!(open.end_date.is_none());
    }

    #[test]
    fn test_effective_length_treats_missing_as_default() {
        let mut cycle = CycleRecord::new(date("2025-01-01"), None, Flow::Medium, Some(30)).unwrap();
        assert_eq!(cycle.effective_length(), 30);
        cycle.length = None;
        assert_eq!(cycle.effective_length(), 28);
        cycle.length = Some(0);
        assert_eq!(cycle.effective_length(), 28);
    }

    #[test]
    fn test_symptom_entry_requires_a_tag() {
        let result = SymptomEntry::new(date("2025-01-01"), vec!["  ".into()], Intensity::Mild);
        assert!(matches!(result, Err(Error::Validation(_))));

        let entry = SymptomEntry::new(
            date("2025-01-01"),
            vec!["cramps".into(), " cramps ".into(), "fatigue".into()],
            Intensity::Severe,
        )
        .unwrap();
        assert_eq!(entry.symptoms, vec!["cramps", "fatigue"]);
    }

    #[test]
    fn test_note_requires_content() {
        assert!(NoteEntry::new(date("2025-01-01"), "   ").is_err());
        let note = NoteEntry::new(date("2025-01-01"), " tired ").unwrap();
        assert_eq!(note.content, "tired");
    }

    #[test]
    fn test_cycle_json_uses_export_field_names() {
        let json = r#"{
            "id": "1",
            "startDate": "2024-12-15",
            "endDate": "",
            "flow": "heavy",
            "length": 28,
            "createdAt": "2024-12-15T00:00:00Z"
        }"#;
        let cycle: CycleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(cycle.start_date, date("2024-12-15"));
        assert_eq!(cycle.end_date, None);
        assert_eq!(cycle.flow, Flow::Heavy);

        let out = serde_json::to_string(&cycle).unwrap();
        assert!(out.contains("\"startDate\":\"2024-12-15\""));
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("Heavy".parse::<Flow>().unwrap(), Flow::Heavy);
        assert_eq!("moderate".parse::<Intensity>().unwrap(), Intensity::Moderate);
        assert_eq!("fr".parse::<Language>().unwrap(), Language::Fr);
        assert!("purple".parse::<Theme>().is_err());
    }

    #[test]
    fn test_partial_preferences() {
        let prefs: UserPreferences =
            serde_json::from_str(r#"{"theme":"earthy","notifications":{"dailyCheck":true}}"#)
                .unwrap();
        assert_eq!(prefs.theme, Theme::Earthy);
        assert_eq!(prefs.language, Language::En);
        assert!(prefs.notifications.period_reminders);
        assert!(prefs.notifications.daily_check);
    }

    #[test]
    fn test_new_cycle_rejects_oversized_length() {
        let result = CycleRecord::new(date("2025-01-01"), None, Flow::Medium, Some(4_000_000_000));
        assert!(matches!(result, Err(Error::Validation(_))));

        let longest =
            CycleRecord::new(date("2025-01-01"), None, Flow::Medium, Some(MAX_CYCLE_LENGTH));
        assert!(longest.is_ok());

        // A span over a year can't be turned into a length
        let span = CycleRecord::new(date("2024-01-01"), Some(date("2025-06-01")), Flow::Light, None);
        assert!(span.is_err());
    }

    #[test]
    fn test_validate_catches_deserialized_records() {
        let backwards: CycleRecord = serde_json::from_str(
            r#"{"id":"a","startDate":"2025-01-10","endDate":"2025-01-01","flow":"light"}"#,
        )
        .unwrap();
        assert!(backwards.validate().is_err());

        let zero: CycleRecord =
            serde_json::from_str(r#"{"id":"b","startDate":"2025-01-10","length":0}"#).unwrap();
        assert!(zero.validate().is_err());

        let empty: SymptomEntry = serde_json::from_str(
            r#"{"id":"c","date":"2025-01-10","symptoms":[],"intensity":"mild"}"#,
        )
        .unwrap();
        assert!(empty.validate().is_err());

        let blank: NoteEntry =
            serde_json::from_str(r#"{"id":"d","date":"2025-01-10","content":"  "}"#).unwrap();
        assert!(blank.validate().is_err());

        let fine: NoteEntry =
            serde_json::from_str(r#"{"id":"e","date":"2025-01-10","content":"ok"}"#).unwrap();
        assert!(fine.validate().is_ok());
    }
}
