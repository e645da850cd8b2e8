#![forbid(unsafe_code)]

//! Core domain model and logic for the Luna cycle tracker.
//!
//! This crate provides:
//! - Domain types (cycles, symptom entries, notes, preferences)
//! - Prediction and insight engines
//! - Point-in-time and calendar classification
//! - Persistence (journal store, snapshot cache, preferences)
//! - Export and import

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod journal;
pub mod state;
pub mod store;
pub mod cache;
pub mod preferences;
pub mod export;
pub mod prediction;
pub mod insights;
pub mod today;
pub mod calendar;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use store::{JournalStore, RecordStore};
pub use cache::{load_with_fallback, LoadedSnapshot, SnapshotCache};
pub use prediction::{compute_prediction, FertileWindow, Prediction};
pub use insights::{compute_insights, Insights, Regularity, SymptomCount};
pub use today::{cycle_day, days_until_next_period, is_on_period, today_info, Phase, TodayInfo};
pub use calendar::{classify_day, day_info, month_grid, DayInfo, DayMark};
pub use export::{ExportDocument, ExportFormat, ImportSummary};
