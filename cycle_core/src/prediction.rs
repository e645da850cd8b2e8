//! Prediction engine for the next period, ovulation and fertile window.
//!
//! The model is deliberately simple:
//! - Average the logged cycle lengths (missing lengths count as 28)
//! - Next period = latest start date + average length
//! - Ovulation = 14 days before the next period
//! - Fertile window = 5 days before ovulation through 1 day after

use crate::types::{most_recent_cycle, CycleRecord};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Days between ovulation and the following period
pub const LUTEAL_PHASE_DAYS: i64 = 14;

/// Fertile days counted before the ovulation day
pub const FERTILE_DAYS_BEFORE_OVULATION: i64 = 5;

/// Fertile days counted after the ovulation day
pub const FERTILE_DAYS_AFTER_OVULATION: i64 = 1;

/// Inclusive date range of the predicted fertile window
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FertileWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FertileWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Forward-looking prediction derived from logged cycles
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub next_period: NaiveDate,
    pub ovulation: NaiveDate,
    pub fertile_window: FertileWindow,
    pub avg_cycle_length: u32,
}

/// Predict the next cycle from the logged history
///
/// Returns `None` when no cycles are logged: there is nothing to predict
/// from, which callers should show as "no data yet". Also `None` when the
/// predicted dates fall outside the representable calendar.
pub fn compute_prediction(cycles: &[CycleRecord]) -> Option<Prediction> {
    let avg_cycle_length = average_cycle_length(cycles)?;
    let last_cycle = most_recent_cycle(cycles)?;

    // No prediction past the end of the representable calendar
    let next_period = last_cycle
        .start_date
        .checked_add_signed(Duration::days(i64::from(avg_cycle_length)))?;
    let ovulation = next_period.checked_sub_signed(Duration::days(LUTEAL_PHASE_DAYS))?;
    let fertile_window = FertileWindow {
        start: ovulation.checked_sub_signed(Duration::days(FERTILE_DAYS_BEFORE_OVULATION))?,
        end: ovulation.checked_add_signed(Duration::days(FERTILE_DAYS_AFTER_OVULATION))?,
    };

    tracing::debug!(
        "Predicted next period {} from {} cycles (avg {} days)",
        next_period,
        cycles.len(),
        avg_cycle_length
    );

    Some(Prediction {
        next_period,
        ovulation,
        fertile_window,
        avg_cycle_length,
    })
}

/// Mean cycle length rounded to the nearest day (halves round up)
///
/// `None` for an empty slice.
pub fn average_cycle_length(cycles: &[CycleRecord]) -> Option<u32> {
    if cycles.is_empty() {
        return None;
    }

    let total: u64 = cycles.iter().map(|c| u64::from(c.effective_length())).sum();
    let mean = total as f64 / cycles.len() as f64;
    Some(mean.round() as u32)
}
