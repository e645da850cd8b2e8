//! Point-in-time queries for a reference date.
//!
//! Every function takes the date explicitly; nothing here reads the clock.

use crate::prediction::{compute_prediction, Prediction, LUTEAL_PHASE_DAYS};
use crate::types::{most_recent_cycle, CycleRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Last cycle day counted as menstrual
const MENSTRUAL_DAYS: i64 = 5;

/// Coarse position within the cycle
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Menstrual,
    Follicular,
    Ovulation,
    Luteal,
    Unknown,
}

impl Phase {
    /// Classify a cycle day given the average cycle length
    ///
    /// With `ovulation_day = avg - 14`:
    /// - day <= 5 is menstrual
    /// - `ovulation_day - 1 ..= ovulation_day + 1` is ovulation
    /// - days between the two are follicular
    /// - everything later is luteal
    ///
    /// The ovulation range starts at `ovulation_day - 1`, so that day is
    /// ovulation rather than follicular.
    pub fn classify(cycle_day: i64, avg_cycle_length: u32) -> Self {
        let ovulation_day = i64::from(avg_cycle_length) - LUTEAL_PHASE_DAYS;

        if cycle_day <= MENSTRUAL_DAYS {
            Phase::Menstrual
        } else if (ovulation_day - 1..=ovulation_day + 1).contains(&cycle_day) {
            Phase::Ovulation
        } else if cycle_day < ovulation_day - 1 {
            Phase::Follicular
        } else {
            Phase::Luteal
        }
    }

    /// Phase for a cycle day, or `Unknown` without a prediction
    pub fn for_prediction(cycle_day: i64, prediction: Option<&Prediction>) -> Self {
        prediction.map_or(Phase::Unknown, |p| Self::classify(cycle_day, p.avg_cycle_length))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Menstrual => "menstrual",
            Phase::Follicular => "follicular",
            Phase::Ovulation => "ovulation",
            Phase::Luteal => "luteal",
            Phase::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `date` falls in the most recent period
///
/// Uses the logged end date when present, otherwise assumes the period
/// runs through start + 5 days.
pub fn is_on_period(date: NaiveDate, cycles: &[CycleRecord]) -> bool {
    most_recent_cycle(cycles).is_some_and(|cycle| cycle.covers(date))
}

/// 1-based day of the current cycle, counted from the latest start date
///
/// Returns 1 when nothing is logged. Dates before the latest start give
/// zero or negative days.
pub fn cycle_day(date: NaiveDate, cycles: &[CycleRecord]) -> i64 {
    most_recent_cycle(cycles).map_or(1, |cycle| (date - cycle.start_date).num_days() + 1)
}

/// Whole days from `date` until the predicted period, never negative
pub fn days_until_next_period(date: NaiveDate, prediction: Option<&Prediction>) -> Option<i64> {
    prediction.map(|p| (p.next_period - date).num_days().max(0))
}

/// Everything the "today" summary shows
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TodayInfo {
    pub date: NaiveDate,
    pub cycle_day: i64,
    pub phase: Phase,
    pub days_until_next: Option<i64>,
    pub is_on_period: bool,
}

/// Summarize where `date` sits in the cycle
pub fn today_info(date: NaiveDate, cycles: &[CycleRecord]) -> TodayInfo {
    let prediction = compute_prediction(cycles);
    let day = cycle_day(date, cycles);

    TodayInfo {
        date,
        cycle_day: day,
        phase: Phase::for_prediction(day, prediction.as_ref()),
        days_until_next: days_until_next_period(date, prediction.as_ref()),
        is_on_period: is_on_period(date, cycles),
    }
}
