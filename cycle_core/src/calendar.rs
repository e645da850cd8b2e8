//! Calendar cell classification.
//!
//! A day can be part of a logged period and match predicted events at the
//! same time. The calendar shows a single mark per day, picked by
//! precedence: logged period, predicted ovulation, fertile window,
//! predicted period.

use crate::prediction::Prediction;
use crate::types::{CycleData, CycleRecord, NoteEntry, SymptomEntry};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Tolerance in days around a predicted ovulation or period date
const PREDICTION_TOLERANCE_DAYS: i64 = 1;

/// The single mark a calendar day is drawn with
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DayMark {
    Period,
    PredictedOvulation,
    Fertile,
    PredictedPeriod,
    None,
}

/// Pick the mark for `date`
///
/// A logged cycle whose end date is unknown is drawn through start + 5
/// days, matching the on-period estimate.
pub fn classify_day(
    date: NaiveDate,
    cycles: &[CycleRecord],
    prediction: Option<&Prediction>,
) -> DayMark {
    if cycles.iter().any(|c| c.covers(date)) {
        return DayMark::Period;
    }

    let Some(prediction) = prediction else {
        return DayMark::None;
    };

    if within_tolerance(date, prediction.ovulation) {
        DayMark::PredictedOvulation
    } else if prediction.fertile_window.contains(date) {
        DayMark::Fertile
    } else if within_tolerance(date, prediction.next_period) {
        DayMark::PredictedPeriod
    } else {
        DayMark::None
    }
}

fn within_tolerance(date: NaiveDate, target: NaiveDate) -> bool {
    (date - target).num_days().abs() <= PREDICTION_TOLERANCE_DAYS
}

/// A calendar day with the records that fall on it
#[derive(Clone, Debug)]
pub struct DayInfo<'a> {
    pub date: NaiveDate,
    pub mark: DayMark,
    pub cycle: Option<&'a CycleRecord>,
    pub symptoms: Option<&'a SymptomEntry>,
    pub note: Option<&'a NoteEntry>,
}

/// Collect the mark and records for one calendar day
pub fn day_info<'a>(
    date: NaiveDate,
    data: &'a CycleData,
    prediction: Option<&Prediction>,
) -> DayInfo<'a> {
    DayInfo {
        date,
        mark: classify_day(date, &data.cycles, prediction),
        cycle: data.cycles.iter().find(|c| c.covers(date)),
        symptoms: data.symptoms.iter().find(|s| s.date == date),
        note: data.notes.iter().find(|n| n.date == date),
    }
}

/// Days of a month laid out in Sunday-first weeks
///
/// Leading `None` cells pad the first week up to day 1. Returns an empty
/// grid for an invalid year/month.
pub fn month_grid(year: i32, month: u32) -> Vec<Option<NaiveDate>> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };

    let leading = first.weekday().num_days_from_sunday() as usize;
    let mut grid = vec![None; leading];

    let mut day = Some(first);
    while let Some(current) = day.filter(|d| d.month() == month) {
        grid.push(Some(current));
        day = current.succ_opt();
    }
    grid
}
