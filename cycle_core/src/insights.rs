//! Retrospective statistics over the logged history.
//!
//! Insights cover cycle count, average length, the most common flow, the
//! most frequent symptoms and how regular the cycle lengths are.

use crate::prediction::average_cycle_length;
use crate::types::{CycleRecord, Flow, SymptomEntry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Number of symptoms reported in `Insights::top_symptoms`
pub const TOP_SYMPTOM_COUNT: usize = 3;

/// Largest length spread still considered regular
const REGULAR_MAX_VARIATION: u32 = 7;

/// Largest length spread still considered somewhat irregular
const SOMEWHAT_IRREGULAR_MAX_VARIATION: u32 = 14;

/// How consistent cycle lengths are, from the spread `max - min`
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Regularity {
    Regular,
    SomewhatIrregular,
    Irregular,
}

impl Regularity {
    pub fn from_variation(variation: u32) -> Self {
        if variation <= REGULAR_MAX_VARIATION {
            Regularity::Regular
        } else if variation <= SOMEWHAT_IRREGULAR_MAX_VARIATION {
            Regularity::SomewhatIrregular
        } else {
            Regularity::Irregular
        }
    }
}

impl fmt::Display for Regularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Regularity::Regular => "Regular",
            Regularity::SomewhatIrregular => "Somewhat Irregular",
            Regularity::Irregular => "Irregular",
        })
    }
}

/// A symptom tag and how often it was logged
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SymptomCount {
    pub symptom: String,
    pub count: usize,
}

/// Statistics over the logged history
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub total_cycles: usize,
    pub avg_cycle_length: u32,
    pub most_common_flow: Flow,
    pub top_symptoms: Vec<SymptomCount>,
    pub regularity: Regularity,
    pub length_variation: u32,
    pub min_length: u32,
    pub max_length: u32,
}

/// Compute insights from cycles and symptom entries
///
/// Returns `None` when no cycles are logged. Symptom entries alone are not
/// enough for insights.
pub fn compute_insights(cycles: &[CycleRecord], symptoms: &[SymptomEntry]) -> Option<Insights> {
    let avg_cycle_length = average_cycle_length(cycles)?;
    let most_common_flow = most_common_flow(cycles)?;

    let lengths = cycles.iter().map(CycleRecord::effective_length);
    let min_length = lengths.clone().min()?;
    let max_length = lengths.max()?;
    let length_variation = max_length - min_length;

    let insights = Insights {
        total_cycles: cycles.len(),
        avg_cycle_length,
        most_common_flow,
        top_symptoms: top_symptoms(symptoms, TOP_SYMPTOM_COUNT),
        regularity: Regularity::from_variation(length_variation),
        length_variation,
        min_length,
        max_length,
    };

    tracing::debug!(
        "Computed insights over {} cycles: {} ({} day spread)",
        insights.total_cycles,
        insights.regularity,
        insights.length_variation
    );

    Some(insights)
}

/// The flow logged most often; ties go to the flow seen first
fn most_common_flow(cycles: &[CycleRecord]) -> Option<Flow> {
    let mut tally: Vec<(Flow, usize)> = Vec::new();
    for cycle in cycles {
        match tally.iter_mut().find(|(flow, _)| *flow == cycle.flow) {
            Some((_, count)) => *count += 1,
            None => tally.push((cycle.flow, 1)),
        }
    }

    let mut best: Option<(Flow, usize)> = None;
    for (flow, count) in tally {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((flow, count));
        }
    }
    best.map(|(flow, _)| flow)
}

/// Most frequent symptom tags, descending by count
///
/// Ties keep the order in which tags were first seen.
pub fn top_symptoms(entries: &[SymptomEntry], limit: usize) -> Vec<SymptomCount> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<SymptomCount> = Vec::new();

    for tag in entries.iter().flat_map(|e| e.symptoms.iter()) {
        match index.get(tag.as_str()) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(tag.as_str(), counts.len());
                counts.push(SymptomCount {
                    symptom: tag.clone(),
                    count: 1,
                });
            }
        }
    }

    // Stable sort preserves first-seen order among equal counts
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(limit);
    counts
}
