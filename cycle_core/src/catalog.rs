//! Built-in symptom vocabulary.
//!
//! The tracker offers a fixed set of symptom tags for logging. Tags outside
//! the vocabulary are still accepted; the catalog only supplies labels and
//! quick-log intensities.

use crate::types::Intensity;
use once_cell::sync::Lazy;

/// One entry of the symptom vocabulary
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymptomKind {
    pub tag: &'static str,
    pub label: &'static str,
    /// Intensity used when the symptom is logged without one
    pub suggested_intensity: Intensity,
}

/// Cached vocabulary, built once
static SYMPTOM_CATALOG: Lazy<Vec<SymptomKind>> = Lazy::new(build_symptom_catalog);

/// Get a reference to the cached symptom vocabulary, in display order
pub fn symptom_catalog() -> &'static [SymptomKind] {
    &SYMPTOM_CATALOG
}

/// Find a vocabulary entry by tag
pub fn lookup(tag: &str) -> Option<&'static SymptomKind> {
    symptom_catalog().iter().find(|k| k.tag == tag)
}

/// Whether the tag belongs to the built-in vocabulary
pub fn is_known(tag: &str) -> bool {
    lookup(tag).is_some()
}

/// Quick-log intensity for a tag; unknown tags get `Mild`
pub fn suggested_intensity(tag: &str) -> Intensity {
    lookup(tag).map_or(Intensity::Mild, |k| k.suggested_intensity)
}

/// Display label for a tag, falling back to the tag itself
pub fn label(tag: &str) -> &str {
    lookup(tag).map_or(tag, |k| k.label)
}

fn build_symptom_catalog() -> Vec<SymptomKind> {
    let kind = |tag: &'static str, label: &'static str, suggested_intensity| SymptomKind {
        tag,
        label,
        suggested_intensity,
    };

    vec![
        kind("cramps", "Cramps", Intensity::Moderate),
        kind("headache", "Headache", Intensity::Mild),
        kind("bloating", "Bloating", Intensity::Mild),
        kind("mood_swings", "Mood swings", Intensity::Mild),
        kind("fatigue", "Fatigue", Intensity::Moderate),
        kind("tender_breasts", "Tender breasts", Intensity::Mild),
        kind("acne", "Acne", Intensity::Mild),
        kind("cravings", "Cravings", Intensity::Mild),
        kind("back_pain", "Back pain", Intensity::Mild),
        kind("nausea", "Nausea", Intensity::Mild),
    ]
}
