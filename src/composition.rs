//! Composition extraction: free-text VLM output → `label → percentage` map.
//!
//! The model is asked to report one category per line in the form
//! `Label - NN%`, but nothing guarantees it will. This module is therefore a
//! tolerant line parser: every line that does not look like an entry is
//! skipped silently, and an input with no parseable lines produces an empty
//! [`CompositionMap`] rather than an error.
//!
//! ## Line grammar
//!
//! ```text
//! [list marker] label <sep> value %
//! ```
//!
//! * Leading list markers (`- `, `* `, `• `, `1. `, `2) `) are dropped first,
//!   so bulleted answers parse the same as plain ones.
//! * `<sep>` is the first hyphen surrounded by whitespace (` - `) if the line
//!   has one, otherwise the first bare `-`. This keeps hyphenated labels such
//!   as `Protein-rich foods - 40%` intact while `A-B-30%` still splits at the
//!   first hyphen (and is then rejected because `B-30` is not a number).
//! * The value must end in `%`; the rest is parsed as a finite `f64`.
//!   Negative and >100 values are kept as-is; plausibility is left to the
//!   caller.
//! * Labels are trimmed, internal whitespace is collapsed, and keys compare
//!   case-insensitively. A repeated label overwrites the earlier entry.
//!
//! [`extract`] has no side effects and is deterministic.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static RE_LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-*•]|\d{1,2}[.)])\s+").unwrap());

static RE_SPACED_HYPHEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s-\s").unwrap());

/// One parsed `(category, percentage)` pair.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CompositionEntry {
    /// Normalised label as it appeared in the text (case preserved).
    pub label: String,
    /// Percentage exactly as parsed; not clamped.
    pub percentage: f64,
}

/// One pie-chart slice derived from a [`CompositionMap`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSlice {
    pub label: String,
    pub percentage: f64,
    /// Share of the pie in `(0, 1]`; all slices sum to 1.
    pub fraction: f64,
}

/// Mapping from food category to percentage, keyed case-insensitively.
///
/// May be empty, which means "no parseable data" rather than failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositionMap {
    entries: BTreeMap<String, CompositionEntry>,
}

impl CompositionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entry. The label is normalised first; blank
    /// labels are ignored.
    pub fn insert(&mut self, label: &str, percentage: f64) {
        let label = normalize_label(label);
        if label.is_empty() {
            return;
        }
        let key = label.to_lowercase();
        self.entries
            .insert(key, CompositionEntry { label, percentage });
    }

    /// Look up a category, ignoring case and surrounding/internal whitespace.
    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries
            .get(&normalize_label(label).to_lowercase())
            .map(|e| e.percentage)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by descending percentage, ties broken by label.
    pub fn iter(&self) -> impl Iterator<Item = &CompositionEntry> {
        let mut sorted: Vec<&CompositionEntry> = self.entries.values().collect();
        sorted.sort_by(|a, b| {
            b.percentage
                .partial_cmp(&a.percentage)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.label.cmp(&b.label))
        });
        sorted.into_iter()
    }

    /// Sum of all percentages as parsed. Not expected to be 100.
    pub fn total(&self) -> f64 {
        self.entries.values().map(|e| e.percentage).sum()
    }

    /// Positive entries normalised into pie slices.
    ///
    /// Zero and negative percentages cannot be drawn and are left out.
    /// Returns an empty vector when nothing positive remains.
    pub fn chart_slices(&self) -> Vec<ChartSlice> {
        let positive: Vec<&CompositionEntry> =
            self.iter().filter(|e| e.percentage > 0.0).collect();
        let sum: f64 = positive.iter().map(|e| e.percentage).sum();
        if sum <= 0.0 {
            return Vec::new();
        }
        positive
            .into_iter()
            .map(|e| ChartSlice {
                label: e.label.clone(),
                percentage: e.percentage,
                fraction: e.percentage / sum,
            })
            .collect()
    }
}

impl Serialize for CompositionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in self.iter() {
            map.serialize_entry(&entry.label, &entry.percentage)?;
        }
        map.end()
    }
}

/// Parse free text into a [`CompositionMap`]. Never fails.
pub fn extract(text: &str) -> CompositionMap {
    let mut map = CompositionMap::new();
    let mut skipped = 0usize;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_line(line) {
            Some(entry) => {
                if map.get(&entry.label).is_some() {
                    debug!("Duplicate category '{}', keeping the later value", entry.label);
                }
                map.insert(&entry.label, entry.percentage);
            }
            None => skipped += 1,
        }
    }

    debug!(
        "Extracted {} composition entries ({} lines skipped)",
        map.len(),
        skipped
    );
    map
}

/// Parse a single line, returning `None` when it is not a `label - NN%` entry.
pub fn parse_line(line: &str) -> Option<CompositionEntry> {
    let line = line.trim().replace("**", "").replace("__", "");
    let line = RE_LIST_MARKER.replace(line.trim(), "");

    let (label, value) = split_label_value(&line)?;
    let label = normalize_label(label);
    if label.is_empty() {
        return None;
    }
    let percentage = parse_percentage(value)?;

    Some(CompositionEntry { label, percentage })
}

/// Split at the preferred separator into two non-empty trimmed segments.
fn split_label_value(line: &str) -> Option<(&str, &str)> {
    let (label, value) = match RE_SPACED_HYPHEN.find(line) {
        Some(m) => (&line[..m.start()], &line[m.end()..]),
        None => line.split_once('-')?,
    };
    let (label, value) = (label.trim(), value.trim());
    if label.is_empty() || value.is_empty() {
        return None;
    }
    Some((label, value))
}

/// `"40%"` → `40.0`; anything without a `%` suffix or with a non-numeric
/// body is rejected.
fn parse_percentage(value: &str) -> Option<f64> {
    let number = value.strip_suffix('%')?.trim();
    let parsed: f64 = number.parse().ok()?;
    parsed.is_finite().then_some(parsed)
}

fn normalize_label(label: &str) -> String {
    RE_WHITESPACE.replace_all(label.trim(), " ").into_owned()
}
