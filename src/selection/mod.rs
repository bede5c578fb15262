//! Per-row keep/drop decisions.
//!
//! [`RowSelector`] applies an ordered policy to every data row of the main
//! pass: output cap, duplicate rejection, aggregation cap, then either the
//! coverage rules or the legacy per-value rules. Every decision carries the
//! reason that produced it.

mod engine;
mod state;

use std::fmt;

use serde::Serialize;

pub use engine::RowSelector;
pub use state::SelectionState;

/// Position of a row across all inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowOrdinal {
    /// Index of the input file.
    pub source: usize,
    /// Row index within the file, header rows included.
    pub row: usize,
}

impl RowOrdinal {
    pub fn new(source: usize, row: usize) -> Self {
        Self { source, row }
    }
}

/// Which rule set drives acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Coverage-first selection backed by a prescan plan.
    Coverage,
    /// Per-value counts with random sampling.
    Legacy,
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coverage => f.write_str("coverage"),
            Self::Legacy => f.write_str("legacy"),
        }
    }
}

/// Why a row was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcceptReason {
    /// Holds a categorical value not yet in the output.
    Coverage,
    /// Holds a numeric value in a range bucket not yet in the output.
    Range,
    /// Random fill after categorical coverage completed.
    RandomFill,
    /// Holds a value seen fewer than `rows_per_key` times (legacy mode).
    LegacyUnique,
    /// Random sampling (legacy mode).
    LegacySampled,
    /// Added by the reconcile pass.
    TopUp,
}

/// Why a row was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// The output cap is reached and coverage is complete.
    OutputCap,
    /// Same signature as an accepted row.
    Duplicate,
    /// Aggregation row beyond the aggregation cap.
    AggregationCap,
    /// Contributes no coverage and lost the random draw.
    NotNeeded,
    /// Legacy mode reached `output_rows`.
    LegacyLimit,
}

/// Outcome of evaluating one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Accept(AcceptReason),
    Reject(RejectReason),
}

impl Decision {
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept(_))
    }
}

/// Recognizes summary rows ("Total", "All", ...) by their leading cells.
#[derive(Debug, Clone)]
pub struct AggregationMatcher {
    keywords: Vec<String>,
    whole_words: bool,
}

/// Leading cells inspected for aggregation keywords.
const AGGREGATION_SCAN_CELLS: usize = 5;

impl AggregationMatcher {
    pub fn new(keywords: &[String]) -> Self {
        Self {
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            whole_words: false,
        }
    }

    /// Only match keywords bounded by non-alphanumeric characters.
    pub fn with_whole_words(mut self, enabled: bool) -> Self {
        self.whole_words = enabled;
        self
    }

    /// Whether any of the first cells contains a keyword (case-insensitive).
    pub fn is_aggregation(&self, row: &[String]) -> bool {
        row.iter().take(AGGREGATION_SCAN_CELLS).any(|cell| {
            let cell = cell.to_lowercase();
            self.keywords.iter().any(|k| {
                if self.whole_words {
                    contains_word(&cell, k)
                } else {
                    cell.contains(k.as_str())
                }
            })
        })
    }
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
