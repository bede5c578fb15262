//! Bookkeeping for accepted rows.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::RowOrdinal;

/// What the selector knows about the rows accepted so far.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    selected_rows: usize,
    aggregation_rows: usize,
    signatures: HashSet<Vec<String>>,
    /// Full cell content of every accepted row.
    contents: HashSet<Vec<String>>,
    ordinals: HashSet<RowOrdinal>,
    /// Legacy mode: accepted-row count per column value.
    column_counts: BTreeMap<usize, HashMap<String, usize>>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Data rows accepted so far.
    pub fn selected_rows(&self) -> usize {
        self.selected_rows
    }

    /// Aggregation rows accepted so far.
    pub fn aggregation_rows(&self) -> usize {
        self.aggregation_rows
    }

    /// Whether a row with this signature was already accepted.
    pub fn has_signature(&self, signature: &[String]) -> bool {
        self.signatures.contains(signature)
    }

    /// Whether a row with exactly these cells was already accepted.
    pub fn has_row(&self, row: &[String]) -> bool {
        self.contents.contains(row)
    }

    /// Whether the row at `ordinal` was already accepted.
    pub fn is_selected(&self, ordinal: RowOrdinal) -> bool {
        self.ordinals.contains(&ordinal)
    }

    /// Accepted rows holding `value` in column `column`.
    pub fn value_count(&self, column: usize, value: &str) -> usize {
        self.column_counts
            .get(&column)
            .and_then(|counts| counts.get(value))
            .copied()
            .unwrap_or(0)
    }

    /// Distinct accepted values tracked for `column`.
    pub fn distinct_values(&self, column: usize) -> usize {
        self.column_counts.get(&column).map(HashMap::len).unwrap_or(0)
    }

    /// Records an accepted row.
    pub(super) fn record(
        &mut self,
        ordinal: RowOrdinal,
        row: &[String],
        signature: Option<Vec<String>>,
        is_aggregation: bool,
    ) {
        self.selected_rows += 1;
        self.ordinals.insert(ordinal);
        self.contents.insert(row.to_vec());
        if let Some(signature) = signature {
            self.signatures.insert(signature);
        }
        if is_aggregation {
            self.aggregation_rows += 1;
        }
    }

    /// Counts one accepted occurrence of `value` in `column`.
    pub(super) fn count_value(&mut self, column: usize, value: &str) {
        *self
            .column_counts
            .entry(column)
            .or_default()
            .entry(value.to_string())
            .or_insert(0) += 1;
    }
}
