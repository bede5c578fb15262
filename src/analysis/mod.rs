//! Column classification.
//!
//! The classifier inspects materialized data rows and assigns every column a
//! statistical role. Columns that carry no decision-relevant signal form the
//! skip set and are ignored by signatures, uniqueness tracking, and numeric
//! range coverage.

mod classifier;
mod numeric;
mod rules;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

pub use classifier::ColumnAnalyzer;
pub use numeric::{parse_numeric, NumericRange, RangeBucket};
pub use rules::{DerivedRule, DerivedRuleSet, IdColumnMatcher};

/// Statistical role of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// Empty header, a single value, or almost entirely empty.
    Constant,
    /// Long, mostly unique free text.
    Metadata,
    /// Computed from another column (by name or by value).
    Derived,
    /// In 1:1 correspondence with an earlier column.
    Redundant,
    /// Few distinct values relative to the row count.
    Categorical,
    /// Mostly numeric values.
    Numeric,
    /// Anything else.
    Text,
}

impl ColumnKind {
    /// Whether columns of this kind are excluded from decision tracking.
    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            Self::Constant | Self::Metadata | Self::Derived | Self::Redundant
        )
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Constant => "constant",
            Self::Metadata => "metadata",
            Self::Derived => "derived",
            Self::Redundant => "redundant",
            Self::Categorical => "categorical",
            Self::Numeric => "numeric",
            Self::Text => "text",
        };
        f.write_str(name)
    }
}

/// Two columns in bijection; `column_b` is the redundant one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RedundantPair {
    pub column_a: usize,
    pub column_b: usize,
}

/// Reporting view of a single column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub index: usize,
    pub header: String,
    pub kind: ColumnKind,
    pub unique_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_range: Option<NumericRange>,
}

/// Result of classifying the columns of a table.
#[derive(Debug, Clone, Default)]
pub struct ColumnAnalysis {
    /// Number of data rows analyzed.
    pub num_rows: usize,
    /// Column names used for classification.
    pub headers: Vec<String>,
    pub constant: BTreeSet<usize>,
    pub metadata: BTreeSet<usize>,
    pub derived: BTreeSet<usize>,
    pub redundant_pairs: Vec<RedundantPair>,
    /// Quartile ranges of every numeric column.
    pub numeric_ranges: BTreeMap<usize, NumericRange>,
    /// Distinct values per column.
    pub unique_counts: Vec<usize>,
    /// Role of each column, without the categorical overlay.
    pub kinds: Vec<ColumnKind>,
}

impl ColumnAnalysis {
    /// Columns excluded from signatures, uniqueness tracking, and range coverage.
    pub fn skip_columns(&self) -> BTreeSet<usize> {
        let mut skip: BTreeSet<usize> = self
            .constant
            .iter()
            .chain(&self.metadata)
            .chain(&self.derived)
            .copied()
            .collect();
        skip.extend(self.redundant_pairs.iter().map(|p| p.column_b));
        skip
    }

    /// Number of analyzed columns.
    pub fn num_columns(&self) -> usize {
        self.kinds.len()
    }

    /// Per-column report, with `categorical` columns (from coverage planning)
    /// reported as categorical unless already skipped.
    pub fn profiles(&self, categorical: &BTreeSet<usize>) -> Vec<ColumnProfile> {
        self.kinds
            .iter()
            .enumerate()
            .map(|(index, kind)| {
                let kind = if !kind.is_skipped() && categorical.contains(&index) {
                    ColumnKind::Categorical
                } else {
                    *kind
                };
                ColumnProfile {
                    index,
                    header: self.headers.get(index).cloned().unwrap_or_default(),
                    kind,
                    unique_count: self.unique_counts.get(index).copied().unwrap_or(0),
                    numeric_range: self.numeric_ranges.get(&index).copied(),
                }
            })
            .collect()
    }
}
