//! Coverage planning.
//!
//! The planner finds the categorical columns of the prescanned data and
//! records every value they take. [`CoverageState`] then tracks which of
//! those values, and which numeric range buckets, the output still lacks.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;

use crate::analysis::{parse_numeric, ColumnAnalysis, IdColumnMatcher, NumericRange, RangeBucket};
use crate::config::SamplerConfig;
use crate::io::Row;

/// Categorical threshold for a table of `total_rows` data rows.
///
/// Larger tables get a smaller ratio since absolute cardinality matters more
/// than the ratio at scale.
pub fn adaptive_threshold(total_rows: usize) -> f64 {
    if total_rows < 500 {
        0.2
    } else if total_rows < 2000 {
        0.1
    } else {
        0.05
    }
}

/// Coverage targets derived from the prescan.
#[derive(Debug, Clone, Default)]
pub struct CoveragePlan {
    /// Categorical columns with every value observed in the data.
    pub categorical: BTreeMap<usize, BTreeSet<String>>,
    /// Columns excluded as identifiers.
    pub id_columns: BTreeSet<usize>,
    /// Columns excluded from decision tracking by the classifier.
    pub skip_columns: BTreeSet<usize>,
    /// Ranges of the non-skipped numeric columns.
    pub numeric_ranges: BTreeMap<usize, NumericRange>,
    /// Column names, for reporting.
    pub headers: Vec<String>,
    /// Threshold used for categorical detection.
    pub threshold: f64,
    /// Data rows the plan was built from.
    pub total_rows: usize,
}

impl CoveragePlan {
    /// Coverage state with every planned value and bucket still uncovered.
    pub fn initial_state(&self, epsilon: f64) -> CoverageState {
        CoverageState {
            uncovered: self
                .categorical
                .iter()
                .map(|(idx, values)| (*idx, values.iter().cloned().collect()))
                .collect(),
            ranges: self
                .numeric_ranges
                .iter()
                .map(|(idx, range)| (*idx, (*range, HashSet::new())))
                .collect(),
            epsilon,
        }
    }

    /// Indices of the categorical columns, in order.
    pub fn categorical_columns(&self) -> BTreeSet<usize> {
        self.categorical.keys().copied().collect()
    }

    fn header(&self, idx: usize) -> String {
        self.headers
            .get(idx)
            .cloned()
            .unwrap_or_else(|| format!("column_{}", idx))
    }
}

/// Builds coverage plans from prescanned rows.
pub struct CoveragePlanner {
    adaptive: bool,
    base_threshold: f64,
    id_matcher: IdColumnMatcher,
}

impl CoveragePlanner {
    pub fn new(config: &SamplerConfig) -> Self {
        Self {
            adaptive: config.adaptive_threshold,
            base_threshold: config.categorical_threshold,
            id_matcher: IdColumnMatcher::new(&config.id_column_patterns),
        }
    }

    /// Plans coverage over `rows`, honouring the skip set of `analysis`.
    pub fn plan(
        &self,
        rows: &[Row],
        headers: &[String],
        analysis: Option<&ColumnAnalysis>,
    ) -> CoveragePlan {
        let total_rows = rows.len();
        let threshold = if self.adaptive {
            adaptive_threshold(total_rows)
        } else {
            self.base_threshold
        };

        let skip_columns = analysis.map(|a| a.skip_columns()).unwrap_or_default();
        let id_columns: BTreeSet<usize> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| self.id_matcher.is_id_column(h))
            .map(|(idx, _)| idx)
            .collect();

        let num_cols = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        let mut values: Vec<BTreeSet<&str>> = vec![BTreeSet::new(); num_cols];
        for row in rows {
            for (idx, cell) in row.iter().enumerate() {
                values[idx].insert(cell.as_str());
            }
        }

        let mut categorical = BTreeMap::new();
        if total_rows > 0 {
            for (idx, set) in values.into_iter().enumerate() {
                if skip_columns.contains(&idx) || id_columns.contains(&idx) {
                    continue;
                }
                let ratio = set.len() as f64 / total_rows as f64;
                if ratio <= threshold {
                    tracing::debug!(
                        column = %headers.get(idx).map(String::as_str).unwrap_or(""),
                        unique = set.len(),
                        "Categorical column"
                    );
                    categorical.insert(idx, set.into_iter().map(str::to_string).collect());
                }
            }
        }

        let numeric_ranges = analysis
            .map(|a| {
                a.numeric_ranges
                    .iter()
                    .filter(|(idx, _)| !skip_columns.contains(idx))
                    .map(|(idx, range)| (*idx, *range))
                    .collect()
            })
            .unwrap_or_default();

        let plan = CoveragePlan {
            categorical,
            id_columns,
            skip_columns,
            numeric_ranges,
            headers: headers.to_vec(),
            threshold,
            total_rows,
        };

        tracing::info!(
            rows = total_rows,
            threshold,
            categorical = plan.categorical.len(),
            values = plan.categorical.values().map(|v| v.len()).sum::<usize>(),
            numeric = plan.numeric_ranges.len(),
            id_columns = plan.id_columns.len(),
            "Coverage plan ready"
        );
        plan
    }
}

/// Mutable coverage bookkeeping for one sampling run.
#[derive(Debug, Clone, Default)]
pub struct CoverageState {
    uncovered: BTreeMap<usize, HashSet<String>>,
    ranges: BTreeMap<usize, (NumericRange, HashSet<RangeBucket>)>,
    epsilon: f64,
}

impl CoverageState {
    /// Whether `row` holds a categorical value not yet covered.
    pub fn has_uncovered_value(&self, row: &[String]) -> bool {
        self.uncovered.iter().any(|(idx, values)| {
            row.get(*idx)
                .map(|cell| values.contains(cell))
                .unwrap_or(false)
        })
    }

    /// Whether `row` holds a numeric value in a bucket not yet covered.
    pub fn has_uncovered_bucket(&self, row: &[String]) -> bool {
        self.ranges.iter().any(|(idx, (range, covered))| {
            row.get(*idx)
                .and_then(|cell| parse_numeric(cell))
                .map(|v| !covered.contains(&range.bucket(v, self.epsilon)))
                .unwrap_or(false)
        })
    }

    /// Marks the values and buckets of an accepted row as covered.
    pub fn mark_covered(&mut self, row: &[String]) {
        for (idx, values) in self.uncovered.iter_mut() {
            if let Some(cell) = row.get(*idx) {
                values.remove(cell);
            }
        }
        for (idx, (range, covered)) in self.ranges.iter_mut() {
            if let Some(v) = row.get(*idx).and_then(|cell| parse_numeric(cell)) {
                covered.insert(range.bucket(v, self.epsilon));
            }
        }
    }

    /// Whether every categorical value has been covered.
    pub fn all_categorical_covered(&self) -> bool {
        self.uncovered.values().all(HashSet::is_empty)
    }

    /// Number of categorical values still uncovered.
    pub fn uncovered_count(&self) -> usize {
        self.uncovered.values().map(HashSet::len).sum()
    }

    /// Per-column coverage statistics.
    pub fn stats(&self, plan: &CoveragePlan) -> Vec<ColumnCoverage> {
        let categorical = plan.categorical.iter().map(|(idx, values)| {
            let uncovered = self.uncovered.get(idx).map(HashSet::len).unwrap_or(0);
            ColumnCoverage {
                column: *idx,
                header: plan.header(*idx),
                kind: CoverageKind::Categorical,
                total: values.len(),
                covered: values.len() - uncovered,
            }
        });
        let numeric = self.ranges.iter().map(|(idx, (_, covered))| ColumnCoverage {
            column: *idx,
            header: plan.header(*idx),
            kind: CoverageKind::NumericRange,
            total: 6,
            covered: covered.len(),
        });
        categorical.chain(numeric).collect()
    }
}

/// What a coverage statistic counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageKind {
    Categorical,
    NumericRange,
}

/// Coverage of one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnCoverage {
    pub column: usize,
    pub header: String,
    pub kind: CoverageKind,
    /// Distinct values (or range buckets) to cover.
    pub total: usize,
    pub covered: usize,
}

impl ColumnCoverage {
    pub fn uncovered(&self) -> usize {
        self.total - self.covered
    }

    /// Covered share in percent.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.covered as f64 * 100.0 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ColumnAnalyzer;

    fn rows(n: usize) -> Vec<Row> {
        (0..n)
            .map(|i| {
                vec![
                    format!("region{}", i % 5),
                    format!("ID{}", i),
                    ((i * 37) % 90).to_string(),
                ]
            })
            .collect()
    }

    fn headers() -> Vec<String> {
        vec!["region".into(), "record_id".into(), "value".into()]
    }

    #[test]
    fn test_adaptive_threshold() {
        assert_eq!(adaptive_threshold(100), 0.2);
        assert_eq!(adaptive_threshold(499), 0.2);
        assert_eq!(adaptive_threshold(500), 0.1);
        assert_eq!(adaptive_threshold(1999), 0.1);
        assert_eq!(adaptive_threshold(2000), 0.05);
    }

    #[test]
    fn test_plan_detects_categorical_and_ids() {
        let config = SamplerConfig::default();
        let data = rows(100);
        let analysis = ColumnAnalyzer::new(&config).unwrap().analyze(&data, &headers());
        let plan = CoveragePlanner::new(&config).plan(&data, &headers(), Some(&analysis));

        assert_eq!(plan.categorical_columns().into_iter().collect::<Vec<_>>(), vec![0]);
        assert_eq!(plan.categorical[&0].len(), 5);
        assert!(plan.id_columns.contains(&1));
        assert!(plan.numeric_ranges.contains_key(&2));
    }

    #[test]
    fn test_fixed_threshold() {
        let config = SamplerConfig::new().with_categorical_threshold(0.01);
        let data = rows(100);
        let plan = CoveragePlanner::new(&config).plan(&data, &headers(), None);
        assert!(plan.categorical.is_empty());
        assert!(plan.numeric_ranges.is_empty());
    }

    #[test]
    fn test_skipped_columns_not_planned() {
        let config = SamplerConfig::default();
        let data: Vec<Row> = (0..50)
            .map(|i| vec!["same".to_string(), format!("g{}", i % 3)])
            .collect();
        let hdrs = vec!["constant".to_string(), "group".to_string()];
        let analysis = ColumnAnalyzer::new(&config).unwrap().analyze(&data, &hdrs);
        let plan = CoveragePlanner::new(&config).plan(&data, &hdrs, Some(&analysis));
        assert!(!plan.categorical.contains_key(&0));
        assert!(plan.categorical.contains_key(&1));
    }

    #[test]
    fn test_state_tracks_values_and_buckets() {
        let config = SamplerConfig::default();
        let data = rows(100);
        let analysis = ColumnAnalyzer::new(&config).unwrap().analyze(&data, &headers());
        let plan = CoveragePlanner::new(&config).plan(&data, &headers(), Some(&analysis));
        let mut state = plan.initial_state(config.range_epsilon);

        assert_eq!(state.uncovered_count(), 5);
        assert!(state.has_uncovered_value(&data[0]));
        state.mark_covered(&data[0]);
        assert!(!state.has_uncovered_value(&data[5]));
        assert!(state.has_uncovered_value(&data[1]));
        // row 0 holds the minimum, rows 5 and 3 (values 5 and 21) sit in q1
        assert!(state.has_uncovered_bucket(&data[5]));
        state.mark_covered(&data[5]);
        assert!(!state.has_uncovered_bucket(&data[3]));
        assert!(state.has_uncovered_bucket(&data[1]));

        for row in &data[1..5] {
            state.mark_covered(row);
        }
        assert!(state.all_categorical_covered());

        let stats = state.stats(&plan);
        assert_eq!(stats[0].covered, 5);
        assert_eq!(stats[0].uncovered(), 0);
        assert_eq!(stats[1].kind, CoverageKind::NumericRange);
    }
}
