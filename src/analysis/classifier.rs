//! Column analyzer.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::numeric::{parse_numeric, NumericRange};
use super::rules::DerivedRuleSet;
use super::{ColumnAnalysis, ColumnKind, RedundantPair};
use crate::config::SamplerConfig;
use crate::error::SamplerError;
use crate::io::Row;

/// Share of non-empty cells that must parse for a column to be numeric.
const NUMERIC_SHARE: f64 = 0.8;

/// Share of empty cells above which a column is treated as empty.
const EMPTY_SHARE: f64 = 0.95;

/// Unique ratio above which long text is metadata.
const METADATA_UNIQUE_RATIO: f64 = 0.9;

/// Rows sampled by the percentage-relationship test.
const PERCENTAGE_SAMPLE_ROWS: usize = 10;

/// Classifies columns by statistical role.
#[derive(Debug, Clone)]
pub struct ColumnAnalyzer {
    constant_threshold: f64,
    correlation_threshold: f64,
    metadata_min_length: usize,
    derived_tolerance: f64,
    rules: DerivedRuleSet,
}

/// Per-column accumulators over the analyzed rows.
struct ColumnStats<'r> {
    unique: HashSet<&'r str>,
    empty: usize,
    total_len: usize,
    /// Parsed value per row, `None` for non-numeric cells.
    numeric: Vec<Option<f64>>,
    numeric_count: usize,
    is_numeric: bool,
}

impl ColumnAnalyzer {
    /// Creates an analyzer with the thresholds of `config`.
    pub fn new(config: &SamplerConfig) -> Result<Self, SamplerError> {
        Ok(Self {
            constant_threshold: config.constant_threshold,
            correlation_threshold: config.correlation_threshold,
            metadata_min_length: config.metadata_min_length,
            derived_tolerance: config.derived_tolerance,
            rules: DerivedRuleSet::builtin()?,
        })
    }

    /// Classifies every column of `rows`.
    ///
    /// Columns are taken from `headers`, or from the first row when there are
    /// no headers. Missing trailing cells count as empty.
    pub fn analyze(&self, rows: &[Row], headers: &[String]) -> ColumnAnalysis {
        let num_rows = rows.len();
        let num_cols = if headers.is_empty() {
            rows.first().map(|r| r.len()).unwrap_or(0)
        } else {
            headers.len()
        };
        let headers: Vec<String> = (0..num_cols)
            .map(|i| headers.get(i).cloned().unwrap_or_default())
            .collect();

        if num_rows == 0 {
            // nothing to look at: every column is constant
            return ColumnAnalysis {
                num_rows,
                constant: (0..num_cols).collect(),
                unique_counts: vec![0; num_cols],
                kinds: vec![ColumnKind::Constant; num_cols],
                headers,
                ..Default::default()
            };
        }

        let stats = collect_stats(rows, num_cols);

        let constant = self.detect_constant(&stats, &headers, num_rows);
        let metadata = self.detect_metadata(&stats, &headers, num_rows);
        let redundant_pairs = self.detect_redundant_pairs(rows, &stats, &headers);
        let derived = self.detect_derived(&stats, &headers);

        let numeric_ranges: BTreeMap<usize, NumericRange> = stats
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_numeric)
            .filter_map(|(idx, s)| {
                let values: Vec<f64> = s.numeric.iter().flatten().copied().collect();
                NumericRange::from_values(&values).map(|r| (idx, r))
            })
            .collect();

        let redundant: BTreeSet<usize> = redundant_pairs.iter().map(|p| p.column_b).collect();
        let kinds: Vec<ColumnKind> = (0..num_cols)
            .map(|idx| {
                if constant.contains(&idx) {
                    ColumnKind::Constant
                } else if derived.contains(&idx) {
                    ColumnKind::Derived
                } else if metadata.contains(&idx) {
                    ColumnKind::Metadata
                } else if redundant.contains(&idx) {
                    ColumnKind::Redundant
                } else if numeric_ranges.contains_key(&idx) {
                    ColumnKind::Numeric
                } else {
                    ColumnKind::Text
                }
            })
            .collect();

        tracing::info!(
            columns = num_cols,
            rows = num_rows,
            constant = constant.len(),
            derived = derived.len(),
            metadata = metadata.len(),
            redundant_pairs = redundant_pairs.len(),
            "Column analysis complete"
        );

        ColumnAnalysis {
            num_rows,
            unique_counts: stats.iter().map(|s| s.unique.len()).collect(),
            headers,
            constant,
            metadata,
            derived,
            redundant_pairs,
            numeric_ranges,
            kinds,
        }
    }

    fn detect_constant(
        &self,
        stats: &[ColumnStats<'_>],
        headers: &[String],
        num_rows: usize,
    ) -> BTreeSet<usize> {
        let mut constant = BTreeSet::new();
        for (idx, s) in stats.iter().enumerate() {
            let header = headers[idx].trim();
            if header.is_empty() {
                tracing::debug!(column = idx, "Empty header");
                constant.insert(idx);
                continue;
            }

            let unique_ratio = s.unique.len() as f64 / num_rows as f64;
            let empty_ratio = s.empty as f64 / num_rows as f64;
            // strict: a ratio equal to the threshold is not constant
            if unique_ratio < self.constant_threshold || s.unique.len() <= 1 || empty_ratio > EMPTY_SHARE
            {
                tracing::debug!(
                    column = %header,
                    unique = s.unique.len(),
                    empty_ratio,
                    "Constant column"
                );
                constant.insert(idx);
            }
        }
        constant
    }

    fn detect_metadata(
        &self,
        stats: &[ColumnStats<'_>],
        headers: &[String],
        num_rows: usize,
    ) -> BTreeSet<usize> {
        let mut metadata = BTreeSet::new();
        for (idx, s) in stats.iter().enumerate() {
            let avg_len = s.total_len as f64 / num_rows as f64;
            let unique_ratio = s.unique.len() as f64 / num_rows as f64;
            if avg_len >= self.metadata_min_length as f64 && unique_ratio > METADATA_UNIQUE_RATIO {
                tracing::debug!(column = %headers[idx], avg_len, "Metadata column");
                metadata.insert(idx);
            }
        }
        metadata
    }

    fn detect_redundant_pairs(
        &self,
        rows: &[Row],
        stats: &[ColumnStats<'_>],
        headers: &[String],
    ) -> Vec<RedundantPair> {
        let mut pairs = Vec::new();
        for a in 0..stats.len() {
            let unique_a = stats[a].unique.len();
            if unique_a <= 1 {
                continue;
            }
            for b in (a + 1)..stats.len() {
                if stats[b].unique.len() != unique_a {
                    continue;
                }
                if self.is_bijection(rows, a, b) {
                    tracing::debug!(
                        column_a = %headers[a],
                        column_b = %headers[b],
                        "Redundant column pair"
                    );
                    pairs.push(RedundantPair {
                        column_a: a,
                        column_b: b,
                    });
                }
            }
        }
        pairs
    }

    fn is_bijection(&self, rows: &[Row], a: usize, b: usize) -> bool {
        let mut forward: HashMap<&str, &str> = HashMap::new();
        let mut backward: HashMap<&str, &str> = HashMap::new();
        let mut co_populated = 0usize;

        for row in rows {
            let (Some(va), Some(vb)) = (row.get(a), row.get(b)) else {
                continue;
            };
            co_populated += 1;
            if *forward.entry(va).or_insert(vb) != vb.as_str() {
                return false;
            }
            if *backward.entry(vb).or_insert(va) != va.as_str() {
                return false;
            }
        }

        co_populated as f64 >= rows.len() as f64 * self.correlation_threshold
    }

    fn detect_derived(&self, stats: &[ColumnStats<'_>], headers: &[String]) -> BTreeSet<usize> {
        let mut derived = BTreeSet::new();

        for (idx, header) in headers.iter().enumerate() {
            if self.rules.is_derived(header, headers) {
                tracing::debug!(column = %header, "Derived column by name");
                derived.insert(idx);
            }
        }

        let numeric: Vec<usize> = (0..stats.len()).filter(|&i| stats[i].is_numeric).collect();
        for &pct in &numeric {
            if derived.contains(&pct) || !looks_like_percentage(&stats[pct]) {
                continue;
            }
            let base = numeric.iter().copied().find(|&base| {
                base != pct
                    && stats[base].numeric_count == stats[pct].numeric_count
                    && self.is_percentage_of(&stats[pct], &stats[base])
            });
            if let Some(base) = base {
                tracing::debug!(
                    column = %headers[pct],
                    base = %headers[base],
                    "Derived percentage column"
                );
                derived.insert(pct);
            }
        }

        derived
    }

    /// Whether `pct` is consistently `base / total * 100` for one total.
    fn is_percentage_of(&self, pct: &ColumnStats<'_>, base: &ColumnStats<'_>) -> bool {
        let pairs: Vec<(f64, f64)> = pct
            .numeric
            .iter()
            .zip(&base.numeric)
            .filter_map(|(p, b)| Some(((*p)?, (*b)?)))
            .collect();
        if pairs.is_empty() {
            return false;
        }

        let sample_size = PERCENTAGE_SAMPLE_ROWS.min(pairs.len());
        let step = (pairs.len() / sample_size).max(1);
        let totals: Vec<f64> = pairs
            .iter()
            .step_by(step)
            .take(sample_size)
            .filter(|(p, _)| *p > 0.0)
            .map(|(p, b)| b / (p / 100.0))
            .collect();
        if totals.is_empty() {
            return false;
        }

        let mean = totals.iter().sum::<f64>() / totals.len() as f64;
        if mean == 0.0 {
            return false;
        }
        totals
            .iter()
            .all(|t| ((t - mean) / mean).abs() <= self.derived_tolerance)
    }
}

fn collect_stats(rows: &[Row], num_cols: usize) -> Vec<ColumnStats<'_>> {
    let mut stats: Vec<ColumnStats<'_>> = (0..num_cols)
        .map(|_| ColumnStats {
            unique: HashSet::new(),
            empty: 0,
            total_len: 0,
            numeric: Vec::with_capacity(rows.len()),
            numeric_count: 0,
            is_numeric: false,
        })
        .collect();

    for row in rows {
        for (idx, s) in stats.iter_mut().enumerate() {
            let cell = row.get(idx).map(String::as_str).unwrap_or("");
            s.unique.insert(cell);
            s.total_len += cell.chars().count();
            if cell.trim().is_empty() {
                s.empty += 1;
            }
            let value = parse_numeric(cell);
            if value.is_some() {
                s.numeric_count += 1;
            }
            s.numeric.push(value);
        }
    }

    for s in &mut stats {
        let non_empty = rows.len() - s.empty;
        s.is_numeric = s.numeric_count > 0 && s.numeric_count as f64 >= non_empty as f64 * NUMERIC_SHARE;
    }
    stats
}

fn looks_like_percentage(stats: &ColumnStats<'_>) -> bool {
    stats
        .numeric
        .iter()
        .flatten()
        .all(|v| (0.0..=100.0).contains(v))
}
