//! The row selection policy.

use std::collections::BTreeSet;

use rand::RngExt;
use rand_chacha::ChaCha8Rng;
use regex::Regex;

use super::{AcceptReason, AggregationMatcher, Decision, RejectReason, RowOrdinal, SelectionMode};
use super::state::SelectionState;
use crate::config::{SamplerConfig, DEFAULT_COLUMN_REGEX};
use crate::coverage::{CoveragePlan, CoverageState};
use crate::error::SamplerError;
use crate::metrics::SamplerCounters;

/// Columns forming the fallback signature when there are no categorical columns.
const FALLBACK_SIGNATURE_COLUMNS: usize = 5;

/// Streaming keep/drop policy for data rows.
///
/// Rules, first match wins:
/// 1. output cap reached (unless categorical coverage is still incomplete in
///    coverage mode): reject
/// 2. signature or exact row content already accepted: reject
/// 3. aggregation row beyond the aggregation cap: reject
/// 4. coverage mode: uncovered categorical value, then uncovered numeric
///    bucket, then a random draw once categorical coverage is complete
/// 5. legacy mode: a value seen fewer than `rows_per_key` times, then a
///    random draw
#[derive(Debug, Clone)]
pub struct RowSelector {
    mode: SelectionMode,
    output_cap: usize,
    legacy_limit: usize,
    rows_per_key: usize,
    uniques_per_column: usize,
    max_aggregation_rows: usize,
    sample_rate: f64,
    aggregation: Option<AggregationMatcher>,
    value_pattern: Regex,
    skip_columns: BTreeSet<usize>,
    categorical_columns: Vec<usize>,
    tracked_columns: Option<BTreeSet<usize>>,
    coverage: CoverageState,
    state: SelectionState,
    counters: SamplerCounters,
}

impl RowSelector {
    /// Creates a selector.
    ///
    /// With a coverage `plan` the selector runs in coverage mode, otherwise in
    /// legacy mode. `tracked_columns` restricts legacy value tracking to the
    /// given columns.
    pub fn new(
        config: &SamplerConfig,
        plan: Option<&CoveragePlan>,
        tracked_columns: Option<BTreeSet<usize>>,
        sample_rate: f64,
    ) -> Result<Self, SamplerError> {
        let value_pattern = Regex::new(
            config
                .column_regex
                .as_deref()
                .unwrap_or(DEFAULT_COLUMN_REGEX),
        )?;

        let (mode, coverage, skip_columns, categorical_columns) = match plan {
            Some(plan) => (
                SelectionMode::Coverage,
                plan.initial_state(config.range_epsilon),
                plan.skip_columns.clone(),
                plan.categorical.keys().copied().collect(),
            ),
            None => (
                SelectionMode::Legacy,
                CoverageState::default(),
                BTreeSet::new(),
                Vec::new(),
            ),
        };

        Ok(Self {
            mode,
            output_cap: config.output_cap(),
            legacy_limit: config.output_rows,
            rows_per_key: config.rows_per_key,
            uniques_per_column: config.uniques_per_column,
            max_aggregation_rows: config.max_aggregation_rows,
            sample_rate: sample_rate.clamp(0.0, 1.0),
            aggregation: config
                .detect_aggregation
                .then(|| {
                    AggregationMatcher::new(&config.aggregation_keywords)
                        .with_whole_words(config.aggregation_whole_words)
                }),
            value_pattern,
            skip_columns,
            categorical_columns,
            tracked_columns,
            coverage,
            state: SelectionState::new(),
            counters: SamplerCounters::default(),
        })
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn coverage(&self) -> &CoverageState {
        &self.coverage
    }

    pub fn counters(&self) -> &SamplerCounters {
        &self.counters
    }

    /// Decides on a row without recording it.
    pub fn evaluate(&self, row: &[String], rng: &mut ChaCha8Rng) -> Decision {
        if self.cap_reached() {
            return Decision::Reject(RejectReason::OutputCap);
        }

        if self.is_duplicate(row) {
            return Decision::Reject(RejectReason::Duplicate);
        }

        if self.is_aggregation(row) && self.aggregation_cap_reached() {
            return Decision::Reject(RejectReason::AggregationCap);
        }

        match self.mode {
            SelectionMode::Coverage => self.evaluate_coverage(row, rng),
            SelectionMode::Legacy => self.evaluate_legacy(row, rng),
        }
    }

    fn evaluate_coverage(&self, row: &[String], rng: &mut ChaCha8Rng) -> Decision {
        if self.coverage.has_uncovered_value(row) {
            return Decision::Accept(AcceptReason::Coverage);
        }
        if self.coverage.has_uncovered_bucket(row) {
            return Decision::Accept(AcceptReason::Range);
        }
        if self.coverage.all_categorical_covered() && self.draw(rng) {
            return Decision::Accept(AcceptReason::RandomFill);
        }
        Decision::Reject(RejectReason::NotNeeded)
    }

    fn evaluate_legacy(&self, row: &[String], rng: &mut ChaCha8Rng) -> Decision {
        if self.legacy_limit > 0 && self.state.selected_rows() >= self.legacy_limit {
            return Decision::Reject(RejectReason::LegacyLimit);
        }

        let has_new_value = self.tracked_values(row).any(|(idx, value)| {
            let count = self.state.value_count(idx, value);
            (count == 0 || count < self.rows_per_key)
                && self.state.distinct_values(idx) < self.uniques_per_column
        });
        if has_new_value {
            return Decision::Accept(AcceptReason::LegacyUnique);
        }

        if self.draw(rng) {
            return Decision::Accept(AcceptReason::LegacySampled);
        }
        Decision::Reject(RejectReason::NotNeeded)
    }

    fn draw(&self, rng: &mut ChaCha8Rng) -> bool {
        self.sample_rate > 0.0 && rng.random::<f64>() < self.sample_rate
    }

    /// Evaluates a row and records it when accepted.
    pub fn offer(&mut self, ordinal: RowOrdinal, row: &[String], rng: &mut ChaCha8Rng) -> Decision {
        let decision = self.evaluate(row, rng);
        tracing::trace!(source = ordinal.source, row = ordinal.row, ?decision, "Row decision");
        self.counters.record(&decision);
        if decision.is_accept() {
            self.record(ordinal, row);
        }
        decision
    }

    /// Records a row added by the reconcile pass.
    pub fn accept_top_up(&mut self, ordinal: RowOrdinal, row: &[String]) {
        let decision = Decision::Accept(AcceptReason::TopUp);
        self.counters.record(&decision);
        self.record(ordinal, row);
    }

    fn record(&mut self, ordinal: RowOrdinal, row: &[String]) {
        let signature = self.signature(row);
        let is_aggregation = self.is_aggregation(row);
        self.state.record(ordinal, row, signature, is_aggregation);
        self.coverage.mark_covered(row);

        let values: Vec<(usize, String)> = self
            .tracked_values(row)
            .map(|(idx, value)| (idx, value.to_string()))
            .collect();
        for (idx, value) in values {
            self.state.count_value(idx, &value);
        }
    }

    /// Deduplication signature of a row.
    ///
    /// Built from the categorical columns, or from the first five non-skipped
    /// columns when there are none. `None` when neither is available, in which
    /// case the row is never a duplicate.
    pub fn signature(&self, row: &[String]) -> Option<Vec<String>> {
        let keys: Vec<String> = self
            .categorical_columns
            .iter()
            .filter_map(|&idx| row.get(idx).cloned())
            .collect();
        if !keys.is_empty() {
            return Some(keys);
        }

        let fallback: Vec<String> = row
            .iter()
            .enumerate()
            .filter(|(idx, _)| !self.skip_columns.contains(idx))
            .take(FALLBACK_SIGNATURE_COLUMNS)
            .map(|(_, cell)| cell.clone())
            .collect();
        (fallback.len() == FALLBACK_SIGNATURE_COLUMNS).then_some(fallback)
    }

    /// Whether `row` repeats the signature or the exact cells of an
    /// accepted row.
    pub fn is_duplicate(&self, row: &[String]) -> bool {
        self.state.has_row(row)
            || self
                .signature(row)
                .is_some_and(|signature| self.state.has_signature(&signature))
    }

    pub fn is_aggregation(&self, row: &[String]) -> bool {
        self.aggregation
            .as_ref()
            .is_some_and(|matcher| matcher.is_aggregation(row))
    }

    pub fn aggregation_cap_reached(&self) -> bool {
        self.state.aggregation_rows() >= self.max_aggregation_rows
    }

    /// Whether accepting `row` would cover a categorical value or numeric
    /// bucket the output still lacks.
    pub fn extends_coverage(&self, row: &[String]) -> bool {
        self.coverage.has_uncovered_value(row) || self.coverage.has_uncovered_bucket(row)
    }

    /// Whether the output cap binds: reached, and not overridden by
    /// incomplete categorical coverage.
    fn cap_reached(&self) -> bool {
        if self.output_cap == 0 || self.state.selected_rows() < self.output_cap {
            return false;
        }
        !(self.mode == SelectionMode::Coverage && !self.coverage.all_categorical_covered())
    }

    /// Whether no further row of the main pass can be accepted.
    pub fn is_finished(&self) -> bool {
        if self.cap_reached() {
            return true;
        }
        self.mode == SelectionMode::Legacy
            && self.legacy_limit > 0
            && self.state.selected_rows() >= self.legacy_limit
    }

    fn tracked_values<'r>(&'r self, row: &'r [String]) -> impl Iterator<Item = (usize, &'r str)> + 'r {
        row.iter().enumerate().filter_map(move |(idx, value)| {
            let tracked = !self.skip_columns.contains(&idx)
                && self
                    .tracked_columns
                    .as_ref()
                    .map_or(true, |columns| columns.contains(&idx));
            (tracked && self.value_pattern.is_match(value)).then_some((idx, value.as_str()))
        })
    }
}
