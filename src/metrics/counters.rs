//! Row outcome counters for a sampling run.

use serde::Serialize;

use crate::selection::{AcceptReason, Decision, RejectReason};

/// Per-outcome row counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SamplerCounters {
    /// Rows read, boundaries included.
    pub input_rows: u64,
    pub header_rows: u64,
    pub footer_rows: u64,
    /// Data rows copied verbatim by the passthrough path.
    pub passthrough_rows: u64,
    pub duplicate_skipped: u64,
    pub aggregation_skipped: u64,
    pub cap_skipped: u64,
    pub not_selected: u64,
    pub legacy_limit_skipped: u64,
    pub coverage_selected: u64,
    pub range_selected: u64,
    pub random_fill: u64,
    pub legacy_unique_selected: u64,
    pub legacy_sampled: u64,
    pub top_up_rows: u64,
    /// Rows written, header rows included.
    pub output_rows: u64,
}

impl SamplerCounters {
    /// Counts one row decision.
    pub fn record(&mut self, decision: &Decision) {
        let slot = match decision {
            Decision::Accept(AcceptReason::Coverage) => &mut self.coverage_selected,
            Decision::Accept(AcceptReason::Range) => &mut self.range_selected,
            Decision::Accept(AcceptReason::RandomFill) => &mut self.random_fill,
            Decision::Accept(AcceptReason::LegacyUnique) => &mut self.legacy_unique_selected,
            Decision::Accept(AcceptReason::LegacySampled) => &mut self.legacy_sampled,
            Decision::Accept(AcceptReason::TopUp) => &mut self.top_up_rows,
            Decision::Reject(RejectReason::OutputCap) => &mut self.cap_skipped,
            Decision::Reject(RejectReason::Duplicate) => &mut self.duplicate_skipped,
            Decision::Reject(RejectReason::AggregationCap) => &mut self.aggregation_skipped,
            Decision::Reject(RejectReason::NotNeeded) => &mut self.not_selected,
            Decision::Reject(RejectReason::LegacyLimit) => &mut self.legacy_limit_skipped,
        };
        *slot += 1;
    }

    /// Adds every count of `other` to this one.
    pub fn merge(&mut self, other: &SamplerCounters) {
        for ((_, mine), (_, theirs)) in self.outcomes_mut().into_iter().zip(other.outcomes()) {
            *mine += theirs;
        }
    }

    /// Data rows accepted by the main pass and the reconcile pass.
    pub fn selected_rows(&self) -> u64 {
        self.coverage_selected
            + self.range_selected
            + self.random_fill
            + self.legacy_unique_selected
            + self.legacy_sampled
            + self.top_up_rows
    }

    /// Counts keyed by outcome label.
    pub fn outcomes(&self) -> [(&'static str, u64); 16] {
        [
            ("input", self.input_rows),
            ("header", self.header_rows),
            ("footer", self.footer_rows),
            ("passthrough", self.passthrough_rows),
            ("duplicate", self.duplicate_skipped),
            ("aggregation_cap", self.aggregation_skipped),
            ("output_cap", self.cap_skipped),
            ("not_needed", self.not_selected),
            ("legacy_limit", self.legacy_limit_skipped),
            ("coverage", self.coverage_selected),
            ("range", self.range_selected),
            ("random_fill", self.random_fill),
            ("legacy_unique", self.legacy_unique_selected),
            ("legacy_sampled", self.legacy_sampled),
            ("top_up", self.top_up_rows),
            ("output", self.output_rows),
        ]
    }

    fn outcomes_mut(&mut self) -> [(&'static str, &mut u64); 16] {
        [
            ("input", &mut self.input_rows),
            ("header", &mut self.header_rows),
            ("footer", &mut self.footer_rows),
            ("passthrough", &mut self.passthrough_rows),
            ("duplicate", &mut self.duplicate_skipped),
            ("aggregation_cap", &mut self.aggregation_skipped),
            ("output_cap", &mut self.cap_skipped),
            ("not_needed", &mut self.not_selected),
            ("legacy_limit", &mut self.legacy_limit_skipped),
            ("coverage", &mut self.coverage_selected),
            ("range", &mut self.range_selected),
            ("random_fill", &mut self.random_fill),
            ("legacy_unique", &mut self.legacy_unique_selected),
            ("legacy_sampled", &mut self.legacy_sampled),
            ("top_up", &mut self.top_up_rows),
            ("output", &mut self.output_rows),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_decisions() {
        let mut counters = SamplerCounters::default();
        counters.record(&Decision::Accept(AcceptReason::Coverage));
        counters.record(&Decision::Accept(AcceptReason::TopUp));
        counters.record(&Decision::Reject(RejectReason::Duplicate));
        counters.record(&Decision::Reject(RejectReason::Duplicate));

        assert_eq!(counters.coverage_selected, 1);
        assert_eq!(counters.top_up_rows, 1);
        assert_eq!(counters.duplicate_skipped, 2);
        assert_eq!(counters.selected_rows(), 2);
    }

    #[test]
    fn test_merge() {
        let mut a = SamplerCounters {
            input_rows: 10,
            range_selected: 2,
            ..Default::default()
        };
        let b = SamplerCounters {
            input_rows: 5,
            output_rows: 3,
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.input_rows, 15);
        assert_eq!(a.range_selected, 2);
        assert_eq!(a.output_rows, 3);
    }
}
