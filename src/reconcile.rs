//! Top-up of the main-pass output toward the row targets.
//!
//! After the main pass the output may hold fewer rows than `min_rows`, or
//! fewer than the `max_rows` soft target. The reconciler picks extra rows from
//! the data rows the main pass did not accept, preferring rows that still add
//! coverage, then rows with an unseen signature, then anything else. A row
//! whose cells exactly repeat an accepted row is never added.

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use crate::config::SamplerConfig;
use crate::io::Row;
use crate::selection::{RowOrdinal, RowSelector};

/// A data row eligible for top-up.
pub type Candidate = (RowOrdinal, Row);

/// Computes the shortfall and chooses the rows that fill it.
#[derive(Debug, Clone)]
pub struct OutputReconciler {
    min_rows: usize,
    max_rows: usize,
    top_up: bool,
}

impl OutputReconciler {
    pub fn new(config: &SamplerConfig) -> Self {
        Self {
            min_rows: config.min_rows,
            max_rows: config.max_rows,
            top_up: config.top_up_to_target,
        }
    }

    /// Rows to add given `selected` accepted rows and `available` candidates.
    pub fn shortfall(&self, selected: usize, available: usize) -> usize {
        if selected < self.min_rows {
            (self.min_rows - selected).min(available)
        } else if self.top_up && selected < self.max_rows {
            (self.max_rows - selected).min(available)
        } else {
            0
        }
    }

    /// Whether a data row may be offered to [`choose`](Self::choose).
    ///
    /// Rows already accepted, exact copies of accepted rows, and aggregation
    /// rows beyond the cap are excluded.
    pub fn is_candidate(&self, selector: &RowSelector, ordinal: RowOrdinal, row: &[String]) -> bool {
        !selector.state().is_selected(ordinal)
            && !selector.state().has_row(row)
            && !Self::over_aggregation_cap(selector, row)
    }

    fn over_aggregation_cap(selector: &RowSelector, row: &[String]) -> bool {
        selector.is_aggregation(row) && selector.aggregation_cap_reached()
    }

    /// Picks up to `shortfall` rows from `candidates`, records them in
    /// `selector`, and returns them in a random order.
    pub fn choose(
        &self,
        candidates: Vec<Candidate>,
        shortfall: usize,
        selector: &mut RowSelector,
        rng: &mut ChaCha8Rng,
    ) -> Vec<Candidate> {
        if shortfall == 0 {
            return Vec::new();
        }

        let mut covering = Vec::new();
        let mut fresh = Vec::new();
        let mut rest = Vec::new();
        for candidate in candidates {
            if selector.extends_coverage(&candidate.1) {
                covering.push(candidate);
            } else if has_fresh_signature(selector, &candidate.1) {
                fresh.push(candidate);
            } else {
                rest.push(candidate);
            }
        }
        tracing::debug!(
            covering = covering.len(),
            fresh = fresh.len(),
            rest = rest.len(),
            shortfall,
            "Top-up candidate tiers"
        );

        let mut chosen = Vec::with_capacity(shortfall);

        // Coverage can be completed by an earlier pick, so each tier re-checks
        // its condition and demotes rows that no longer qualify.
        covering.shuffle(rng);
        for (ordinal, row) in covering {
            if chosen.len() == shortfall {
                break;
            }
            if selector.extends_coverage(&row) {
                self.take(selector, &mut chosen, ordinal, row);
            } else if has_fresh_signature(selector, &row) {
                fresh.push((ordinal, row));
            } else {
                rest.push((ordinal, row));
            }
        }

        fresh.shuffle(rng);
        for (ordinal, row) in fresh {
            if chosen.len() == shortfall {
                break;
            }
            if has_fresh_signature(selector, &row) {
                self.take(selector, &mut chosen, ordinal, row);
            } else {
                rest.push((ordinal, row));
            }
        }

        rest.shuffle(rng);
        for (ordinal, row) in rest {
            if chosen.len() == shortfall {
                break;
            }
            self.take(selector, &mut chosen, ordinal, row);
        }

        chosen.shuffle(rng);
        chosen
    }

    fn take(
        &self,
        selector: &mut RowSelector,
        chosen: &mut Vec<Candidate>,
        ordinal: RowOrdinal,
        row: Row,
    ) {
        // exact copies among the candidates themselves
        if selector.state().has_row(&row) || Self::over_aggregation_cap(selector, &row) {
            return;
        }
        selector.accept_top_up(ordinal, &row);
        chosen.push((ordinal, row));
    }
}

fn has_fresh_signature(selector: &RowSelector, row: &[String]) -> bool {
    selector
        .signature(row)
        .map_or(true, |signature| !selector.state().has_signature(&signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ColumnAnalyzer;
    use crate::coverage::CoveragePlanner;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn rows(n: usize) -> Vec<Row> {
        (0..n)
            .map(|i| vec![format!("region{}", i % 3), ((i * 37) % 101).to_string()])
            .collect()
    }

    fn headers() -> Vec<String> {
        vec!["region".to_string(), "value".to_string()]
    }

    fn selector_for(config: &SamplerConfig, data: &[Row]) -> RowSelector {
        let analysis = ColumnAnalyzer::new(config).unwrap().analyze(data, &headers());
        let plan = CoveragePlanner::new(config).plan(data, &headers(), Some(&analysis));
        RowSelector::new(config, Some(&plan), None, 0.0).unwrap()
    }

    #[test]
    fn test_shortfall() {
        let reconciler = OutputReconciler::new(&SamplerConfig::default());
        assert_eq!(reconciler.shortfall(10, 1000), 30);
        assert_eq!(reconciler.shortfall(10, 5), 5);
        assert_eq!(reconciler.shortfall(50, 1000), 30);
        assert_eq!(reconciler.shortfall(50, 12), 12);
        assert_eq!(reconciler.shortfall(80, 1000), 0);

        let no_top_up = OutputReconciler::new(&SamplerConfig::new().with_top_up(false));
        assert_eq!(no_top_up.shortfall(50, 1000), 0);
        assert_eq!(no_top_up.shortfall(10, 1000), 30);
    }

    #[test]
    fn test_choose_fills_shortfall_without_reselecting() {
        let config = SamplerConfig::default();
        let data = rows(200);
        let mut selector = selector_for(&config, &data);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        for (i, row) in data.iter().enumerate() {
            selector.offer(RowOrdinal::new(0, i), row, &mut rng);
        }
        let selected = selector.state().selected_rows();
        let reconciler = OutputReconciler::new(&config);

        let candidates: Vec<Candidate> = data
            .iter()
            .enumerate()
            .map(|(i, row)| (RowOrdinal::new(0, i), row.clone()))
            .filter(|(ordinal, row)| reconciler.is_candidate(&selector, *ordinal, row))
            .collect();
        assert_eq!(candidates.len(), data.len() - selected);

        let shortfall = reconciler.shortfall(selected, candidates.len());
        let chosen = reconciler.choose(candidates, shortfall, &mut selector, &mut rng);

        assert_eq!(chosen.len(), shortfall);
        assert_eq!(selector.state().selected_rows(), selected + shortfall);
        assert_eq!(selector.counters().top_up_rows, shortfall as u64);
        let unique: HashSet<RowOrdinal> = chosen.iter().map(|(o, _)| *o).collect();
        assert_eq!(unique.len(), chosen.len());
    }

    #[test]
    fn test_choose_prefers_covering_rows() {
        let config = SamplerConfig::default();
        let data = rows(200);
        let mut selector = selector_for(&config, &data);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        // nothing accepted yet: a single pick must add coverage
        let candidates: Vec<Candidate> = data
            .iter()
            .enumerate()
            .map(|(i, row)| (RowOrdinal::new(0, i), row.clone()))
            .collect();
        let reconciler = OutputReconciler::new(&config);
        let chosen = reconciler.choose(candidates, 1, &mut selector, &mut rng);
        assert_eq!(chosen.len(), 1);
        assert_eq!(selector.coverage().uncovered_count(), 2);
    }

    #[test]
    fn test_choose_respects_aggregation_cap() {
        let config = SamplerConfig::new()
            .with_coverage(false)
            .with_max_aggregation_rows(1);
        let mut selector = RowSelector::new(&config, None, None, 0.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let candidates: Vec<Candidate> = (0..4)
            .map(|i| {
                (
                    RowOrdinal::new(0, i),
                    vec!["Total".to_string(), i.to_string()],
                )
            })
            .collect();

        let reconciler = OutputReconciler::new(&config);
        let chosen = reconciler.choose(candidates, 4, &mut selector, &mut rng);
        assert_eq!(chosen.len(), 1);
        assert_eq!(selector.state().aggregation_rows(), 1);
    }

    #[test]
    fn test_choose_skips_exact_copies() {
        let config = SamplerConfig::new().with_coverage(false);
        let mut selector = RowSelector::new(&config, None, None, 0.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let copy = vec!["north".to_string(), "apples".to_string(), "10".to_string()];
        selector.accept_top_up(RowOrdinal::new(0, 0), &copy);

        let reconciler = OutputReconciler::new(&config);
        assert!(!reconciler.is_candidate(&selector, RowOrdinal::new(0, 1), &copy));

        let other = vec!["south".to_string(), "pears".to_string(), "3".to_string()];
        let candidates: Vec<Candidate> = (1..6)
            .map(|i| (RowOrdinal::new(0, i), other.clone()))
            .collect();
        let chosen = reconciler.choose(candidates, 5, &mut selector, &mut rng);
        assert_eq!(chosen.len(), 1);
        assert_eq!(chosen[0].1, other);
    }
}
