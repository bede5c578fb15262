//! Sampling orchestration.
//!
//! [`DataSampler`] reads its sources in up to three passes:
//!
//! 1. a prescan that finds the header and footer of every file and, when
//!    coverage planning is enabled, materializes the data rows for column
//!    classification and coverage planning;
//! 2. the main pass, which writes the header rows and then every data row the
//!    [`RowSelector`] accepts;
//! 3. a reconcile pass that tops the output up toward the row targets.
//!
//! Inputs at or below `min_rows` data rows are copied verbatim instead.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::analysis::{ColumnAnalysis, ColumnAnalyzer, ColumnKind, ColumnProfile, RedundantPair};
use crate::boundary::{BoundaryScanner, FileBoundaries};
use crate::config::SamplerConfig;
use crate::coverage::{ColumnCoverage, CoveragePlan, CoveragePlanner};
use crate::error::SamplerError;
use crate::io::{resolve_inputs, CsvFileSource, CsvSink, Row, RowSink, TableSource};
use crate::metrics::SamplerCounters;
use crate::reconcile::{Candidate, OutputReconciler};
use crate::selection::{RowOrdinal, RowSelector, SelectionMode};

/// File name of the output written next to the first input by default.
pub const DEFAULT_OUTPUT_FILE: &str = "sampled_data.csv";

/// Column names listed per category in the analysis log.
const REPORT_NAME_LIMIT: usize = 10;

/// Outcome of a sampling run.
#[derive(Debug, Clone, Serialize)]
pub struct SampleReport {
    pub input_files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    pub header_rows: usize,
    /// Data rows across all inputs, headers and footers excluded.
    pub data_rows: usize,
    /// Whether the input was copied verbatim.
    pub passthrough: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<SelectionMode>,
    pub sample_rate: f64,
    /// Data rows accepted by the main pass.
    pub selected_rows: usize,
    /// Data rows added by the reconcile pass.
    pub top_up_rows: usize,
    /// Data rows written.
    pub output_rows: usize,
    pub coverage: Vec<ColumnCoverage>,
    pub columns: Vec<ColumnProfile>,
    pub counters: SamplerCounters,
}

impl SampleReport {
    fn empty(input_files: Vec<String>) -> Self {
        Self {
            input_files,
            output: None,
            header_rows: 0,
            data_rows: 0,
            passthrough: false,
            mode: None,
            sample_rate: 0.0,
            selected_rows: 0,
            top_up_rows: 0,
            output_rows: 0,
            coverage: Vec::new(),
            columns: Vec::new(),
            counters: SamplerCounters::default(),
        }
    }
}

/// A categorical column and the values it takes.
#[derive(Debug, Clone, Serialize)]
pub struct CategoricalSummary {
    pub column: usize,
    pub header: String,
    pub values: Vec<String>,
}

/// Column analysis of the inputs, without sampling.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub input_files: Vec<String>,
    pub header_rows: usize,
    pub data_rows: usize,
    pub footer_rows: usize,
    pub categorical_threshold: f64,
    pub columns: Vec<ColumnProfile>,
    pub redundant_pairs: Vec<RedundantPair>,
    pub categorical: Vec<CategoricalSummary>,
    pub id_columns: Vec<String>,
}

/// Prescan results shared by sampling and analysis.
struct Prescan {
    boundaries: Vec<FileBoundaries>,
    /// Data rows of every file, when materialized.
    data: Vec<Row>,
    input_rows: usize,
}

impl Prescan {
    fn header(&self) -> &[Row] {
        self.boundaries
            .first()
            .map(|b| b.header.as_slice())
            .unwrap_or_default()
    }

    fn column_names(&self) -> Vec<String> {
        self.boundaries
            .first()
            .map(FileBoundaries::column_names)
            .unwrap_or_default()
    }

    fn header_rows(&self) -> usize {
        self.boundaries.first().map(|b| b.header_rows).unwrap_or(0)
    }

    fn data_rows(&self) -> usize {
        self.boundaries.iter().map(FileBoundaries::data_rows).sum()
    }

    fn footer_rows(&self) -> usize {
        self.boundaries.iter().map(FileBoundaries::footer_rows).sum()
    }
}

/// Samples representative rows from one or more tables.
pub struct DataSampler {
    config: SamplerConfig,
    rng: ChaCha8Rng,
}

impl DataSampler {
    /// Creates a sampler, seeding its RNG from `config.seed` or from entropy.
    pub fn new(config: SamplerConfig) -> Result<Self, SamplerError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };
        Ok(Self { config, rng })
    }

    /// Replaces the RNG.
    pub fn with_rng(mut self, rng: ChaCha8Rng) -> Self {
        self.rng = rng;
        self
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Samples `sources` into `sink`.
    ///
    /// All sources must share one header layout; only the header rows of the
    /// first source are written.
    pub fn sample<S: TableSource>(
        &mut self,
        sources: &[S],
        sink: &mut dyn RowSink,
    ) -> Result<SampleReport, SamplerError> {
        let input_files: Vec<String> = sources.iter().map(|s| s.name().to_string()).collect();
        if sources.is_empty() {
            return Ok(SampleReport::empty(input_files));
        }

        let planning = self.config.coverage_planning_enabled();
        let prescan = self.prescan(sources, planning)?;
        let header_rows = prescan.header_rows();
        let data_rows = prescan.data_rows();

        let mut counters = SamplerCounters {
            input_rows: prescan.input_rows as u64,
            footer_rows: prescan.footer_rows() as u64,
            ..Default::default()
        };

        let tracked_columns = self.map_unique_columns(prescan.header())?;

        tracing::info!(
            files = sources.len(),
            rows = prescan.input_rows,
            header_rows,
            data_rows,
            footer_rows = prescan.footer_rows(),
            "Prescan complete"
        );

        if data_rows <= self.config.min_rows {
            tracing::info!(
                data_rows,
                min_rows = self.config.min_rows,
                "Input at or below minimum, copying verbatim"
            );
            return self.copy_verbatim(sources, &prescan, sink, counters, input_files);
        }

        let sample_rate = self.sample_rate(data_rows);
        let names = prescan.column_names();

        let (analysis, plan) = if planning && !prescan.data.is_empty() {
            let analysis = if self.config.smart_columns {
                let analysis = ColumnAnalyzer::new(&self.config)?.analyze(&prescan.data, &names);
                log_analysis(&analysis);
                Some(analysis)
            } else {
                None
            };
            let plan =
                CoveragePlanner::new(&self.config).plan(&prescan.data, &names, analysis.as_ref());
            (analysis, Some(plan))
        } else {
            (None, None)
        };
        let boundaries = prescan.boundaries;

        let mut selector =
            RowSelector::new(&self.config, plan.as_ref(), tracked_columns, sample_rate)?;
        tracing::info!(mode = %selector.mode(), sample_rate, "Selecting rows");

        // main pass
        let header = boundaries.first().map(|b| b.header.as_slice()).unwrap_or_default();
        for row in header {
            sink.write_row(row)?;
        }
        counters.header_rows = header.len() as u64;

        'files: for (source_idx, (source, bounds)) in sources.iter().zip(&boundaries).enumerate() {
            for (row_idx, row) in source.rows()?.enumerate() {
                let row = row?;
                if row_idx >= bounds.data_end {
                    break;
                }
                if !bounds.is_data_row(row_idx) {
                    continue;
                }
                let ordinal = RowOrdinal::new(source_idx, row_idx);
                if selector.offer(ordinal, &row, &mut self.rng).is_accept() {
                    sink.write_row(&row)?;
                }
                if selector.is_finished() {
                    tracing::debug!(file = source.name(), row = row_idx, "Stopping early");
                    break 'files;
                }
            }
        }
        let selected_rows = selector.state().selected_rows();

        if let Some(plan) = &plan {
            for stat in selector.coverage().stats(plan) {
                tracing::info!(
                    column = %stat.header,
                    kind = ?stat.kind,
                    covered = stat.covered,
                    total = stat.total,
                    "Coverage"
                );
            }
        }

        // reconcile pass
        let reconciler = OutputReconciler::new(&self.config);
        let mut top_up_rows = 0;
        if reconciler.shortfall(selected_rows, data_rows - selected_rows) > 0 {
            let candidates = collect_candidates(sources, &boundaries, &reconciler, &selector)?;
            let shortfall = reconciler.shortfall(selected_rows, candidates.len());
            let chosen = reconciler.choose(candidates, shortfall, &mut selector, &mut self.rng);
            tracing::info!(
                selected = selected_rows,
                added = chosen.len(),
                min_rows = self.config.min_rows,
                max_rows = self.config.max_rows,
                "Topping up output"
            );
            for (_, row) in &chosen {
                sink.write_row(row)?;
            }
            top_up_rows = chosen.len();
        }
        sink.flush()?;

        let output_rows = selected_rows + top_up_rows;
        counters.merge(selector.counters());
        counters.output_rows = (header.len() + output_rows) as u64;

        let coverage = plan
            .as_ref()
            .map(|p| selector.coverage().stats(p))
            .unwrap_or_default();
        let columns = analysis
            .as_ref()
            .map(|a| {
                let categorical = plan.as_ref().map(CoveragePlan::categorical_columns).unwrap_or_default();
                a.profiles(&categorical)
            })
            .unwrap_or_default();

        tracing::info!(
            input_rows = counters.input_rows,
            selected = selected_rows,
            top_up = top_up_rows,
            output_rows,
            "Sampling complete"
        );

        Ok(SampleReport {
            input_files,
            output: None,
            header_rows: header.len(),
            data_rows,
            passthrough: false,
            mode: Some(selector.mode()),
            sample_rate,
            selected_rows,
            top_up_rows,
            output_rows,
            coverage,
            columns,
            counters,
        })
    }

    /// Classifies the columns of `sources` and plans coverage without
    /// sampling.
    pub fn analyze<S: TableSource>(&self, sources: &[S]) -> Result<AnalysisReport, SamplerError> {
        let prescan = self.prescan(sources, true)?;
        let names = prescan.column_names();
        let analysis = ColumnAnalyzer::new(&self.config)?.analyze(&prescan.data, &names);
        log_analysis(&analysis);
        let plan = CoveragePlanner::new(&self.config).plan(&prescan.data, &names, Some(&analysis));

        let header_of = |idx: usize| names.get(idx).cloned().unwrap_or_default();
        Ok(AnalysisReport {
            input_files: sources.iter().map(|s| s.name().to_string()).collect(),
            header_rows: prescan.header_rows(),
            data_rows: prescan.data_rows(),
            footer_rows: prescan.footer_rows(),
            categorical_threshold: plan.threshold,
            columns: analysis.profiles(&plan.categorical_columns()),
            redundant_pairs: analysis.redundant_pairs.clone(),
            categorical: plan
                .categorical
                .iter()
                .map(|(idx, values)| CategoricalSummary {
                    column: *idx,
                    header: header_of(*idx),
                    values: values.iter().cloned().collect(),
                })
                .collect(),
            id_columns: plan.id_columns.iter().map(|idx| header_of(*idx)).collect(),
        })
    }

    fn prescan<S: TableSource>(&self, sources: &[S], materialize: bool) -> Result<Prescan, SamplerError> {
        let mut boundaries: Vec<FileBoundaries> = Vec::with_capacity(sources.len());
        let mut data = Vec::new();
        let mut input_rows = 0;

        for source in sources {
            let mut scanner = match boundaries.first() {
                Some(first) => BoundaryScanner::with_header_rows(&self.config, first.header_rows),
                None => BoundaryScanner::new(&self.config),
            };
            let mut rows = Vec::new();
            for row in source.rows()? {
                let row = row?;
                scanner.push(&row);
                if materialize {
                    rows.push(row);
                }
            }
            let bounds = scanner.finish();
            tracing::debug!(
                file = source.name(),
                rows = bounds.row_count,
                header_rows = bounds.header_rows,
                data_end = bounds.data_end,
                "Scanned file"
            );

            input_rows += bounds.row_count;
            if materialize {
                let end = bounds.data_end.min(rows.len());
                let start = bounds.header_rows.min(end);
                data.extend(rows.drain(start..end));
            }
            boundaries.push(bounds);
        }

        Ok(Prescan {
            boundaries,
            data,
            input_rows,
        })
    }

    /// Maps `unique_columns` to indices across the header rows; a later
    /// header row overrides an earlier match.
    fn map_unique_columns(&self, header: &[Row]) -> Result<Option<BTreeSet<usize>>, SamplerError> {
        let wanted = &self.config.unique_columns;
        if wanted.is_empty() {
            return Ok(None);
        }

        let mut found: BTreeMap<&str, usize> = BTreeMap::new();
        for row in header {
            for (idx, cell) in row.iter().enumerate() {
                if let Some(name) = wanted.iter().find(|name| *name == cell) {
                    found.insert(name.as_str(), idx);
                }
            }
        }

        let missing: Vec<String> = wanted
            .iter()
            .filter(|name| !found.contains_key(name.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            tracing::error!(
                ?missing,
                header_rows = header.len(),
                "Unique columns not found in header rows"
            );
            return Err(SamplerError::MissingUniqueColumns { missing });
        }

        Ok(Some(found.into_values().collect()))
    }

    /// Acceptance probability for the random rules.
    fn sample_rate(&self, data_rows: usize) -> f64 {
        match self.config.sample_rate {
            Some(rate) => rate,
            None if self.config.output_rows > 0 && data_rows > 0 => {
                (self.config.output_rows as f64 / data_rows as f64).min(1.0)
            }
            None => 0.0,
        }
    }

    fn copy_verbatim<S: TableSource>(
        &self,
        sources: &[S],
        prescan: &Prescan,
        sink: &mut dyn RowSink,
        mut counters: SamplerCounters,
        input_files: Vec<String>,
    ) -> Result<SampleReport, SamplerError> {
        let header_rows = prescan.header_rows();
        let mut written = 0usize;
        let mut copied = 0usize;

        for (source_idx, (source, bounds)) in sources.iter().zip(&prescan.boundaries).enumerate() {
            for (row_idx, row) in source.rows()?.enumerate() {
                let row = row?;
                let is_header = row_idx < bounds.header_rows;
                if is_header && source_idx > 0 {
                    continue;
                }
                sink.write_row(&row)?;
                written += 1;
                if !is_header {
                    copied += 1;
                }
            }
        }
        sink.flush()?;

        counters.header_rows = header_rows.min(written) as u64;
        counters.passthrough_rows = copied as u64;
        counters.output_rows = written as u64;

        Ok(SampleReport {
            header_rows,
            data_rows: prescan.data_rows(),
            passthrough: true,
            output_rows: copied,
            counters,
            ..SampleReport::empty(input_files)
        })
    }
}

fn collect_candidates<S: TableSource>(
    sources: &[S],
    boundaries: &[FileBoundaries],
    reconciler: &OutputReconciler,
    selector: &RowSelector,
) -> Result<Vec<Candidate>, SamplerError> {
    let mut candidates = Vec::new();
    for (source_idx, (source, bounds)) in sources.iter().zip(boundaries).enumerate() {
        for (row_idx, row) in source.rows()?.enumerate() {
            let row = row?;
            if row_idx >= bounds.data_end {
                break;
            }
            if !bounds.is_data_row(row_idx) {
                continue;
            }
            let ordinal = RowOrdinal::new(source_idx, row_idx);
            if reconciler.is_candidate(selector, ordinal, &row) {
                candidates.push((ordinal, row));
            }
        }
    }
    Ok(candidates)
}

fn log_analysis(analysis: &ColumnAnalysis) {
    let names = |kind: ColumnKind| -> Vec<&str> {
        analysis
            .kinds
            .iter()
            .enumerate()
            .filter(|(_, k)| **k == kind)
            .map(|(idx, _)| analysis.headers.get(idx).map(String::as_str).unwrap_or(""))
            .take(REPORT_NAME_LIMIT)
            .collect()
    };

    tracing::info!(
        columns = analysis.num_columns(),
        rows = analysis.num_rows,
        constant = analysis.constant.len(),
        metadata = analysis.metadata.len(),
        derived = analysis.derived.len(),
        redundant = analysis.redundant_pairs.len(),
        numeric = analysis.numeric_ranges.len(),
        "Column analysis"
    );
    for kind in [
        ColumnKind::Constant,
        ColumnKind::Metadata,
        ColumnKind::Derived,
        ColumnKind::Redundant,
    ] {
        let listed = names(kind);
        if !listed.is_empty() {
            tracing::info!(kind = %kind, columns = ?listed, "Skipped columns");
        }
    }
}

/// Samples the CSV file(s) named by `input` into `output`.
///
/// `input` may be a path, a comma-separated list of paths, or a glob pattern.
/// Without `output`, the sample is written to `sampled_data.csv` beside the
/// first input. Returns `Ok(None)` when no input file exists.
pub fn sample_csv_file(
    input: &str,
    output: Option<&Path>,
    config: SamplerConfig,
) -> Result<Option<SampleReport>, SamplerError> {
    let paths = resolve_inputs(input)?;
    let Some(first) = paths.first() else {
        tracing::warn!(input, "No input files found");
        return Ok(None);
    };

    let output = match output {
        Some(path) => path.to_path_buf(),
        None => default_output_path(first),
    };

    let sources = paths
        .iter()
        .map(|path| CsvFileSource::open(path, &config))
        .collect::<Result<Vec<_>, _>>()?;
    let delimiter = match config.output_delimiter {
        Some(c) => c as u8,
        None => sources.first().map(TableSource::delimiter).unwrap_or(b','),
    };

    let mut sampler = DataSampler::new(config)?;
    let mut sink = CsvSink::create(&output, delimiter)?;
    let mut report = sampler.sample(&sources, &mut sink)?;
    sink.into_inner()?;

    tracing::info!(
        files = paths.len(),
        output = %output.display(),
        rows = report.output_rows,
        "Wrote sample"
    );
    report.output = Some(output);
    Ok(Some(report))
}

/// `sampled_data.csv` in the directory of `input`.
pub fn default_output_path(input: &Path) -> PathBuf {
    input
        .parent()
        .map(|dir| dir.join(DEFAULT_OUTPUT_FILE))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{InMemorySource, MemorySink};

    fn table(n: usize) -> InMemorySource {
        let mut rows = vec![vec!["region".to_string(), "value".to_string()]];
        rows.extend((0..n).map(|i| vec![format!("region{}", i % 4), ((i * 37) % 500).to_string()]));
        InMemorySource::new("table", rows)
    }

    #[test]
    fn test_sample_rate_derivation() {
        let sampler = DataSampler::new(SamplerConfig::new().with_seed(1)).unwrap();
        assert_eq!(sampler.sample_rate(1000), 0.1);
        assert_eq!(sampler.sample_rate(50), 1.0);

        let fixed = DataSampler::new(SamplerConfig::new().with_sample_rate(0.3)).unwrap();
        assert_eq!(fixed.sample_rate(1000), 0.3);

        let none = DataSampler::new(SamplerConfig::new().with_output_rows(0)).unwrap();
        assert_eq!(none.sample_rate(1000), 0.0);
    }

    #[test]
    fn test_sample_writes_header_first() {
        let mut sampler = DataSampler::new(SamplerConfig::new().with_seed(3)).unwrap();
        let mut sink = MemorySink::new();
        let report = sampler.sample(&[table(300)], &mut sink).unwrap();

        assert_eq!(sink.rows[0], vec!["region".to_string(), "value".to_string()]);
        assert_eq!(sink.rows.len(), report.output_rows + 1);
        assert_eq!(report.mode, Some(SelectionMode::Coverage));
        assert_eq!(report.header_rows, 1);
        assert_eq!(report.data_rows, 300);
        assert!(report.output_rows >= 40 && report.output_rows <= 80);
        assert_eq!(report.counters.input_rows, 301);
        assert_eq!(report.counters.output_rows, sink.rows.len() as u64);
    }

    #[test]
    fn test_passthrough_small_input() {
        let mut sampler = DataSampler::new(SamplerConfig::new().with_seed(3)).unwrap();
        let mut sink = MemorySink::new();
        let source = table(20);
        let report = sampler.sample(&[source.clone()], &mut sink).unwrap();

        assert!(report.passthrough);
        assert_eq!(sink.rows.len(), 21);
        assert_eq!(report.counters.passthrough_rows, 20);
    }

    #[test]
    fn test_missing_unique_columns() {
        let config = SamplerConfig::new()
            .with_coverage(false)
            .with_unique_columns(vec!["region".to_string(), "country".to_string()]);
        let mut sampler = DataSampler::new(config).unwrap();
        let mut sink = MemorySink::new();
        let err = sampler.sample(&[table(100)], &mut sink).unwrap_err();
        match err {
            SamplerError::MissingUniqueColumns { missing } => {
                assert_eq!(missing, vec!["country".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(sink.rows.is_empty());
    }

    #[test]
    fn test_analyze_reports_columns() {
        let sampler = DataSampler::new(SamplerConfig::default()).unwrap();
        let report = sampler.analyze(&[table(200)]).unwrap();
        assert_eq!(report.data_rows, 200);
        assert_eq!(report.columns.len(), 2);
        assert_eq!(report.columns[0].kind, ColumnKind::Categorical);
        assert_eq!(report.categorical.len(), 1);
        assert_eq!(report.categorical[0].values.len(), 4);
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("/data/in.csv")),
            PathBuf::from("/data/sampled_data.csv")
        );
    }
}
