//! Header and footer detection.
//!
//! Statistical tables often open with title lines and multi-row headers and
//! close with source notes. [`BoundaryScanner`] finds the data region of a
//! file in a single streaming pass while holding at most the first
//! [`HEADER_SCAN_ROWS`] rows and the last [`FOOTER_SCAN_ROWS`] rows.

use std::collections::VecDeque;

use crate::config::SamplerConfig;
use crate::io::Row;

/// Leading rows inspected by header detection.
pub const HEADER_SCAN_ROWS: usize = 10;

/// Only rows within this prefix can be counted as header rows.
pub const HEADER_CANDIDATE_ROWS: usize = 5;

/// Trailing rows inspected by footer detection.
pub const FOOTER_SCAN_ROWS: usize = 20;

/// Phrases that mark a title or metadata row (matched in lower case).
const METADATA_PHRASES: &[&str] = &[
    "table",
    "figure",
    "year:",
    "note",
    "source",
    "(number",
    "unnamed:",
];

/// Share of non-empty cells, relative to the average data row, below which a
/// trailing row looks like a footer.
const FOOTER_SPARSITY_RATIO: f64 = 0.3;

/// Data region of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBoundaries {
    /// Number of leading header rows.
    pub header_rows: usize,
    /// Row index one past the last data row.
    pub data_end: usize,
    /// Total rows in the file.
    pub row_count: usize,
    /// The header rows themselves.
    pub header: Vec<Row>,
}

impl FileBoundaries {
    /// Number of data rows between the header and the footer.
    pub fn data_rows(&self) -> usize {
        self.data_end.saturating_sub(self.header_rows)
    }

    /// Number of footer rows excluded at the end.
    pub fn footer_rows(&self) -> usize {
        self.row_count.saturating_sub(self.data_end.max(self.header_rows))
    }

    /// Whether row `index` lies inside the data region.
    pub fn is_data_row(&self, index: usize) -> bool {
        index >= self.header_rows && index < self.data_end
    }

    /// Column names: the last header row, or empty when there is none.
    pub fn column_names(&self) -> Vec<String> {
        self.header.last().cloned().unwrap_or_default()
    }
}

/// Streaming detector for the data region of a file.
pub struct BoundaryScanner<'a> {
    config: &'a SamplerConfig,
    fixed_header_rows: Option<usize>,
    head_capacity: usize,
    head: Vec<Row>,
    tail: VecDeque<(usize, Row)>,
    row_count: usize,
    header_rows: Option<usize>,
    baseline_cells: usize,
    baseline_rows: usize,
}

impl<'a> BoundaryScanner<'a> {
    /// Creates a scanner that detects header rows per the configuration.
    pub fn new(config: &'a SamplerConfig) -> Self {
        let fixed = config
            .header_rows
            .or((!config.auto_detect_headers).then_some(1));
        Self::build(config, fixed)
    }

    /// Creates a scanner with a known header row count (used for every file
    /// after the first so all inputs share one header layout).
    pub fn with_header_rows(config: &'a SamplerConfig, header_rows: usize) -> Self {
        Self::build(config, Some(header_rows))
    }

    fn build(config: &'a SamplerConfig, fixed_header_rows: Option<usize>) -> Self {
        Self {
            config,
            fixed_header_rows,
            head_capacity: HEADER_SCAN_ROWS.max(fixed_header_rows.unwrap_or(0)),
            head: Vec::new(),
            tail: VecDeque::with_capacity(FOOTER_SCAN_ROWS + 1),
            row_count: 0,
            header_rows: None,
            baseline_cells: 0,
            baseline_rows: 0,
        }
    }

    /// Feeds the next row of the file.
    pub fn push(&mut self, row: &[String]) {
        let index = self.row_count;
        self.row_count += 1;

        if self.head.len() < self.head_capacity {
            self.head.push(row.to_vec());
        }

        if !self.config.detect_footers {
            return;
        }

        self.tail.push_back((index, row.to_vec()));
        if self.tail.len() > FOOTER_SCAN_ROWS {
            if let Some((evicted, evicted_row)) = self.tail.pop_front() {
                // the head is full by now, so the header count is final
                let header_rows = self.resolve_header_rows();
                if evicted >= header_rows {
                    self.baseline_cells += non_empty_cells(&evicted_row);
                    self.baseline_rows += 1;
                }
            }
        }
    }

    fn resolve_header_rows(&mut self) -> usize {
        if let Some(n) = self.header_rows {
            return n;
        }
        let n = self
            .fixed_header_rows
            .unwrap_or_else(|| detect_header_rows(&self.head));
        self.header_rows = Some(n);
        n
    }

    /// Finishes the pass and reports the data region.
    pub fn finish(mut self) -> FileBoundaries {
        let header_rows = self.resolve_header_rows();
        let mut data_end = self.row_count;

        if self.config.detect_footers {
            let tail: Vec<(usize, Row)> = self
                .tail
                .into_iter()
                .filter(|(index, _)| *index >= header_rows)
                .collect();
            let baseline = if self.baseline_rows > 0 {
                self.baseline_cells as f64 / self.baseline_rows as f64
            } else {
                0.0
            };
            if let Some(start) = footer_start_in_tail(&tail, baseline, &self.config.footer_keywords)
            {
                data_end = start;
            }
        }

        let header_len = header_rows.min(self.head.len());
        self.head.truncate(header_len);

        FileBoundaries {
            header_rows,
            data_end: data_end.max(header_rows.min(self.row_count)),
            row_count: self.row_count,
            header: self.head,
        }
    }
}

/// Counts the header rows at the top of a table.
///
/// Rows are examined from the top; counting stops at the first row that
/// looks like data or at [`HEADER_CANDIDATE_ROWS`]. The result is at least 1.
pub fn detect_header_rows(rows: &[Row]) -> usize {
    let count = rows
        .iter()
        .take(HEADER_SCAN_ROWS.min(HEADER_CANDIDATE_ROWS))
        .take_while(|row| is_header_like(row))
        .count();
    count.max(1)
}

/// Whether a row looks like a header or title row: mostly empty, a metadata
/// phrase in the first cell, or almost free of numbers.
pub fn is_header_like(row: &[String]) -> bool {
    if row.is_empty() {
        return true;
    }

    let cells = row.len() as f64;
    let empty = row.iter().filter(|c| c.trim().is_empty()).count() as f64;
    if empty / cells > 0.5 {
        return true;
    }

    let first = row[0].trim().to_lowercase();
    if METADATA_PHRASES.iter().any(|phrase| first.contains(phrase)) {
        return true;
    }

    let numeric = row.iter().filter(|c| is_header_numeric(c)).count() as f64;
    numeric / cells < 0.1
}

fn is_header_numeric(cell: &str) -> bool {
    let cleaned: String = cell
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '%')
        .collect();
    !cleaned.is_empty() && cleaned.parse::<f64>().map(|v| v.is_finite()).unwrap_or(false)
}

/// First trailing row that is a footer. `baseline` is the average number of
/// non-empty cells over the data rows preceding the tail.
fn footer_start_in_tail(tail: &[(usize, Row)], baseline: f64, keywords: &[String]) -> Option<usize> {
    let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();

    tail.iter()
        .filter(|(_, row)| !row.is_empty())
        .find(|(_, row)| is_footer_row(row, baseline, &keywords))
        .map(|(idx, _)| *idx)
}

fn is_footer_row(row: &[String], baseline: f64, keywords: &[String]) -> bool {
    let first = row
        .first()
        .map(|c| c.trim().to_lowercase())
        .unwrap_or_default();
    if keywords.iter().any(|k| first.contains(k.as_str())) {
        return true;
    }

    baseline > 0.0 && (non_empty_cells(row) as f64) < baseline * FOOTER_SPARSITY_RATIO
}

fn non_empty_cells(row: &[String]) -> usize {
    row.iter().filter(|c| !c.trim().is_empty()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|c| c.to_string()).collect()
    }

    /// Footer start computed over a fully materialized table whose data
    /// begins at `start`; `rows.len()` when there is no footer.
    fn materialized_footer_start(rows: &[Row], start: usize, keywords: &[String]) -> usize {
        let start = start.min(rows.len());
        let check_from = start.max(rows.len().saturating_sub(FOOTER_SCAN_ROWS));
        let body = &rows[start..check_from];
        let baseline = if body.is_empty() {
            0.0
        } else {
            body.iter().map(|r| non_empty_cells(r)).sum::<usize>() as f64 / body.len() as f64
        };

        let tail: Vec<(usize, Row)> = rows
            .iter()
            .enumerate()
            .skip(check_from)
            .map(|(idx, row)| (idx, row.clone()))
            .collect();

        footer_start_in_tail(&tail, baseline, keywords).unwrap_or(rows.len())
    }

    fn scan(config: &SamplerConfig, rows: &[Row]) -> FileBoundaries {
        let mut scanner = BoundaryScanner::new(config);
        for r in rows {
            scanner.push(r);
        }
        scanner.finish()
    }

    fn data_table(n: usize) -> Vec<Row> {
        let mut rows = vec![row(&["region", "year", "value"])];
        for i in 0..n {
            rows.push(vec![format!("r{}", i % 3), "2020".to_string(), i.to_string()]);
        }
        rows
    }

    #[test]
    fn test_single_header_row() {
        let rows = data_table(30);
        assert_eq!(detect_header_rows(&rows), 1);
        let b = scan(&SamplerConfig::default(), &rows);
        assert_eq!(b.header_rows, 1);
        assert_eq!(b.data_end, 31);
        assert_eq!(b.data_rows(), 30);
        assert_eq!(b.column_names(), row(&["region", "year", "value"]));
    }

    #[test]
    fn test_title_and_header_rows() {
        let mut rows = vec![row(&["Table 4. Population by region", "", ""])];
        rows.extend(data_table(30));
        let b = scan(&SamplerConfig::default(), &rows);
        assert_eq!(b.header_rows, 2);
        assert_eq!(b.header.len(), 2);
        assert_eq!(b.column_names()[0], "region");
    }

    #[test]
    fn test_header_candidates_limited_to_first_five() {
        let rows: Vec<Row> = (0..8).map(|_| row(&["a", "b"])).collect();
        assert_eq!(detect_header_rows(&rows), 5);
    }

    #[test]
    fn test_header_count_stops_at_first_data_row() {
        let rows = vec![
            row(&["Table 2", "", ""]),
            row(&["region", "year", "value"]),
            row(&["north", "2020", "5"]),
            row(&["Note", "", ""]),
        ];
        assert_eq!(detect_header_rows(&rows), 2);
    }

    #[test]
    fn test_numeric_row_is_not_header() {
        assert!(!is_header_like(&row(&["x", "1,234", "45%"])));
        assert!(is_header_like(&row(&["Source: survey", "1", "2"])));
        assert!(is_header_like(&row(&["", "", "3"])));
    }

    #[test]
    fn test_footer_by_keyword() {
        let mut rows = data_table(30);
        rows.push(row(&["Source: national office", "", ""]));
        rows.push(row(&["* provisional", "", ""]));
        let b = scan(&SamplerConfig::default(), &rows);
        assert_eq!(b.data_end, 31);
        assert_eq!(b.footer_rows(), 2);
        assert_eq!(materialized_footer_start(&rows, 1, &SamplerConfig::default().footer_keywords), 31);
    }

    #[test]
    fn test_footer_by_sparsity() {
        let mut rows = data_table(40);
        rows.push(row(&["", "", ""]));
        rows.push(row(&["r1", "", "5"]));
        let b = scan(&SamplerConfig::default(), &rows);
        assert_eq!(b.data_end, 41);
    }

    #[test]
    fn test_footer_keyword_inside_short_file() {
        let mut rows = data_table(5);
        rows.push(row(&["Note: revised", "", ""]));
        let b = scan(&SamplerConfig::default(), &rows);
        assert_eq!(b.header_rows, 1);
        assert_eq!(b.data_end, 6);
    }

    #[test]
    fn test_footer_detection_disabled() {
        let mut rows = data_table(30);
        rows.push(row(&["Source: x", "", ""]));
        let config = SamplerConfig::new().with_footer_detection(false);
        let b = scan(&config, &rows);
        assert_eq!(b.data_end, rows.len());
    }

    #[test]
    fn test_pinned_header_rows() {
        let rows = data_table(30);
        let config = SamplerConfig::new().with_header_rows(3);
        let b = scan(&config, &rows);
        assert_eq!(b.header_rows, 3);
        assert_eq!(b.header.len(), 3);
        assert_eq!(b.data_rows(), 28);
    }

    #[test]
    fn test_streaming_matches_materialized() {
        let mut rows = vec![row(&["Table 1", "", ""])];
        rows.extend(data_table(60));
        rows.push(row(&["Footnote 1", "", ""]));
        let config = SamplerConfig::default();
        let b = scan(&config, &rows);
        let expected = materialized_footer_start(&rows, b.header_rows, &config.footer_keywords);
        assert_eq!(b.data_end, expected);
    }

    #[test]
    fn test_materialized_footer_start_past_end() {
        let rows = data_table(3);
        let keywords = SamplerConfig::default().footer_keywords;
        assert_eq!(materialized_footer_start(&rows, 10, &keywords), rows.len());
        assert_eq!(materialized_footer_start(&[], 1, &keywords), 0);
    }

    #[test]
    fn test_empty_file() {
        let b = scan(&SamplerConfig::default(), &[]);
        assert_eq!(b.header_rows, 1);
        assert_eq!(b.data_rows(), 0);
        assert_eq!(b.row_count, 0);
    }
}
