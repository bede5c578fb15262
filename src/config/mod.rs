//! Sampler configuration.
//!
//! [`SamplerConfig`] gathers every tunable of the sampling pipeline: output
//! sizing, coverage planning, column analysis, aggregation handling, file
//! boundary detection, and CSV dialect. A configuration can be assembled
//! with builder methods, loaded from a YAML file, parsed from string
//! `key = value` options, or overridden from `SAMPLER_*` environment
//! variables. Every entry point finishes with [`SamplerConfig::validate`].

mod options;

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use options::OPTION_KEYS;

/// Errors that can occur while building or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An option key is not recognized.
    #[error("Unknown option: {0}")]
    UnknownOption(String),

    /// An option has a value that cannot be parsed.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// A YAML configuration file could not be parsed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Default aggregation keywords matched against the leading cells of a row.
pub const DEFAULT_AGGREGATION_KEYWORDS: &[&str] = &[
    "Total", "All", "Sum", "Overall", "National", "Combined", "WHOLE", "Entire", "Grand",
];

/// Default footer keywords matched against the first cell of trailing rows.
pub const DEFAULT_FOOTER_KEYWORDS: &[&str] =
    &["Source", "Note", "Data from", "Footnote", "*", "†", "‡"];

/// Default substrings that mark a header as an identifier column.
pub const DEFAULT_ID_COLUMN_PATTERNS: &[&str] = &["ID", "CODE", "FIPS", "KEY"];

/// Cell-value pattern used in legacy mode when none is configured.
pub const DEFAULT_COLUMN_REGEX: &str = "^[0-9]{4}$|[a-zA-Z-]";

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Configuration for the representative data sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    // Output sizing
    /// Nominal sample size; also drives the default sample rate.
    #[serde(alias = "sampler_output_rows")]
    pub output_rows: usize,
    /// Minimum number of data rows to emit (files at or below this are copied whole).
    #[serde(alias = "sampler_min_rows")]
    pub min_rows: usize,
    /// Soft maximum used as the output cap when `max_output_rows` is 0.
    #[serde(alias = "sampler_max_rows")]
    pub max_rows: usize,
    /// Hard cap on data rows emitted by the main pass (0 = use `max_rows`).
    #[serde(alias = "sampler_max_output_rows")]
    pub max_output_rows: usize,
    /// Explicit random-fill probability; derived from `output_rows` when unset.
    #[serde(alias = "sampler_rate")]
    pub sample_rate: Option<f64>,
    /// Whether the reconcile pass tops the output up toward `max_rows`.
    #[serde(alias = "sampler_top_up")]
    pub top_up_to_target: bool,

    // Legacy selection
    /// Maximum rows kept per distinct value of a tracked column.
    #[serde(alias = "sampler_rows_per_key")]
    pub rows_per_key: usize,
    /// Maximum distinct values tracked per column.
    #[serde(alias = "sampler_uniques_per_column")]
    pub uniques_per_column: usize,
    /// Pattern a cell value must match to count as a distinct legacy value
    /// (the default pattern applies when unset).
    #[serde(alias = "sampler_column_regex")]
    pub column_regex: Option<String>,
    /// Explicit tracked column names; every name must exist in the header rows.
    #[serde(alias = "sampler_unique_columns")]
    pub unique_columns: Vec<String>,

    // Coverage planning
    /// Enable the coverage-driven selection pipeline.
    #[serde(alias = "sampler_ensure_coverage")]
    pub ensure_coverage: bool,
    /// Detect categorical columns during the prescan.
    #[serde(alias = "sampler_auto_detect_categorical")]
    pub auto_detect_categorical: bool,
    /// Fixed categorical threshold used when `adaptive_threshold` is off.
    #[serde(alias = "sampler_categorical_threshold")]
    pub categorical_threshold: f64,
    /// Pick the categorical threshold from the data row count.
    #[serde(alias = "sampler_adaptive_threshold")]
    pub adaptive_threshold: bool,
    /// Case-insensitive substrings that mark a header as an identifier column.
    #[serde(alias = "sampler_id_column_patterns")]
    pub id_column_patterns: Vec<String>,
    /// Tolerance used when snapping a value to a range extreme.
    #[serde(alias = "sampler_range_epsilon")]
    pub range_epsilon: f64,

    // Column analysis
    /// Run the column classifier before coverage planning.
    #[serde(alias = "sampler_smart_columns")]
    pub smart_columns: bool,
    /// Unique ratio below which a column is considered constant.
    ///
    /// The comparison is strict: 5 values over 500 rows (exactly 0.01 at the
    /// default) stays a categorical column.
    #[serde(alias = "sampler_constant_threshold")]
    pub constant_threshold: f64,
    /// Minimum share of co-populated rows for a redundant pair.
    #[serde(alias = "sampler_correlation_threshold")]
    pub correlation_threshold: f64,
    /// Minimum average cell length for a metadata column.
    #[serde(alias = "sampler_metadata_min_length")]
    pub metadata_min_length: usize,
    /// Relative tolerance for the implied-total percentage test.
    #[serde(alias = "sampler_derived_tolerance")]
    pub derived_tolerance: f64,

    // Aggregation rows
    /// Recognize summary rows by their leading cells.
    #[serde(alias = "sampler_detect_aggregation")]
    pub detect_aggregation: bool,
    /// Keywords that mark an aggregation row.
    #[serde(alias = "sampler_aggregation_keywords")]
    pub aggregation_keywords: Vec<String>,
    /// Match aggregation keywords as whole words instead of substrings.
    #[serde(alias = "sampler_aggregation_whole_words")]
    pub aggregation_whole_words: bool,
    /// Maximum aggregation rows admitted to the output.
    #[serde(alias = "sampler_max_aggregation_rows")]
    pub max_aggregation_rows: usize,

    // File boundaries
    /// Fixed number of header rows; auto-detected when unset.
    #[serde(alias = "sampler_header_rows")]
    pub header_rows: Option<usize>,
    /// Detect header rows heuristically when `header_rows` is unset.
    #[serde(alias = "sampler_auto_detect_headers")]
    pub auto_detect_headers: bool,
    /// Exclude trailing footer rows from sampling.
    #[serde(alias = "sampler_detect_footers")]
    pub detect_footers: bool,
    /// Keywords that mark a footer row.
    #[serde(alias = "sampler_footer_keywords")]
    pub footer_keywords: Vec<String>,

    // CSV dialect
    /// Input field delimiter; sniffed from the file when unset.
    pub input_delimiter: Option<char>,
    /// Output field delimiter; mirrors the input delimiter when unset.
    pub output_delimiter: Option<char>,
    /// Input encoding label; detected from the file when unset.
    pub input_encoding: Option<String>,

    // Randomness
    /// Seed for reproducible sampling (None = non-deterministic).
    #[serde(alias = "sampler_seed")]
    pub seed: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            output_rows: 100,
            min_rows: 40,
            max_rows: 80,
            max_output_rows: 0,
            sample_rate: None,
            top_up_to_target: true,

            rows_per_key: 5,
            uniques_per_column: 10,
            column_regex: None,
            unique_columns: Vec::new(),

            ensure_coverage: true,
            auto_detect_categorical: true,
            categorical_threshold: 0.1,
            adaptive_threshold: true,
            id_column_patterns: to_strings(DEFAULT_ID_COLUMN_PATTERNS),
            range_epsilon: 0.001,

            smart_columns: true,
            constant_threshold: 0.01,
            correlation_threshold: 0.95,
            metadata_min_length: 50,
            derived_tolerance: 0.01,

            detect_aggregation: true,
            aggregation_keywords: to_strings(DEFAULT_AGGREGATION_KEYWORDS),
            aggregation_whole_words: false,
            max_aggregation_rows: 2,

            header_rows: None,
            auto_detect_headers: true,
            detect_footers: true,
            footer_keywords: to_strings(DEFAULT_FOOTER_KEYWORDS),

            input_delimiter: None,
            output_delimiter: None,
            input_encoding: None,

            seed: None,
        }
    }
}

impl SamplerConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from `SAMPLER_*` environment variables.
    ///
    /// Every key in [`OPTION_KEYS`] maps to an upper-cased variable name
    /// prefixed with `SAMPLER_` (for example `sampler_min_rows` becomes
    /// `SAMPLER_MIN_ROWS` and `input_delimiter` becomes
    /// `SAMPLER_INPUT_DELIMITER`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value or the
    /// resulting configuration fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::default().with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `SAMPLER_*` environment variables on top of this configuration.
    ///
    /// Does not validate; callers layering several sources validate once at
    /// the end.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        for key in OPTION_KEYS {
            if let Ok(val) = std::env::var(options::env_var_name(key)) {
                self.apply_option(key, &val)?;
            }
        }
        Ok(self)
    }

    /// Creates configuration from string `(key, value)` options.
    ///
    /// Keys use the `sampler_*` naming (see [`OPTION_KEYS`]); unknown keys
    /// are rejected.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` on unknown keys, unparseable values, or a failed
    /// validation.
    pub fn from_options<I, K, V>(options: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in options {
            config.apply_option(key.as_ref(), value.as_ref())?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML document.
    ///
    /// Missing fields take their defaults; both plain field names and the
    /// `sampler_*` option names are accepted.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Output sizing
        if self.max_rows > 0 && self.min_rows > self.max_rows {
            return Err(ConfigError::ValidationFailed(
                "min_rows cannot exceed max_rows".to_string(),
            ));
        }

        if let Some(rate) = self.sample_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::ValidationFailed(
                    "sample_rate must be between 0.0 and 1.0".to_string(),
                ));
            }
        }

        // Coverage and analysis thresholds
        for (name, value) in [
            ("categorical_threshold", self.categorical_threshold),
            ("constant_threshold", self.constant_threshold),
            ("correlation_threshold", self.correlation_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} must be between 0.0 and 1.0",
                    name
                )));
            }
        }

        if !self.range_epsilon.is_finite() || self.range_epsilon < 0.0 {
            return Err(ConfigError::ValidationFailed(
                "range_epsilon cannot be negative".to_string(),
            ));
        }

        if !self.derived_tolerance.is_finite() || self.derived_tolerance < 0.0 {
            return Err(ConfigError::ValidationFailed(
                "derived_tolerance cannot be negative".to_string(),
            ));
        }

        // Legacy selection
        if let Some(pattern) = &self.column_regex {
            regex::Regex::new(pattern).map_err(|e| {
                ConfigError::ValidationFailed(format!("column_regex is not a valid pattern: {}", e))
            })?;
        }

        // CSV dialect
        for (name, delimiter) in [
            ("input_delimiter", self.input_delimiter),
            ("output_delimiter", self.output_delimiter),
        ] {
            if let Some(c) = delimiter {
                if !c.is_ascii() || c == '"' || c == '\n' || c == '\r' {
                    return Err(ConfigError::ValidationFailed(format!(
                        "{} must be a single ASCII character other than a quote or newline",
                        name
                    )));
                }
            }
        }

        if let Some(label) = &self.input_encoding {
            if encoding_rs::Encoding::for_label(label.trim().as_bytes()).is_none() {
                return Err(ConfigError::ValidationFailed(format!(
                    "input_encoding '{}' is not a known encoding",
                    label
                )));
            }
        }

        Ok(())
    }

    /// Data-row cap of the main pass (`max_output_rows`, falling back to `max_rows`).
    pub fn output_cap(&self) -> usize {
        if self.max_output_rows > 0 {
            self.max_output_rows
        } else {
            self.max_rows
        }
    }

    /// Whether the prescan should materialize rows and build a coverage plan.
    pub fn coverage_planning_enabled(&self) -> bool {
        self.ensure_coverage && self.auto_detect_categorical
    }

    /// Builder method to set the nominal output size.
    pub fn with_output_rows(mut self, rows: usize) -> Self {
        self.output_rows = rows;
        self
    }

    /// Builder method to set the minimum output size.
    pub fn with_min_rows(mut self, rows: usize) -> Self {
        self.min_rows = rows;
        self
    }

    /// Builder method to set the soft maximum output size.
    pub fn with_max_rows(mut self, rows: usize) -> Self {
        self.max_rows = rows;
        self
    }

    /// Builder method to set the hard output cap.
    pub fn with_max_output_rows(mut self, rows: usize) -> Self {
        self.max_output_rows = rows;
        self
    }

    /// Builder method to set an explicit sample rate.
    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    /// Builder method to enable or disable the top-up pass.
    pub fn with_top_up(mut self, enabled: bool) -> Self {
        self.top_up_to_target = enabled;
        self
    }

    /// Builder method to set rows kept per distinct value in legacy mode.
    pub fn with_rows_per_key(mut self, rows: usize) -> Self {
        self.rows_per_key = rows;
        self
    }

    /// Builder method to set the number of distinct values tracked per column.
    pub fn with_uniques_per_column(mut self, uniques: usize) -> Self {
        self.uniques_per_column = uniques;
        self
    }

    /// Builder method to set the legacy value pattern.
    pub fn with_column_regex(mut self, pattern: impl Into<String>) -> Self {
        self.column_regex = Some(pattern.into());
        self
    }

    /// Builder method to set explicit tracked columns.
    pub fn with_unique_columns(mut self, columns: Vec<String>) -> Self {
        self.unique_columns = columns;
        self
    }

    /// Builder method to enable or disable coverage planning.
    pub fn with_coverage(mut self, enabled: bool) -> Self {
        self.ensure_coverage = enabled;
        self
    }

    /// Builder method to enable or disable categorical detection.
    pub fn with_auto_detect_categorical(mut self, enabled: bool) -> Self {
        self.auto_detect_categorical = enabled;
        self
    }

    /// Builder method to use a fixed categorical threshold.
    pub fn with_categorical_threshold(mut self, threshold: f64) -> Self {
        self.categorical_threshold = threshold;
        self.adaptive_threshold = false;
        self
    }

    /// Builder method to enable or disable the column classifier.
    pub fn with_smart_columns(mut self, enabled: bool) -> Self {
        self.smart_columns = enabled;
        self
    }

    /// Builder method to enable or disable aggregation row handling.
    pub fn with_aggregation_detection(mut self, enabled: bool) -> Self {
        self.detect_aggregation = enabled;
        self
    }

    /// Builder method to match aggregation keywords as whole words only.
    pub fn with_aggregation_whole_words(mut self, enabled: bool) -> Self {
        self.aggregation_whole_words = enabled;
        self
    }

    /// Builder method to set the aggregation row cap.
    pub fn with_max_aggregation_rows(mut self, rows: usize) -> Self {
        self.max_aggregation_rows = rows;
        self
    }

    /// Builder method to pin the number of header rows.
    pub fn with_header_rows(mut self, rows: usize) -> Self {
        self.header_rows = Some(rows);
        self
    }

    /// Builder method to enable or disable footer detection.
    pub fn with_footer_detection(mut self, enabled: bool) -> Self {
        self.detect_footers = enabled;
        self
    }

    /// Builder method to set the input delimiter.
    pub fn with_input_delimiter(mut self, delimiter: char) -> Self {
        self.input_delimiter = Some(delimiter);
        self
    }

    /// Builder method to set the output delimiter.
    pub fn with_output_delimiter(mut self, delimiter: char) -> Self {
        self.output_delimiter = Some(delimiter);
        self
    }

    /// Builder method to set the input encoding label.
    pub fn with_input_encoding(mut self, label: impl Into<String>) -> Self {
        self.input_encoding = Some(label.into());
        self
    }

    /// Builder method to set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
