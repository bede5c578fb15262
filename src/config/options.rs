//! String option parsing shared by `--set` arguments and environment overrides.

use super::{ConfigError, SamplerConfig};

/// Every option key understood by [`SamplerConfig::apply_option`].
pub const OPTION_KEYS: &[&str] = &[
    "sampler_output_rows",
    "sampler_min_rows",
    "sampler_max_rows",
    "sampler_max_output_rows",
    "sampler_rate",
    "sampler_top_up",
    "sampler_rows_per_key",
    "sampler_uniques_per_column",
    "sampler_column_regex",
    "sampler_unique_columns",
    "sampler_ensure_coverage",
    "sampler_auto_detect_categorical",
    "sampler_categorical_threshold",
    "sampler_adaptive_threshold",
    "sampler_id_column_patterns",
    "sampler_range_epsilon",
    "sampler_smart_columns",
    "sampler_constant_threshold",
    "sampler_correlation_threshold",
    "sampler_metadata_min_length",
    "sampler_derived_tolerance",
    "sampler_detect_aggregation",
    "sampler_aggregation_keywords",
    "sampler_aggregation_whole_words",
    "sampler_max_aggregation_rows",
    "sampler_header_rows",
    "header_rows",
    "sampler_auto_detect_headers",
    "sampler_detect_footers",
    "sampler_footer_keywords",
    "input_delimiter",
    "output_delimiter",
    "input_encoding",
    "sampler_seed",
];

/// Environment variable carrying an option key.
pub(super) fn env_var_name(key: &str) -> String {
    if key.starts_with("sampler_") {
        key.to_uppercase()
    } else {
        format!("SAMPLER_{}", key.to_uppercase())
    }
}

impl SamplerConfig {
    /// Applies a single string option to this configuration.
    ///
    /// Numeric and boolean values are parsed; list values are comma-separated.
    /// The configuration is not validated here.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownOption` for an unrecognized key and
    /// `ConfigError::InvalidValue` for an unparseable value.
    pub fn apply_option(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match key {
            "sampler_output_rows" => self.output_rows = parse_value(value, key)?,
            "sampler_min_rows" => self.min_rows = parse_value(value, key)?,
            "sampler_max_rows" => self.max_rows = parse_value(value, key)?,
            "sampler_max_output_rows" => self.max_output_rows = parse_value(value, key)?,
            "sampler_rate" => {
                let rate: f64 = parse_value(value, key)?;
                // negative rate means "derive from output_rows"
                self.sample_rate = (rate >= 0.0).then_some(rate);
            }
            "sampler_top_up" => self.top_up_to_target = parse_bool(value, key)?,
            "sampler_rows_per_key" => self.rows_per_key = parse_value(value, key)?,
            "sampler_uniques_per_column" => self.uniques_per_column = parse_value(value, key)?,
            "sampler_column_regex" => {
                self.column_regex = (!value.is_empty()).then(|| value.to_string());
            }
            "sampler_unique_columns" => self.unique_columns = parse_list(value),
            "sampler_ensure_coverage" => self.ensure_coverage = parse_bool(value, key)?,
            "sampler_auto_detect_categorical" => {
                self.auto_detect_categorical = parse_bool(value, key)?
            }
            "sampler_categorical_threshold" => {
                self.categorical_threshold = parse_value(value, key)?
            }
            "sampler_adaptive_threshold" => self.adaptive_threshold = parse_bool(value, key)?,
            "sampler_id_column_patterns" => self.id_column_patterns = parse_list(value),
            "sampler_range_epsilon" => self.range_epsilon = parse_value(value, key)?,
            "sampler_smart_columns" => self.smart_columns = parse_bool(value, key)?,
            "sampler_constant_threshold" => self.constant_threshold = parse_value(value, key)?,
            "sampler_correlation_threshold" => {
                self.correlation_threshold = parse_value(value, key)?
            }
            "sampler_metadata_min_length" => self.metadata_min_length = parse_value(value, key)?,
            "sampler_derived_tolerance" => self.derived_tolerance = parse_value(value, key)?,
            "sampler_detect_aggregation" => self.detect_aggregation = parse_bool(value, key)?,
            "sampler_aggregation_keywords" => self.aggregation_keywords = parse_list(value),
            "sampler_aggregation_whole_words" => {
                self.aggregation_whole_words = parse_bool(value, key)?
            }
            "sampler_max_aggregation_rows" => {
                self.max_aggregation_rows = parse_value(value, key)?
            }
            "sampler_header_rows" | "header_rows" => {
                self.header_rows = if value.is_empty() || value.eq_ignore_ascii_case("auto") {
                    None
                } else {
                    Some(parse_value(value, key)?)
                };
            }
            "sampler_auto_detect_headers" => self.auto_detect_headers = parse_bool(value, key)?,
            "sampler_detect_footers" => self.detect_footers = parse_bool(value, key)?,
            "sampler_footer_keywords" => self.footer_keywords = parse_list(value),
            "input_delimiter" => self.input_delimiter = parse_delimiter(value, key)?,
            "output_delimiter" => self.output_delimiter = parse_delimiter(value, key)?,
            "input_encoding" => {
                self.input_encoding = (!value.is_empty()).then(|| value.to_string());
            }
            "sampler_seed" => self.seed = Some(parse_value(value, key)?),
            _ => return Err(ConfigError::UnknownOption(key.to_string())),
        }
        Ok(())
    }
}

/// Parse a string option value.
fn parse_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse a string option value as a boolean.
fn parse_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Parse a delimiter given literally or by name (`tab`, `\t`, `comma`, ...).
fn parse_delimiter(value: &str, key: &str) -> Result<Option<char>, ConfigError> {
    let delimiter = match value.to_lowercase().as_str() {
        "" | "auto" => return Ok(None),
        "tab" | "\\t" => '\t',
        "comma" => ',',
        "semicolon" => ';',
        "pipe" => '|',
        _ => {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => c,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: key.to_string(),
                        message: format!("expected a single character, got '{}'", value),
                    })
                }
            }
        }
    };
    Ok(Some(delimiter))
}
