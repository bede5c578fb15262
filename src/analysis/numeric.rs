//! Numeric parsing, quartile ranges, and range buckets.

use serde::Serialize;

/// Parses a cell as a number after stripping whitespace, thousands
/// separators, percent signs, and dollar signs.
///
/// Empty cells and the `.` placeholder are not numbers, and neither are
/// non-finite values.
pub fn parse_numeric(cell: &str) -> Option<f64> {
    let cleaned: String = cell
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, ',' | '%' | '$'))
        .collect();
    if cleaned.is_empty() || cleaned == "." {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Quartile summary of a numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
}

impl NumericRange {
    /// Computes the range of `values`, or `None` when empty.
    ///
    /// Quartiles are taken by index into the sorted values (`n/4`, `n/2`,
    /// `3n/4`), with the extremes standing in for q1/q3 below four values.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();

        let (q1, q3) = if n >= 4 {
            (sorted[n / 4], sorted[3 * n / 4])
        } else {
            (sorted[0], sorted[n - 1])
        };

        Some(Self {
            min: sorted[0],
            max: sorted[n - 1],
            q1,
            median: sorted[n / 2],
            q3,
        })
    }

    /// Maps a value to its bucket. Values within `epsilon` of an extreme map
    /// to that extreme; otherwise the value falls into a quartile.
    pub fn bucket(&self, value: f64, epsilon: f64) -> RangeBucket {
        if (value - self.min).abs() < epsilon {
            return RangeBucket::Min;
        }
        if (value - self.max).abs() < epsilon {
            return RangeBucket::Max;
        }
        if value <= self.q1 {
            RangeBucket::Q1
        } else if value <= self.median {
            RangeBucket::Q2
        } else if value <= self.q3 {
            RangeBucket::Q3
        } else {
            RangeBucket::Q4
        }
    }
}

/// Position of a value within a numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeBucket {
    Min,
    Q1,
    Q2,
    Q3,
    Q4,
    Max,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric() {
        assert_eq!(parse_numeric("1,234"), Some(1234.0));
        assert_eq!(parse_numeric(" $12.50 "), Some(12.5));
        assert_eq!(parse_numeric("45%"), Some(45.0));
        assert_eq!(parse_numeric("-3e2"), Some(-300.0));
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("."), None);
        assert_eq!(parse_numeric("n/a"), None);
        assert_eq!(parse_numeric("inf"), None);
        assert_eq!(parse_numeric("NaN"), None);
    }

    #[test]
    fn test_quartiles() {
        let values: Vec<f64> = (0..8).map(f64::from).collect();
        let range = NumericRange::from_values(&values).unwrap();
        assert_eq!(range.min, 0.0);
        assert_eq!(range.max, 7.0);
        assert_eq!(range.q1, 2.0);
        assert_eq!(range.median, 4.0);
        assert_eq!(range.q3, 6.0);
    }

    #[test]
    fn test_quartiles_small_sample() {
        let range = NumericRange::from_values(&[5.0, 1.0, 3.0]).unwrap();
        assert_eq!(range.q1, 1.0);
        assert_eq!(range.median, 3.0);
        assert_eq!(range.q3, 5.0);
        assert!(NumericRange::from_values(&[]).is_none());
    }

    #[test]
    fn test_buckets() {
        let values: Vec<f64> = (0..=100).map(f64::from).collect();
        let range = NumericRange::from_values(&values).unwrap();
        let eps = 0.001;
        assert_eq!(range.bucket(0.0, eps), RangeBucket::Min);
        assert_eq!(range.bucket(100.0, eps), RangeBucket::Max);
        assert_eq!(range.bucket(10.0, eps), RangeBucket::Q1);
        assert_eq!(range.bucket(40.0, eps), RangeBucket::Q2);
        assert_eq!(range.bucket(60.0, eps), RangeBucket::Q3);
        assert_eq!(range.bucket(90.0, eps), RangeBucket::Q4);
    }

    #[test]
    fn test_epsilon_snaps_to_extreme() {
        let range = NumericRange::from_values(&[0.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(range.bucket(0.0005, 0.001), RangeBucket::Min);
        assert_eq!(range.bucket(0.0005, 0.0001), RangeBucket::Q1);
    }
}
