//! Encoding detection and delimiter sniffing for CSV inputs.

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

use crate::config::ConfigError;

/// Candidate delimiters, in tie-break order.
const CANDIDATE_DELIMITERS: &[u8] = b",\t;|";

/// Number of lines inspected when sniffing the delimiter.
const SNIFF_LINES: usize = 10;

/// Detects the encoding of a file from its leading bytes.
///
/// A byte-order mark wins; otherwise valid UTF-8 is assumed UTF-8 and
/// anything else falls back to Windows-1252.
pub fn detect_encoding(sample: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(sample) {
        return encoding;
    }

    match std::str::from_utf8(sample) {
        Ok(_) => UTF_8,
        // a multi-byte sequence cut off by the sample boundary is still UTF-8
        Err(e) if e.error_len().is_none() => UTF_8,
        Err(_) => WINDOWS_1252,
    }
}

/// Resolves the encoding for an input: the configured label when present,
/// detection from `sample` otherwise.
pub fn resolve_encoding(
    label: Option<&str>,
    sample: &[u8],
) -> Result<&'static Encoding, ConfigError> {
    match label {
        Some(label) => Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
            ConfigError::InvalidValue {
                key: "input_encoding".to_string(),
                message: format!("unknown encoding '{}'", label),
            }
        }),
        None => Ok(detect_encoding(sample)),
    }
}

/// Guesses the field delimiter from the first lines of a file.
///
/// Each candidate is scored by how many lines share the field count of the
/// first line that contains it; ties go to the higher count, then to the
/// earlier candidate. Falls back to a comma.
pub fn sniff_delimiter(sample: &[u8]) -> u8 {
    let text = String::from_utf8_lossy(sample);
    let lines: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();

    let mut best: Option<(usize, usize, u8)> = None;
    for &candidate in CANDIDATE_DELIMITERS {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| count_unquoted(line, candidate))
            .collect();
        let Some(&reference) = counts.iter().find(|&&c| c > 0) else {
            continue;
        };
        let consistent = counts.iter().filter(|&&c| c == reference).count();
        let better = match best {
            None => true,
            Some((best_consistent, best_count, _)) => {
                consistent > best_consistent
                    || (consistent == best_consistent && reference > best_count)
            }
        };
        if better {
            best = Some((consistent, reference, candidate));
        }
    }

    best.map(|(_, _, delimiter)| delimiter).unwrap_or(b',')
}

fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for &byte in line.as_bytes() {
        if byte == b'"' {
            in_quotes = !in_quotes;
        } else if byte == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_utf8() {
        assert_eq!(detect_encoding("name,city\nJosé,Málaga\n".as_bytes()), UTF_8);
    }

    #[test]
    fn test_detect_bom() {
        let bytes = [0xFF, 0xFE, b'a', 0x00];
        assert_eq!(detect_encoding(&bytes), encoding_rs::UTF_16LE);
        let bytes = [0xEF, 0xBB, 0xBF, b'a'];
        assert_eq!(detect_encoding(&bytes), UTF_8);
    }

    #[test]
    fn test_detect_latin1_fallback() {
        // "Málaga" in Windows-1252
        let bytes = [b'M', 0xE1, b'l', b'a', b'g', b'a'];
        assert_eq!(detect_encoding(&bytes), WINDOWS_1252);
    }

    #[test]
    fn test_truncated_multibyte_still_utf8() {
        let mut bytes = "abc".as_bytes().to_vec();
        bytes.push(0xC3);
        assert_eq!(detect_encoding(&bytes), UTF_8);
    }

    #[test]
    fn test_resolve_configured_label() {
        let encoding = resolve_encoding(Some("latin1"), b"").unwrap();
        assert_eq!(encoding, WINDOWS_1252);
        assert!(resolve_encoding(Some("nope"), b"").is_err());
    }

    #[test]
    fn test_sniff_delimiters() {
        assert_eq!(sniff_delimiter(b"a,b,c\n1,2,3\n"), b',');
        assert_eq!(sniff_delimiter(b"a\tb\tc\n1\t2\t3\n"), b'\t');
        assert_eq!(sniff_delimiter(b"a;b;c\n1;2,5;3\n"), b';');
        assert_eq!(sniff_delimiter(b"a|b\n1|2\n"), b'|');
    }

    #[test]
    fn test_sniff_ignores_quoted_commas() {
        assert_eq!(sniff_delimiter(b"\"x,y\";b\n\"1,2\";3\n"), b';');
    }

    #[test]
    fn test_sniff_defaults_to_comma() {
        assert_eq!(sniff_delimiter(b"single\ncolumn\n"), b',');
        assert_eq!(sniff_delimiter(b""), b',');
    }
}
