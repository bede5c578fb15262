//! Re-openable row sources.

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use encoding_rs::{Encoding, UTF_8};

use super::dialect::{resolve_encoding, sniff_delimiter};
use super::Row;
use crate::config::SamplerConfig;
use crate::error::SamplerError;

/// Bytes inspected when detecting encoding and delimiter.
const SNIFF_BYTES: usize = 64 * 1024;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Iterator over the rows of a single pass.
pub type RowIter<'a> = Box<dyn Iterator<Item = Result<Row, SamplerError>> + 'a>;

/// A table that can be read from the start any number of times.
pub trait TableSource {
    /// Display name used in logs and reports.
    fn name(&self) -> &str;

    /// Field delimiter of the table.
    fn delimiter(&self) -> u8;

    /// Opens a fresh pass over every row, header rows included.
    fn rows(&self) -> Result<RowIter<'_>, SamplerError>;
}

/// A CSV file on disk, decoded per field with a fixed encoding.
#[derive(Debug, Clone)]
pub struct CsvFileSource {
    path: PathBuf,
    name: String,
    delimiter: u8,
    encoding: &'static Encoding,
}

impl CsvFileSource {
    /// Opens `path`, resolving delimiter and encoding from the configuration
    /// or, when unset, from the file's leading bytes.
    pub fn open(path: impl AsRef<Path>, config: &SamplerConfig) -> Result<Self, SamplerError> {
        let path = path.as_ref();
        let mut sample = Vec::with_capacity(SNIFF_BYTES);
        File::open(path)?
            .take(SNIFF_BYTES as u64)
            .read_to_end(&mut sample)?;

        let encoding = resolve_encoding(config.input_encoding.as_deref(), &sample)?;
        let delimiter = match config.input_delimiter {
            Some(c) => c as u8,
            None if encoding.is_ascii_compatible() => sniff_delimiter(&sample),
            None => {
                let (decoded, _, _) = encoding.decode(&sample);
                sniff_delimiter(decoded.as_bytes())
            }
        };

        tracing::debug!(
            path = %path.display(),
            encoding = encoding.name(),
            delimiter = %(delimiter as char).escape_default(),
            "Opened CSV source"
        );

        Ok(Self {
            path: path.to_path_buf(),
            name: path.display().to_string(),
            delimiter,
            encoding,
        })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encoding used to decode fields.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    fn reader<R: Read>(&self, input: R) -> csv::Reader<R> {
        csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(input)
    }

    fn decode_record(&self, record: &csv::ByteRecord, first: bool) -> Row {
        record
            .iter()
            .enumerate()
            .map(|(idx, field)| {
                let field = if first && idx == 0 && self.encoding == UTF_8 {
                    field.strip_prefix(UTF8_BOM).unwrap_or(field)
                } else {
                    field
                };
                let (text, _) = self.encoding.decode_without_bom_handling(field);
                text.into_owned()
            })
            .collect()
    }
}

impl TableSource for CsvFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn delimiter(&self) -> u8 {
        self.delimiter
    }

    fn rows(&self) -> Result<RowIter<'_>, SamplerError> {
        let file = File::open(&self.path)?;

        if self.encoding.is_ascii_compatible() {
            let reader = self.reader(BufReader::new(file));
            let iter = reader
                .into_byte_records()
                .enumerate()
                .map(move |(idx, record)| {
                    record
                        .map(|r| self.decode_record(&r, idx == 0))
                        .map_err(|e| SamplerError::read(self.name.clone(), e))
                });
            return Ok(Box::new(iter));
        }

        // UTF-16 and friends cannot be split on single-byte delimiters
        let mut bytes = Vec::new();
        BufReader::new(file).read_to_end(&mut bytes)?;
        let (text, _, _) = self.encoding.decode(&bytes);
        let reader = self.reader(Cursor::new(text.into_owned().into_bytes()));
        let iter = reader.into_records().map(move |record| {
            record
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .map_err(|e| SamplerError::read(self.name.clone(), e))
        });
        Ok(Box::new(iter))
    }
}

/// A table held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    name: String,
    delimiter: u8,
    rows: Vec<Row>,
}

impl InMemorySource {
    /// Creates a comma-delimited in-memory table.
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            delimiter: b',',
            rows,
        }
    }

    /// Builds a table from string slices.
    pub fn from_strs(name: impl Into<String>, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();
        Self::new(name, rows)
    }

    /// Sets the delimiter reported to sinks.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Number of rows, header rows included.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl TableSource for InMemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn delimiter(&self) -> u8 {
        self.delimiter
    }

    fn rows(&self) -> Result<RowIter<'_>, SamplerError> {
        Ok(Box::new(self.rows.iter().cloned().map(Ok)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn collect(source: &impl TableSource) -> Vec<Row> {
        source
            .rows()
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_csv_source_is_reopenable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "a,b\n1,2\n3,4\n").unwrap();

        let source = CsvFileSource::open(file.path(), &SamplerConfig::default()).unwrap();
        assert_eq!(source.delimiter(), b',');
        assert_eq!(collect(&source).len(), 3);
        assert_eq!(collect(&source)[2], vec!["3", "4"]);
    }

    #[test]
    fn test_csv_source_strips_utf8_bom() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0xEF, 0xBB, 0xBF]).unwrap();
        write!(file, "name;value\nx;1\n").unwrap();

        let source = CsvFileSource::open(file.path(), &SamplerConfig::default()).unwrap();
        assert_eq!(source.delimiter(), b';');
        assert_eq!(collect(&source)[0], vec!["name", "value"]);
    }

    #[test]
    fn test_csv_source_decodes_windows_1252() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"city,n\nM\xe1laga,1\n").unwrap();

        let source = CsvFileSource::open(file.path(), &SamplerConfig::default()).unwrap();
        assert_eq!(source.encoding(), encoding_rs::WINDOWS_1252);
        assert_eq!(collect(&source)[1][0], "Málaga");
    }

    #[test]
    fn test_csv_source_decodes_utf16() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "a,b\n1,2\n".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        file.write_all(&bytes).unwrap();

        let source = CsvFileSource::open(file.path(), &SamplerConfig::default()).unwrap();
        assert_eq!(collect(&source), vec![vec!["a", "b"], vec!["1", "2"]]);
    }

    #[test]
    fn test_csv_source_ragged_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Title\na,b,c\n1,2,3\n").unwrap();

        let source = CsvFileSource::open(file.path(), &SamplerConfig::default()).unwrap();
        let rows = collect(&source);
        assert_eq!(rows[0].len(), 1);
        assert_eq!(rows[1].len(), 3);
    }

    #[test]
    fn test_in_memory_source() {
        let source = InMemorySource::from_strs("mem", &[&["a", "b"], &["1", "2"]]);
        assert_eq!(source.len(), 2);
        assert_eq!(collect(&source), collect(&source));
    }
}
