//! Row sinks.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::Row;
use crate::error::SamplerError;

/// Destination for emitted rows, in output order.
pub trait RowSink {
    /// Writes one row.
    fn write_row(&mut self, row: &[String]) -> Result<(), SamplerError>;

    /// Flushes buffered output.
    fn flush(&mut self) -> Result<(), SamplerError> {
        Ok(())
    }
}

/// CSV writer sink. Rows may differ in length.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    rows_written: usize,
}

impl<W: Write> CsvSink<W> {
    /// Wraps a writer with the given output delimiter.
    pub fn new(inner: W, delimiter: u8) -> Self {
        let writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_writer(inner);
        Self {
            writer,
            rows_written: 0,
        }
    }

    /// Number of rows written so far.
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Flushes and returns the inner writer.
    pub fn into_inner(self) -> Result<W, SamplerError> {
        self.writer
            .into_inner()
            .map_err(|e| SamplerError::Io(std::io::Error::new(e.error().kind(), e.error().to_string())))
    }
}

impl CsvSink<BufWriter<File>> {
    /// Creates (or truncates) a CSV file.
    pub fn create(path: impl AsRef<Path>, delimiter: u8) -> Result<Self, SamplerError> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file), delimiter))
    }
}

impl<W: Write> RowSink for CsvSink<W> {
    fn write_row(&mut self, row: &[String]) -> Result<(), SamplerError> {
        self.writer.write_record(row)?;
        self.rows_written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SamplerError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Sink collecting rows in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    /// Rows written, in order.
    pub rows: Vec<Row>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RowSink for MemorySink {
    fn write_row(&mut self, row: &[String]) -> Result<(), SamplerError> {
        self.rows.push(row.to_vec());
        Ok(())
    }
}
