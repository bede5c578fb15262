//! sample-forge: representative row sampling for CSV tables.
//!
//! This library reads one or more delimited files, detects their header and
//! footer rows, classifies columns, and writes a small sample that covers
//! every categorical value and the spread of every numeric column.

// Core modules
pub mod analysis;
pub mod boundary;
pub mod cli;
pub mod config;
pub mod coverage;
pub mod error;
pub mod io;
pub mod metrics;
pub mod reconcile;
pub mod sampler;
pub mod selection;

// Re-export commonly used types
pub use config::{ConfigError, SamplerConfig};
pub use error::SamplerError;
pub use io::{CsvFileSource, CsvSink, InMemorySource, MemorySink, RowSink, TableSource};
pub use metrics::SamplerCounters;
pub use sampler::{sample_csv_file, AnalysisReport, DataSampler, SampleReport};
pub use selection::{Decision, SelectionMode};
