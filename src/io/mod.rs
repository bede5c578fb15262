//! Table input and output.
//!
//! Sources yield rows as `Vec<String>` and can be re-opened for every pass
//! the sampler makes; sinks accept rows in output order.

pub mod dialect;
pub mod discovery;
pub mod sink;
pub mod source;

/// A single table row, one string per cell.
pub type Row = Vec<String>;

pub use dialect::{detect_encoding, resolve_encoding, sniff_delimiter};
pub use discovery::resolve_inputs;
pub use sink::{CsvSink, MemorySink, RowSink};
pub use source::{CsvFileSource, InMemorySource, RowIter, TableSource};
