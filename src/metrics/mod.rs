//! Sampling counters and their Prometheus export.
//!
//! # Example
//!
//! ```ignore
//! use sample_forge::metrics::{export_prometheus, SamplerCounters};
//!
//! let counters = SamplerCounters::default();
//! let text = export_prometheus(&counters, 0)?;
//! ```

pub mod counters;
pub mod prometheus;

pub use counters::SamplerCounters;
pub use prometheus::export_prometheus;
