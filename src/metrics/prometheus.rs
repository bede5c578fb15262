//! Prometheus text export of sampling counters.

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use super::SamplerCounters;

/// Renders `counters` in the Prometheus text exposition format.
///
/// Every call builds its own registry, so the output only reflects the run
/// the counters came from.
pub fn export_prometheus(
    counters: &SamplerCounters,
    output_rows: usize,
) -> Result<String, prometheus::Error> {
    let registry = Registry::new();

    let rows_total = IntCounterVec::new(
        Opts::new("sample_forge_rows_total", "Rows processed, by outcome"),
        &["outcome"],
    )?;
    let output_size = IntGauge::new(
        "sample_forge_output_data_rows",
        "Data rows in the sampled output",
    )?;

    registry.register(Box::new(rows_total.clone()))?;
    registry.register(Box::new(output_size.clone()))?;

    for (outcome, count) in counters.outcomes() {
        rows_total.with_label_values(&[outcome]).inc_by(count);
    }
    output_size.set(i64::try_from(output_rows).unwrap_or(i64::MAX));

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;

    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
