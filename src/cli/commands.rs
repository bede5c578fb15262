//! CLI command definitions for sample-forge.
//!
//! `sample` writes a representative sample of one or more CSV files;
//! `analyze` prints the column classification and coverage plan.

use crate::config::SamplerConfig;
use crate::io::{resolve_inputs, CsvFileSource};
use crate::metrics::export_prometheus;
use crate::sampler::{sample_csv_file, AnalysisReport, DataSampler, SampleReport};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Representative row sampler for CSV files.
#[derive(Parser)]
#[command(name = "sample-forge")]
#[command(about = "Sample representative rows from CSV files")]
#[command(version)]
#[command(
    long_about = "sample-forge writes a small sample of a CSV table that still covers every categorical value and the spread of every numeric column.\n\nExample usage:\n  sample-forge sample data/*.csv --output sample.csv --seed 7"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Sample rows from CSV input into a new CSV file.
    Sample(SampleArgs),

    /// Report column classification and coverage targets without sampling.
    Analyze(AnalyzeArgs),
}

/// Configuration flags shared by every subcommand.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// YAML configuration file.
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Override a configuration option (repeatable), e.g. `--set sampler_min_rows=20`.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Seed for reproducible sampling.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of header rows (auto-detected when omitted).
    #[arg(long)]
    pub header_rows: Option<usize>,

    /// Input delimiter (sniffed when omitted).
    #[arg(short = 'd', long)]
    pub delimiter: Option<char>,

    /// Input encoding label, e.g. `utf-8` or `windows-1252` (detected when omitted).
    #[arg(long)]
    pub encoding: Option<String>,
}

/// Arguments for `sample-forge sample`.
#[derive(Parser, Debug)]
pub struct SampleArgs {
    /// Input path, comma-separated paths, or glob pattern.
    pub input: String,

    /// Output file (defaults to sampled_data.csv beside the first input).
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Minimum number of sampled data rows.
    #[arg(long)]
    pub min_rows: Option<usize>,

    /// Soft target for sampled data rows.
    #[arg(long)]
    pub max_rows: Option<usize>,

    /// Use per-value legacy selection instead of coverage planning.
    #[arg(long)]
    pub legacy: bool,

    /// Write Prometheus text metrics for the run to this file.
    #[arg(long)]
    pub metrics_out: Option<PathBuf>,

    /// Output JSON summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `sample-forge analyze`.
#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    /// Input path, comma-separated paths, or glob pattern.
    pub input: String,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output JSON report.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments without running the command.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli())
}

/// Run the CLI with the parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Sample(args) => run_sample_command(args),
        Commands::Analyze(args) => run_analyze_command(args),
    }
}

/// Layers configuration: defaults, YAML file, `SAMPLER_*` environment,
/// `--set` options, then explicit flags.
pub fn build_config(args: &ConfigArgs) -> anyhow::Result<SamplerConfig> {
    let config = match &args.config {
        Some(path) => SamplerConfig::from_yaml_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path.display(), e))?,
        None => SamplerConfig::default(),
    };
    let mut config = config.with_env_overrides()?;

    for entry in &args.set {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Invalid --set value {:?}, expected KEY=VALUE", entry))?;
        config.apply_option(key.trim(), value.trim())?;
    }

    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if let Some(rows) = args.header_rows {
        config = config.with_header_rows(rows);
    }
    if let Some(delimiter) = args.delimiter {
        config = config.with_input_delimiter(delimiter);
    }
    if let Some(label) = &args.encoding {
        config = config.with_input_encoding(label.clone());
    }

    Ok(config)
}

fn run_sample_command(args: SampleArgs) -> anyhow::Result<()> {
    let mut config = build_config(&args.config)?;
    if let Some(rows) = args.min_rows {
        config = config.with_min_rows(rows);
    }
    if let Some(rows) = args.max_rows {
        config = config.with_max_rows(rows);
    }
    if args.legacy {
        config = config.with_coverage(false);
    }
    config.validate()?;

    let Some(report) = sample_csv_file(&args.input, args.output.as_deref(), config)? else {
        return Err(anyhow::anyhow!("No input files match {}", args.input));
    };

    if let Some(path) = &args.metrics_out {
        let text = export_prometheus(&report.counters, report.output_rows)?;
        fs::write(path, text)?;
        info!(path = %path.display(), "Wrote metrics");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_sample_report(&report);
    }
    Ok(())
}

fn run_analyze_command(args: AnalyzeArgs) -> anyhow::Result<()> {
    let config = build_config(&args.config)?;
    config.validate()?;

    let paths = resolve_inputs(&args.input)?;
    if paths.is_empty() {
        return Err(anyhow::anyhow!("No input files match {}", args.input));
    }
    let sources = paths
        .iter()
        .map(|path| CsvFileSource::open(path, &config))
        .collect::<Result<Vec<_>, _>>()?;

    let report = DataSampler::new(config)?.analyze(&sources)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_analysis_report(&report);
    }
    Ok(())
}

fn print_sample_report(report: &SampleReport) {
    println!("\n=== Sample Summary ===");
    println!("Inputs:         {}", report.input_files.join(", "));
    if let Some(output) = &report.output {
        println!("Output:         {}", output.display());
    }
    println!("Header rows:    {}", report.header_rows);
    println!("Data rows:      {}", report.data_rows);
    if report.passthrough {
        println!("Passthrough:    yes (copied verbatim)");
    } else {
        if let Some(mode) = report.mode {
            println!("Mode:           {}", mode);
        }
        println!("Sample rate:    {:.4}", report.sample_rate);
        println!("Selected:       {}", report.selected_rows);
        println!("Topped up:      {}", report.top_up_rows);
    }
    println!("Output rows:    {}", report.output_rows);

    if !report.coverage.is_empty() {
        println!("\nCoverage:");
        for stat in &report.coverage {
            println!(
                "  {:<24} {:>5}/{:<5} ({:.0}%)",
                stat.header,
                stat.covered,
                stat.total,
                stat.percent()
            );
        }
    }
}

fn print_analysis_report(report: &AnalysisReport) {
    println!("\n=== Column Analysis ===");
    println!("Inputs:         {}", report.input_files.join(", "));
    println!("Header rows:    {}", report.header_rows);
    println!("Data rows:      {}", report.data_rows);
    println!("Footer rows:    {}", report.footer_rows);
    println!("Threshold:      {:.2}", report.categorical_threshold);
    println!();
    for column in &report.columns {
        print!(
            "  [{:>3}] {:<24} {:<12} unique={}",
            column.index, column.header, column.kind, column.unique_count
        );
        if let Some(range) = &column.numeric_range {
            print!(" range=[{}, {}] median={}", range.min, range.max, range.median);
        }
        println!();
    }
    if !report.id_columns.is_empty() {
        println!("\nID columns:     {}", report.id_columns.join(", "));
    }
    for summary in &report.categorical {
        println!(
            "Categorical:    {} ({} values)",
            summary.header,
            summary.values.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sample_command() {
        let cli = Cli::try_parse_from([
            "sample-forge",
            "sample",
            "data.csv",
            "-o",
            "out.csv",
            "--seed",
            "7",
            "--set",
            "sampler_min_rows=10",
            "--json",
        ])
        .unwrap();
        match cli.command {
            Commands::Sample(args) => {
                assert_eq!(args.input, "data.csv");
                assert_eq!(args.output, Some(PathBuf::from("out.csv")));
                assert_eq!(args.config.seed, Some(7));
                assert_eq!(args.config.set, vec!["sampler_min_rows=10".to_string()]);
                assert!(args.json);
            }
            Commands::Analyze(_) => panic!("expected sample command"),
        }
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_build_config_layers_set_and_flags() {
        let args = ConfigArgs {
            set: vec!["sampler_min_rows=12".to_string(), "sampler_max_rows = 30".to_string()],
            seed: Some(5),
            header_rows: Some(2),
            delimiter: Some(';'),
            ..Default::default()
        };
        let config = build_config(&args).unwrap();
        assert_eq!(config.min_rows, 12);
        assert_eq!(config.max_rows, 30);
        assert_eq!(config.seed, Some(5));
        assert_eq!(config.header_rows, Some(2));
        assert_eq!(config.input_delimiter, Some(';'));
    }

    #[test]
    fn test_build_config_rejects_malformed_set() {
        let args = ConfigArgs {
            set: vec!["sampler_min_rows".to_string()],
            ..Default::default()
        };
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn test_build_config_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sampler.yaml");
        fs::write(&path, "min_rows: 5\nmax_rows: 9\n").unwrap();
        let args = ConfigArgs {
            config: Some(path),
            ..Default::default()
        };
        let config = build_config(&args).unwrap();
        assert_eq!(config.min_rows, 5);
        assert_eq!(config.max_rows, 9);
    }
}
