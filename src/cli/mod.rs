//! Command-line interface for sample-forge.
//!
//! Provides the `sample` and `analyze` commands.

mod commands;

pub use commands::{build_config, parse_cli, run, run_with_cli, Cli, Commands, ConfigArgs};
