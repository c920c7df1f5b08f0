//! CLI argument definitions for logpost-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Logpost log forwarding daemon.
///
/// Loads the pipeline configuration, assembles sources, processors and
/// sinks, and runs every pipeline until a termination signal arrives.
#[derive(Parser, Debug)]
#[command(name = "logpost-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to the pipelines YAML configuration file.
    #[arg(short, long, default_value = "./config.yaml")]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log format (json, pretty).
    #[arg(long, default_value = "json")]
    pub log_format: String,

    /// Validate the configuration file and exit without starting pipelines.
    #[arg(long)]
    pub validate: bool,
}
