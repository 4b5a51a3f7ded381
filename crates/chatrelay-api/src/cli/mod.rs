//! CLI definitions for the `chatrelay` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use chatrelay_infra::config::DEFAULT_CONFIG_FILE;

/// Streaming chat relay with chat logging and usage accounting.
#[derive(Parser, Debug)]
#[command(name = "chatrelay", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE, env = "CHATRELAY_CONFIG")]
    pub config: PathBuf,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Port to listen on (overrides the config file).
        #[arg(long)]
        port: Option<u16>,

        /// Host to bind to (overrides the config file).
        #[arg(long)]
        host: Option<String>,
    },

    /// Print the effective configuration as TOML, without secrets.
    Config,
}
