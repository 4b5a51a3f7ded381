//! Chat relay CLI and HTTP entry point.
//!
//! Binary name: `chatrelay`
//!
//! Parses CLI arguments, loads configuration, initializes tracing, then
//! dispatches to the selected command.

mod cli;
mod http;
mod state;

use clap::Parser;

use chatrelay_infra::config::load_config;
use chatrelay_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&TracingOptions {
        verbose: cli.verbose,
        quiet: cli.quiet,
        enable_otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let mut config = load_config(&cli.config).await;

    let result = match cli.command {
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            cli::serve::run(config).await
        }

        Commands::Config => {
            // Keys are never printed.
            config.provider.api_key = config.provider.api_key.map(|_| "<redacted>".to_string());
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    };

    shutdown_tracing();
    result
}
