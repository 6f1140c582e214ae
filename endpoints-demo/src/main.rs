use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use typed_endpoints::{
    observability::{init_tracing, shutdown_tracing},
    Config, Router, Server,
};

mod endpoints;

/// endpoints-demo - serve the typed-endpoints demonstration routes
#[derive(Parser)]
#[command(name = "endpoints-demo")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (skips the standard search paths)
    #[arg(short, long, env = "ENDPOINTS_DEMO_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level or filter directive
    #[arg(short, long)]
    log_level: Option<String>,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => Config::load().context("Failed to load configuration")?,
        };

        if let Some(host) = &self.host {
            config.service.host = host.clone();
        }
        if let Some(port) = self.port {
            config.service.port = port;
        }
        if let Some(level) = &self.log_level {
            config.service.log_level = level.clone();
        }
        Ok(config)
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.load_config()?;
    init_tracing(&config)?;

    endpoints::register(None).context("Failed to register endpoints")?;
    for route in Router::global().routes() {
        tracing::info!(%route, "Serving");
    }

    Server::new(config)
        .serve(Router::global().to_axum())
        .await
        .context("Server failed")?;

    shutdown_tracing();
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);

            if let Some(source) = e.chain().nth(1) {
                eprintln!("\n{} {}", "Caused by:".yellow(), source);
            }

            std::process::exit(1);
        }
    }
}
