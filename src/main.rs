use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufRead, BufReader};
use tracing_subscriber::EnvFilter;

use moose::app::Moose;
use moose::cli::{Cli, init_config};
use moose::experiment::Collaborators;
use moose::touch::pump_json_lines;

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("moose=info"));

    match &cli.log_file {
        Some(path) => {
            let log_file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file '{}'", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(log_file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

async fn open_events(source: &str) -> anyhow::Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    if source == "-" {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let file = tokio::fs::File::open(source)
        .await
        .with_context(|| format!("Failed to open touch events '{source}'"))?;
    Ok(Box::new(BufReader::new(file)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.init {
        return init_config(&cli.config);
    }

    init_tracing(&cli)?;
    let config = cli.load_config()?;

    let events = open_events(&cli.events).await?;
    let app = Moose::start(&config, Collaborators::default());

    tokio::select! {
        result = pump_json_lines(events, app.touch_sender()) => {
            let forwarded = result.context("Failed to read touch events")?;
            tracing::info!("Touch input ended after {forwarded} events, serving controller until Ctrl-C");
            tokio::signal::ctrl_c().await?;
        }
        result = tokio::signal::ctrl_c() => {
            result?;
        }
    }

    tracing::info!("Shutting down");
    app.shutdown();
    Ok(())
}
