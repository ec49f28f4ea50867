use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Moose - touch gesture remote for an experiment controller
#[derive(Parser, Debug)]
#[command(name = "moose")]
#[command(version)]
#[command(about = "Touch gesture remote for an experiment controller")]
#[command(long_about = "Moose turns touch events into PRESS / RELEASE / CLICK commands and sends
them to an experiment controller over a self-healing TCP connection. The
controller can switch the gesture technique and drive trial logging through
the same connection.

Touch events are read as JSON lines, one event per line, e.g.
  {\"action\":\"down\",\"is_primary_pointer\":true,\"top_left_pointer_pos\":{\"x\":100.0,\"y\":200.0},\"timestamp_ms\":0}

Quick start:
  1. Run 'moose --init' to generate moose.toml
  2. Set the controller host and port in moose.toml
  3. Pipe touch events into 'moose' (or pass --events <file>)")]
pub struct Cli {
    /// Path to config file (defaults to moose.toml, built-in defaults if missing)
    #[arg(short, long, default_value = "moose.toml")]
    pub config: String,

    /// Controller host (overrides config file setting)
    #[arg(long)]
    pub host: Option<String>,

    /// Controller port (overrides config file setting)
    #[arg(long)]
    pub port: Option<u16>,

    /// Touch event source: a JSON-lines file, or '-' for stdin
    #[arg(short, long, default_value = "-")]
    pub events: String,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Write a default config file and exit
    #[arg(long)]
    pub init: bool,
}

impl Cli {
    /// Load the config file (falling back to defaults when it does not
    /// exist), apply command line overrides and validate the result.
    pub fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = if Path::new(&self.config).exists() {
            Config::from_file(&self.config)
                .with_context(|| format!("Failed to load config from '{}'", self.config))?
        } else {
            tracing::info!("No config at '{}', using defaults", self.config);
            Config::default()
        };

        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Write a default config file unless one already exists
pub fn init_config(config_path: &str) -> anyhow::Result<()> {
    if Path::new(config_path).exists() {
        println!("Config file '{}' already exists.", config_path);
        return Ok(());
    }

    let config = Config::default();
    config
        .save(config_path)
        .with_context(|| format!("Failed to write config to '{}'", config_path))?;

    println!("Created {} for controller {}", config_path, config.addr());
    println!("\nNext steps:");
    println!("  1. Edit {} to point at your controller", config_path);
    println!("  2. Run 'moose' and feed it touch events");

    Ok(())
}
