//! `formkeeper` - CLI for the form-collection service.
//!
//! This binary serves the static site, relays form submissions over the
//! loopback datagram channel, and records them in the JSON store.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use formkeeper::cli::{Cli, Command, ConfigCommand};
use formkeeper::{init_logging, Config, HttpServer, JsonStore, RelayListener};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::Serve => run_serve(&config),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

fn run_serve(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(config))
}

/// Run both long-lived tasks until one fails or an interrupt arrives.
///
/// The two tasks share nothing in memory; the store belongs to the relay
/// side and the HTTP side only ever sends datagrams at it.
async fn serve(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(JsonStore::open(&config.storage.store_path)?);

    let relay = RelayListener::bind(
        config.relay.socket_addr(),
        Arc::clone(&store),
        config.relay.max_datagram_bytes,
    )
    .await?;

    let http = HttpServer::bind(
        config.http.socket_addr(),
        config.http.web_root.clone(),
        config.relay.socket_addr(),
    )
    .await?;

    info!(
        "Serving {} on http://{}",
        config.http.web_root.display(),
        config.http.socket_addr()
    );

    tokio::select! {
        res = http.run() => res?,
        res = relay.run() => res?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, shutting down");
        }
    }

    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[HTTP]");
                println!("  Bind address:    {}", config.http.socket_addr());
                println!("  Web root:        {}", config.http.web_root.display());
                println!();
                println!("[Relay]");
                println!("  Bind address:    {}", config.relay.socket_addr());
                println!("  Max datagram:    {} bytes", config.relay.max_datagram_bytes);
                println!();
                println!("[Storage]");
                println!("  Store file:      {}", config.storage.store_path.display());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
