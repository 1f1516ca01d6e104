//! http-sanitizer: a reverse proxy that sanitizes requests before they reach
//! a single upstream origin.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────────┐
//!                       │                  GATEWAY                         │
//!     Client Request    │  ┌────────┐   ┌─────────────┐   ┌────────────┐   │
//!     ──────────────────┼─▶│ server │──▶│ pre_forward │──▶│ hyper-util │───┼──▶ Upstream
//!                       │  └────────┘   │ fields      │   │   client   │   │
//!                       │               │ cookies     │   └─────┬──────┘   │
//!                       │               │ headers     │         │          │
//!                       │               └─────────────┘         ▼          │
//!     Client Response   │               ┌──────────────┐                   │
//!     ◀─────────────────┼───────────────│ post_receive │◀──────────────────┼─── Upstream
//!                       │               └──────────────┘                   │
//!                       │                                                  │
//!                       │  config (TOML) ─▶ RuleSet ─▶ ArcSwap (hot reload) │
//!                       └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use http_sanitizer::config::{load_config, watcher::ConfigWatcher};
use http_sanitizer::http::HttpServer;
use http_sanitizer::lifecycle::{signals, Shutdown, UpstreamSupervisor};
use http_sanitizer::observability::{logging, metrics};
use http_sanitizer::sanitize::{sanitize_field, RuleSet};

#[derive(Parser)]
#[command(name = "http-sanitizer")]
#[command(about = "Reverse proxy that sanitizes HTTP input for a single upstream", long_about = None)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway (default)
    Run,
    /// Load and validate the config, print the compiled rules as JSON
    Check,
    /// Run one field value through the configured rules
    Try {
        #[arg(long)]
        field: String,
        #[arg(long)]
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(cli.config, config).await,
        Commands::Check => {
            let rules = RuleSet::from_config(&config);
            println!("{}", serde_json::to_string_pretty(&rules.summary())?);
            Ok(())
        }
        Commands::Try { field, value } => {
            let rules = RuleSet::from_config(&config);
            let (name, sanitized) = sanitize_field(&rules, &field, &value);
            println!("{}={}", name, sanitized);
            Ok(())
        }
    }
}

async fn run(
    config_path: PathBuf,
    config: http_sanitizer::GatewayConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    logging::init(&config.observability.log_level);
    tracing::info!("http-sanitizer v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.server.bind_address,
        upstream = %config.upstream.url,
        fields = config.fields.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();

    if let Some(command_line) = config.upstream.exec.as_deref() {
        if let Some(supervisor) = UpstreamSupervisor::new(command_line, shutdown.subscribe()) {
            tokio::spawn(supervisor.supervise());
        }
    }

    let (watcher, config_updates) = ConfigWatcher::new(&config_path);
    tokio::spawn(signals::reload_on_sighup(
        config_path.clone(),
        watcher.sender(),
        shutdown.subscribe(),
    ));
    // Dropping the watcher stops it, so keep it for the lifetime of the server.
    let _watcher = match watcher.run() {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::error!(error = %e, "Config watcher failed to start, hot reload disabled");
            None
        }
    };

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
