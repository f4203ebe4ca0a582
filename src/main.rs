use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use littletools::config::{load_config, Settings};
use littletools::http::{HttpClient, HttpServer, ReqwestClient};
use littletools::net::{BindTarget, Listener};
use littletools::observability::{logging, metrics};
use littletools::{handlers, Shutdown};

#[derive(Parser)]
#[command(name = "littletools")]
#[command(about = "HTTP server of small developer tools", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind target (`host:port`, `:port` or `unix/<path>`), overrides config.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.listener.bind = bind;
    }

    logging::init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "littletools starting");
    tracing::info!(
        bind = %config.listener.bind,
        allowed_hosts = ?config.hosts.allowed,
        static_root = ?config.static_files.root,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let target: BindTarget = config.listener.bind.parse()?;
    let routes = handlers::routes()?;

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new(
        Duration::from_secs(config.timeouts.outbound_connect_secs),
        Duration::from_secs(config.timeouts.request_secs),
    )?);
    let settings = Arc::new(Settings::new(config));

    let listener = Listener::bind(&target).await?;

    // Never triggered here; signals stop the server.
    let shutdown = Shutdown::new();
    let server = HttpServer::new(settings, routes, client);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
