//! auth-relay
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                      AUTH RELAY                       │
//!   Client request    │  ┌──────────┐    ┌──────────┐    ┌───────────────┐    │
//!   ──────────────────┼─▶│   net    │───▶│  relay   │───▶│  http codec   │────┼──▶ Origin
//!                     │  │ listener │    │ session  │    │ (verbatim)    │    │
//!                     │  └──────────┘    └────┬─────┘    └───────────────┘    │
//!                     │                       │ 401?                          │
//!                     │                       ▼                               │
//!                     │               ┌───────────────┐                       │
//!                     │               │ auth policy + │  replay 1-2 times     │
//!                     │               │ digest / ntlm │──────────────────────┼──▶ Origin
//!                     │               └───────────────┘                       │
//!   Final response    │                                                       │
//!   ◀─────────────────┼── exactly one response per request ◀──────────────────┼─── Origin
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use auth_relay::config::validation::validate_config;
use auth_relay::config::{read_config, ConfigError, RelayConfig, SchemeKind};
use auth_relay::lifecycle::{signals, Shutdown};
use auth_relay::observability::{logging, metrics};
use auth_relay::ProxyServer;

#[derive(Parser, Debug)]
#[command(name = "auth-relay")]
#[command(about = "Forward proxy that answers Digest and NTLM challenges for its clients", long_about = None)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override auth.scheme (digest or ntlm).
    #[arg(long)]
    scheme: Option<SchemeKind>,

    /// Override listener.bind_address.
    #[arg(long)]
    bind: Option<String>,

    /// Override origin.address (fixed upstream host:port).
    #[arg(long)]
    origin: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut RelayConfig) {
        if let Some(scheme) = self.scheme {
            config.auth.scheme = scheme;
        }
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(origin) = &self.origin {
            config.origin.address = Some(origin.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => RelayConfig::default(),
    };
    args.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(&config.observability)?;
    tracing::info!("auth-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        scheme = %config.auth.scheme,
        bind_address = %config.listener.bind_address,
        origin_host = %config.origin.hostname,
        origin_port = config.origin.port,
        intercept_timeout_secs = config.timeouts.intercept_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // validated above
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let server = ProxyServer::bind(config).await?;
    let local_addr = server.local_addr()?;
    tracing::info!(address = %local_addr, "Listening for connections");
    // scripts read the bound address from stdout
    println!("{}", local_addr);

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        let signal = signals::wait_for_signal().await;
        tracing::info!(signal, "Shutdown requested");
        trigger.trigger();
    });

    server.run(shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
