//! ML gateway
//!
//! Authenticates browser users against an external identity provider, keeps
//! their media in an object store, and proxies files and messages to the
//! downstream machine-learning services.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────────────┐
//!                          │                      ML GATEWAY                       │
//!                          │                                                       │
//!     Client Request       │  ┌─────────┐    ┌──────────┐    ┌────────────────┐   │
//!     ─────────────────────┼─▶│  http   │───▶│ session  │───▶│  ml handlers   │   │
//!                          │  │ server  │    │  guard   │    │ (param check)  │   │
//!                          │  └─────────┘    └──────────┘    └───────┬────────┘   │
//!                          │                                         │            │
//!                          │                                         ▼            │
//!                          │                                 ┌────────────────┐   │
//!                          │                                 │ dispatch gate  │   │
//!                          │                                 │   + deadline   │   │
//!                          │                                 └───────┬────────┘   │
//!                          │                                         │ spawn      │
//!                          │                                         ▼            │
//!     Client Response      │  ┌──────────┐                   ┌────────────────┐   │
//!     ◀────────────────────┼──│ response │◀── one outcome ───│ proxy pipeline │◀──┼── ML Service
//!                          │  │  shaping │                   │ encode→send→   │   │   (general,
//!                          │  └──────────┘                   │ read→decode    │   │    audio, ts)
//!                          │                                 └────────────────┘   │
//!                          │  ┌────────────────────────────────────────────────┐  │
//!                          │  │  config · auth/token store · object store ·     │  │
//!                          │  │  observability · lifecycle (signals, sweeper)   │  │
//!                          │  └────────────────────────────────────────────────┘  │
//!                          └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use ml_gateway::config::load_or_default;
use ml_gateway::lifecycle::{build_state, spawn_signal_listener, spawn_sweeper, start_metrics};
use ml_gateway::observability::logging;
use ml_gateway::{HttpServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "ml-gateway", version, about = "ML gateway service")]
struct Args {
    /// Path to the TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_or_default(args.config.as_deref())?;

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ml-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        config_file = ?args.config,
        "Configuration loaded"
    );

    start_metrics(&config)?;

    let bind_address = config.listener.bind_address.clone();
    let state = build_state(config)?;

    let shutdown = Shutdown::new();
    let server = HttpServer::new(state.clone(), &shutdown);
    let sweeper = spawn_sweeper(&state, &shutdown);
    spawn_signal_listener(shutdown.clone());

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    server.run(listener).await?;
    shutdown.trigger();
    let _ = sweeper.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
