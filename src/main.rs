//! Voidspace gate
//!
//! Authentication and abuse-mitigation front for the Voidspace API.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ request id / trace / timeout
//!                  │
//!                  ▼
//!            security pipeline ──reject──▶ 403 / 413 / 429  ──▶ abuse aggregator
//!   (size → origin → user agent → global limit → CSRF)
//!                  │
//!                  ▼
//!            session middleware (verify, rotate, clear)
//!                  │
//!                  ▼
//!   /api/auth/login   NEP-413 signature → session cookie
//!   /api/auth/session /api/auth/logout
//!   /api/health       /api/cron/maintenance (bearer)
//!
//!   Admin listener: /admin/status /admin/abuse /admin/limits (bearer)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use voidspace_gate::admin::setup_admin_router;
use voidspace_gate::config::{load_config, load_defaults};
use voidspace_gate::http::{AppState, HttpServer};
use voidspace_gate::lifecycle::{wait_for_signal, Shutdown};
use voidspace_gate::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "voidspace-gate", version, about)]
struct Args {
    /// Path to a TOML config file. Defaults plus environment overrides when
    /// omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => load_defaults()?,
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "voidspace-gate starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        domain = %config.site.domain,
        production = config.site.production,
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

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let state = AppState::new(config)?;

    if state.config.admin.enabled {
        let admin_listener = TcpListener::bind(&state.config.admin.bind_address).await?;
        tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");
        let admin = setup_admin_router(state.clone());
        let mut signal = shutdown.subscribe();
        tokio::spawn(async move {
            let served = axum::serve(admin_listener, admin)
                .with_graceful_shutdown(async move {
                    let _ = signal.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    let server = HttpServer::from_state(state);
    let mut server_task = tokio::spawn(server.run(listener, shutdown.clone()));

    tokio::select! {
        result = &mut server_task => {
            result??;
            return Ok(());
        }
        _ = wait_for_signal() => {
            shutdown.trigger();
        }
    }

    server_task.await??;
    tracing::info!("Shutdown complete");
    Ok(())
}
