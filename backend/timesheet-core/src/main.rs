// src/main.rs
use anyhow::{Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timesheet_core::{api, Config, StoreBackend, SystemClock, TimesheetService};

/// Weekly timesheet portal server.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Address to listen on, e.g. 0.0.0.0:3000
    #[arg(long)]
    bind: Option<String>,

    /// Record store backend. `memory` starts empty apart from the
    /// TIMESHEET_MEMORY_EMPLOYEES accounts and forgets everything on exit
    #[arg(long, value_enum)]
    backend: Option<StoreBackend>,

    /// Directory holding the CSV tables
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env().context("Failed to read TIMESHEET_* configuration")?;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    // --- Assemble Service ---
    let store = config.build_store().context("Failed to set up record store")?;
    let service = Arc::new(TimesheetService::new(
        store,
        Arc::new(SystemClock),
        config.admin_users.clone(),
    ));
    info!("Timesheet service initialized ({} admin users)", config.admin_users.len());

    let app = api::router(service);
    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", config.bind_addr))?;

    // --- Run Web Server ---
    match config.tls_paths() {
        Some((cert_path, key_path)) => {
            let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
                .await
                .with_context(|| {
                    format!(
                        "Failed to load TLS cert/key from {} and {}",
                        cert_path.display(),
                        key_path.display()
                    )
                })?;
            info!("Starting server on https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await
                .context("HTTPS server failed")?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            info!("Listening on http://{}", addr);
            axum::serve(listener, app).await.context("HTTP server failed")?;
        }
    }

    Ok(())
}
