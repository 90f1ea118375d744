//! # pgweb - Entry Point
//! src/main.rs
//!
//! Orden de arranque:
//! 1. Logging y configuración
//! 2. Manejador de SIGINT/SIGTERM
//! 3. `Server::run`: pool de conexiones, workers, listener
//!
//! El proceso termina con código distinto de cero si el arranque falla o
//! si `accept` falla fuera de un apagado.

use anyhow::Context;
use clap::Parser;
use pgweb::config::{Config, DbSettings};
use pgweb::pool::PgConnector;
use pgweb::server::{install_signal_handler, Server};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pgweb=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_thread_names(true))
        .init();

    let config = Config::parse();
    config.validate().context("invalid configuration")?;

    let settings = DbSettings::from_env_file(&config.env_file)
        .with_context(|| format!("loading database settings from {}", config.env_file.display()))?;
    tracing::debug!(?settings, "parámetros de base de datos");

    let server = Server::new(config, PgConnector::new(&settings), pgweb::app::router());

    let _signals = install_signal_handler(server.shutdown_handle())?;

    let summary = server.run()?;

    tracing::info!(
        dropped_pending = summary.dropped_pending,
        slots_closed = summary.slots_closed,
        "apagado completo"
    );
    Ok(())
}
