//! # Conexiones PostgreSQL
//! src/pool/postgres.rs
//!
//! `Connector` real del pool: una `postgres::Client` síncrona por slot.

use super::{BoxError, Connector, ResourceSlot};
use crate::config::DbSettings;
use postgres::{Client, NoTls};
use std::time::Duration;

/// Timeout para abrir cada conexión
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Abre conexiones PostgreSQL sin TLS a partir de `DbSettings`
pub struct PgConnector {
    config: postgres::Config,
}

impl PgConnector {
    pub fn new(settings: &DbSettings) -> Self {
        let mut config = postgres::Config::new();
        config
            .dbname(&settings.name)
            .user(&settings.user)
            .password(&settings.password)
            .host(&settings.host)
            .port(settings.port)
            .application_name("pgweb")
            .connect_timeout(CONNECT_TIMEOUT);

        Self { config }
    }
}

impl Connector for PgConnector {
    type Resource = Client;

    fn connect(&self, index: usize) -> Result<Client, BoxError> {
        let client = self.config.connect(NoTls)?;
        tracing::debug!(slot = index, "conexión a PostgreSQL abierta");
        Ok(client)
    }

    fn disconnect(&self, slot: ResourceSlot<Client>) {
        let (index, client) = slot.into_parts();
        if let Err(e) = client.close() {
            tracing::warn!(slot = index, error = %e, "error al cerrar la conexión");
        }
    }
}
