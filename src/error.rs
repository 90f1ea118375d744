//! # Errores del Servidor
//! src/error.rs
//!
//! Errores fatales de arranque y del acceptor. Los errores por conexión
//! (lectura, parsing, handler) se registran y nunca llegan hasta acá.

use crate::config::ConfigError;
use crate::pool::PoolError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("resource pool: {0}")]
    Pool(#[from] PoolError),

    #[error("failed to spawn worker {index}: {source}")]
    WorkerSpawn {
        index: usize,
        #[source]
        source: io::Error,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid listen address {0}")]
    InvalidAddress(String),

    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    #[error("failed to install signal handler: {0}")]
    Signal(#[source] io::Error),
}

impl ServerError {
    pub(crate) fn bind(addr: impl Into<String>, source: io::Error) -> Self {
        ServerError::Bind {
            addr: addr.into(),
            source,
        }
    }
}
