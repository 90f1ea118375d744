//! # Pool de Recursos
//! src/pool/mod.rs
//!
//! Arreglo fijo de conexiones a la base de datos, indexado 0..N-1.
//!
//! ## Afinidad estática
//!
//! No hay checkout ni devolución: el slot `i` se mueve al thread del worker
//! `i` al arrancar y vuelve al controlador cuando ese thread termina. Como
//! cada slot tiene un único dueño durante toda la vida del proceso, el pool
//! no necesita mutex.
//!
//! ```text
//! open_all ──► [slot 0, slot 1, ..., slot N-1]
//!                 │        │              │
//!              worker 0  worker 1 ...  worker N-1
//!                 │        │              │
//! close_all ◄──── join ────┴──────────────┘
//! ```

pub mod postgres;

pub use self::postgres::PgConnector;

use std::fmt;
use thiserror::Error;

/// Error genérico que devuelve un `Connector`
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errores del pool (fatales al arrancar)
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to open resource slot {index}: {source}")]
    Connect {
        index: usize,
        #[source]
        source: BoxError,
    },

    #[error("resource pool size must be >= 1")]
    EmptyPool,
}

/// Un recurso abierto junto con su índice en el pool
pub struct ResourceSlot<R> {
    index: usize,
    resource: R,
}

impl<R> ResourceSlot<R> {
    pub fn new(index: usize, resource: R) -> Self {
        Self { index, resource }
    }

    /// Índice del slot (igual al índice del worker dueño)
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    pub fn resource_mut(&mut self) -> &mut R {
        &mut self.resource
    }

    pub fn into_parts(self) -> (usize, R) {
        (self.index, self.resource)
    }
}

impl<R> fmt::Debug for ResourceSlot<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceSlot")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// Fábrica de recursos del pool
///
/// Ambas operaciones son síncronas. `disconnect` consume el slot, así que
/// cada recurso se cierra a lo sumo una vez.
pub trait Connector: Send + Sync + 'static {
    type Resource: Send + 'static;

    /// Abre el recurso para el slot `index`
    fn connect(&self, index: usize) -> Result<Self::Resource, BoxError>;

    /// Cierra el recurso; los errores se registran, no se propagan
    fn disconnect(&self, slot: ResourceSlot<Self::Resource>);
}

/// Abre los slots `0..size` en orden
///
/// Si falla el slot `k`, cierra los slots `0..k` ya abiertos antes de
/// devolver el error.
pub fn open_all<K: Connector>(
    connector: &K,
    size: usize,
) -> Result<Vec<ResourceSlot<K::Resource>>, PoolError> {
    if size == 0 {
        return Err(PoolError::EmptyPool);
    }

    let mut slots = Vec::with_capacity(size);

    for index in 0..size {
        match connector.connect(index) {
            Ok(resource) => slots.push(ResourceSlot::new(index, resource)),
            Err(source) => {
                tracing::error!(
                    slot = index,
                    opened = slots.len(),
                    error = %source,
                    "no se pudo abrir el slot; cerrando los ya abiertos"
                );
                close_all(connector, slots);
                return Err(PoolError::Connect { index, source });
            }
        }
    }

    tracing::info!(size, "pool de conexiones abierto");
    Ok(slots)
}

/// Cierra todos los slots recibidos y devuelve cuántos cerró
pub fn close_all<K: Connector>(connector: &K, slots: Vec<ResourceSlot<K::Resource>>) -> usize {
    let count = slots.len();
    for slot in slots {
        tracing::debug!(slot = slot.index(), "cerrando conexión");
        connector.disconnect(slot);
    }
    count
}
