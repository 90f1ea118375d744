//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! Controlador del ciclo de vida. Arma las piezas en orden y las desarma
//! en el orden inverso:
//!
//! 1. Abre los N slots del pool de recursos
//! 2. Lanza los N workers, el worker `i` con el slot `i`
//! 3. Abre el listener (bind + listen) y pasa a `Listening`
//! 4. Acepta conexiones hasta que se pida el apagado
//! 5. `Draining`: cierra la cola, los workers atienden lo que quedaba
//!    encolado y terminan; después se cierran los slots
//!
//! ```text
//!              ┌──────────┐  push   ┌─────────────────┐  wait_and_pop
//! clientes ──► │ acceptor │ ──────► │ ConnectionQueue │ ─────────────► worker i (slot i)
//!              └──────────┘         └─────────────────┘
//! ```
//!
//! El manejador de señales se instala aparte (`install_signal_handler`)
//! antes de llamar a `run`, con el handle que devuelve `shutdown_handle`.

pub mod acceptor;
pub mod connection;
pub mod lifecycle;
pub mod queue;
pub mod worker;

pub use connection::PendingConnection;
pub use lifecycle::{install_signal_handler, LifecycleState, ShutdownHandle, SignalGuard};
pub use queue::ConnectionQueue;
pub use worker::{JoinReport, SpawnFailure, WorkerPool};

use crate::config::Config;
use crate::error::ServerError;
use crate::metrics::{MetricsSnapshot, ServerMetrics};
use crate::pool::{self, Connector};
use crate::router::RequestHandler;
use connection::{serve_connection, ConnectionContext};
use std::net::SocketAddr;
use std::sync::Arc;

/// Resumen que devuelve `Server::run` al terminar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Dirección donde escuchó el servidor (si llegó a escuchar)
    pub local_addr: Option<SocketAddr>,
    /// Conexiones encoladas que ningún worker llegó a tomar (sólo si no
    /// quedó ningún worker vivo)
    pub dropped_pending: usize,
    /// Slots cerrados al final
    pub slots_closed: usize,
    /// Workers cuyo thread terminó en panic
    pub lost_workers: Vec<usize>,
    pub metrics: MetricsSnapshot,
}

/// Servidor HTTP con pool fijo de workers y recursos
pub struct Server<K, H> {
    config: Config,
    connector: K,
    handler: Arc<H>,
    shutdown: ShutdownHandle,
    metrics: ServerMetrics,
}

impl<K, H> Server<K, H>
where
    K: Connector,
    H: RequestHandler<K::Resource>,
{
    pub fn new(config: Config, connector: K, handler: H) -> Self {
        let metrics = ServerMetrics::new(config.workers);
        Self {
            config,
            connector,
            handler: Arc::new(handler),
            shutdown: ShutdownHandle::new(),
            metrics,
        }
    }

    /// Handle para observar el estado y pedir el apagado desde otro thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn metrics(&self) -> ServerMetrics {
        self.metrics.clone()
    }

    /// Corre el servidor hasta que se pida el apagado
    ///
    /// Bloquea el thread actual. Los errores de arranque devuelven `Err`
    /// después de cerrar todo lo que ya estaba abierto; un error fatal de
    /// `accept` dispara el mismo apagado ordenado que una señal.
    pub fn run(self) -> Result<RunSummary, ServerError> {
        let result = self.start_and_serve();
        self.shutdown.set_state(LifecycleState::Stopped);
        result
    }

    fn start_and_serve(&self) -> Result<RunSummary, ServerError> {
        self.config.validate()?;
        self.config.log_summary();

        let slots = pool::open_all(&self.connector, self.config.workers)?;

        let queue: Arc<ConnectionQueue<PendingConnection>> = Arc::new(ConnectionQueue::new());
        let ctx = ConnectionContext {
            handler: Arc::clone(&self.handler),
            metrics: self.metrics.clone(),
            shutdown: self.shutdown.clone(),
            limits: self.config.read_limits(),
            read_timeout: self.config.read_timeout(),
        };

        let workers = match WorkerPool::spawn(Arc::clone(&queue), slots, move |conn, slot| {
            serve_connection(conn, slot, &ctx)
        }) {
            Ok(workers) => workers,
            Err(failure) => {
                pool::close_all(&self.connector, failure.recovered);
                return Err(ServerError::WorkerSpawn {
                    index: failure.index,
                    source: failure.source,
                });
            }
        };

        let outcome = self.listen(&queue);

        // Draining: la cola se cierra recién cuando el acceptor ya salió y
        // los workers la vacían antes de terminar
        self.shutdown.set_state(LifecycleState::Draining);
        queue.close();
        let report = workers.join();

        // Sólo queda algo si se perdieron todos los workers
        let pending = queue.drain_remaining();
        let dropped_pending = pending.len();
        for conn in pending {
            tracing::debug!(conn = conn.id(), peer = %conn.peer(), "conexión encolada descartada");
            conn.close();
        }

        let slots_closed = pool::close_all(&self.connector, report.slots);
        let metrics = self.metrics.snapshot();

        tracing::info!(
            dropped_pending,
            slots_closed,
            lost_workers = report.lost.len(),
            served = metrics.served,
            "servidor detenido"
        );
        tracing::info!(metrics = %metrics.to_json(), "métricas finales");

        let local_addr = outcome?;
        Ok(RunSummary {
            local_addr,
            dropped_pending,
            slots_closed,
            lost_workers: report.lost,
            metrics,
        })
    }

    /// Abre el listener y corre el acceptor; el listener se cierra al volver
    fn listen(
        &self,
        queue: &ConnectionQueue<PendingConnection>,
    ) -> Result<Option<SocketAddr>, ServerError> {
        let listener = acceptor::bind_listener(&self.config)?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::bind(self.config.address(), e))?;

        if !self.shutdown.publish_listening(local_addr) {
            tracing::info!("apagado pedido antes de escuchar");
            return Ok(Some(local_addr));
        }
        tracing::info!(address = %local_addr, "servidor escuchando");

        match acceptor::accept_loop(&listener, queue, &self.shutdown, &self.metrics) {
            Ok(accepted) => {
                tracing::info!(accepted, "acceptor detenido");
                Ok(Some(local_addr))
            }
            Err(e) => {
                self.shutdown.trigger();
                Err(e)
            }
        }
    }
}
