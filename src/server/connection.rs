//! # Conexiones
//! src/server/connection.rs
//!
//! `PendingConnection` y el pipeline que corre un worker por cada una:
//!
//! ```text
//! read_request ─► parse_request ─► handler.handle ─► cerrar
//! ```
//!
//! Cualquier error en el camino se registra y termina sólo esa conexión.
//! Un request malformado se cierra sin respuesta.

use super::lifecycle::ShutdownHandle;
use crate::http::{parse_request, read_request, ReadLimits, StatusCode};
use crate::metrics::ServerMetrics;
use crate::pool::ResourceSlot;
use crate::router::RequestHandler;
use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Socket aceptado, con dueño único en cada etapa
#[derive(Debug)]
pub struct PendingConnection {
    id: u64,
    stream: TcpStream,
    peer: SocketAddr,
}

impl PendingConnection {
    pub fn new(id: u64, stream: TcpStream, peer: SocketAddr) -> Self {
        Self { id, stream, peer }
    }

    /// Número de conexión asignado por el acceptor (empieza en 1)
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Cierra la conexión sin enviar nada
    pub fn close(self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Todo lo que un worker necesita para atender conexiones, compartido
pub(crate) struct ConnectionContext<H> {
    pub handler: Arc<H>,
    pub metrics: ServerMetrics,
    pub shutdown: ShutdownHandle,
    pub limits: ReadLimits,
    pub read_timeout: Option<Duration>,
}

/// Atiende una conexión completa con el slot del worker
pub(crate) fn serve_connection<R, H>(
    conn: PendingConnection,
    slot: &mut ResourceSlot<R>,
    ctx: &ConnectionContext<H>,
) where
    H: RequestHandler<R>,
{
    let started = Instant::now();
    let worker = slot.index();
    let PendingConnection {
        id,
        mut stream,
        peer,
    } = conn;

    tracing::debug!(worker, conn = id, peer = %peer, "conexión asignada");

    if let Err(e) = stream.set_read_timeout(ctx.read_timeout) {
        tracing::warn!(worker, conn = id, error = %e, "no se pudo configurar el timeout de lectura");
    }

    let raw = match read_request(&mut stream, ctx.limits) {
        Ok(raw) => raw,
        Err(e) => {
            if ctx.shutdown.is_triggered() {
                tracing::debug!(worker, conn = id, error = %e, "lectura interrumpida por el apagado");
            } else {
                tracing::warn!(worker, conn = id, peer = %peer, error = %e, "falló la lectura del request");
                ctx.metrics.record_read_failure();
            }
            close(stream);
            return;
        }
    };

    if raw.is_empty() {
        tracing::debug!(worker, conn = id, "el peer cerró sin enviar datos");
        close(stream);
        return;
    }

    let request = match parse_request(raw.as_bytes()) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(worker, conn = id, peer = %peer, error = %e, "request rechazado");
            ctx.metrics.record_parse_rejected();
            close(stream);
            return;
        }
    };
    drop(raw);

    tracing::debug!(
        worker,
        conn = id,
        method = request.method(),
        path = request.path(),
        "request recibido"
    );

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        ctx.handler.handle(&mut stream, slot, &request)
    }));

    let status = match outcome {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            tracing::error!(worker, conn = id, path = request.path(), error = %e, "falló el handler");
            ctx.metrics.record_handler_failure();
            StatusCode::InternalServerError
        }
        Err(_) => {
            tracing::error!(worker, conn = id, path = request.path(), "panic en el handler");
            ctx.metrics.record_handler_failure();
            StatusCode::InternalServerError
        }
    };

    let elapsed = started.elapsed();
    ctx.metrics.record_served(worker, status.as_u16(), elapsed);
    tracing::debug!(
        worker,
        conn = id,
        status = status.as_u16(),
        elapsed_us = elapsed.as_micros() as u64,
        "request atendido"
    );

    close(stream);
}

fn close(mut stream: TcpStream) {
    let _ = stream.flush();
    let _ = stream.shutdown(Shutdown::Both);
}
