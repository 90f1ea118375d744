//! # Acceptor
//! src/server/acceptor.rs
//!
//! Abre el socket de escucha y acepta conexiones en un loop, encolando
//! cada una para los workers. Es el único productor de la cola.

use super::connection::PendingConnection;
use super::lifecycle::ShutdownHandle;
use super::queue::ConnectionQueue;
use crate::config::Config;
use crate::error::ServerError;
use crate::metrics::ServerMetrics;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};

/// Abre el listener con `SO_REUSEADDR` y el backlog configurado
pub fn bind_listener(config: &Config) -> Result<TcpListener, ServerError> {
    let address = config.address();
    let addr: SocketAddr = address
        .to_socket_addrs()
        .map_err(|e| ServerError::bind(address.as_str(), e))?
        .next()
        .ok_or_else(|| ServerError::InvalidAddress(address.clone()))?;

    let backlog = i32::try_from(config.backlog).unwrap_or(i32::MAX);

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| ServerError::bind(address.as_str(), e))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| ServerError::bind(address.as_str(), e))?;
    socket
        .bind(&addr.into())
        .map_err(|e| ServerError::bind(address.as_str(), e))?;
    socket
        .listen(backlog)
        .map_err(|e| ServerError::bind(address.as_str(), e))?;

    Ok(socket.into())
}

/// Acepta conexiones hasta que se pida el apagado
///
/// El flag se revisa antes y después de cada `accept`: la conexión que
/// despierta al acceptor durante el apagado se descarta. Un error de
/// `accept` con el flag puesto es parte del apagado; sin el flag, es fatal.
///
/// Devuelve cuántas conexiones se encolaron.
pub(crate) fn accept_loop(
    listener: &TcpListener,
    queue: &ConnectionQueue<PendingConnection>,
    shutdown: &ShutdownHandle,
    metrics: &ServerMetrics,
) -> Result<u64, ServerError> {
    let mut accepted: u64 = 0;

    while !shutdown.is_triggered() {
        match listener.accept() {
            Ok((stream, peer)) => {
                if shutdown.is_triggered() {
                    tracing::debug!(peer = %peer, "conexión descartada: apagado en curso");
                    break;
                }

                accepted += 1;
                metrics.record_accepted();
                tracing::debug!(conn = accepted, peer = %peer, "conexión aceptada");

                queue.push(PendingConnection::new(accepted, stream, peer));
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                if shutdown.is_triggered() {
                    tracing::debug!(error = %e, "accept interrumpido por el apagado");
                    break;
                }
                tracing::error!(error = %e, "accept falló");
                return Err(ServerError::Accept(e));
            }
        }
    }

    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpStream;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn local_config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            backlog: 16,
            ..Config::default()
        }
    }

    #[test]
    fn test_bind_ephemeral_port() {
        let listener = bind_listener(&local_config()).unwrap();
        let addr = listener.local_addr().unwrap();

        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[test]
    fn test_bind_port_in_use_fails() {
        let first = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = first.local_addr().unwrap().port();

        let config = Config {
            port,
            ..local_config()
        };

        assert!(matches!(bind_listener(&config), Err(ServerError::Bind { .. })));
    }

    #[test]
    fn test_invalid_host_fails() {
        let config = Config {
            host: "not a host".to_string(),
            ..local_config()
        };

        assert!(bind_listener(&config).is_err());
    }

    #[test]
    fn test_accept_loop_enqueues_in_order() {
        let listener = bind_listener(&local_config()).unwrap();
        let addr = listener.local_addr().unwrap();
        let queue = Arc::new(ConnectionQueue::new());
        let shutdown = ShutdownHandle::new();
        let metrics = ServerMetrics::new(1);
        assert!(shutdown.publish_listening(addr));

        let acceptor = {
            let queue = Arc::clone(&queue);
            let shutdown = shutdown.clone();
            let metrics = metrics.clone();
            thread::spawn(move || accept_loop(&listener, &queue, &shutdown, &metrics))
        };

        let clients: Vec<TcpStream> = (0..3).map(|_| TcpStream::connect(addr).unwrap()).collect();
        while queue.len() < 3 {
            thread::sleep(Duration::from_millis(5));
        }

        shutdown.trigger();
        let accepted = acceptor.join().unwrap().unwrap();

        assert_eq!(accepted, 3);
        assert_eq!(metrics.snapshot().accepted, 3);
        let ids: Vec<u64> = queue.drain_remaining().iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        drop(clients);
    }
}
