//! # Ciclo de Vida del Servidor
//! src/server/lifecycle.rs
//!
//! ```text
//! Starting ──► Listening ──► Draining ──► Stopped
//! ```
//!
//! El flag de apagado es el único estado que todos los threads leen sin
//! tomar el lock de la cola. `ShutdownHandle::trigger` lo activa y despierta
//! al acceptor conectándose una vez a la dirección del listener; el
//! acceptor revisa el flag después de cada `accept` y descarta esa conexión.

use crate::error::ServerError;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;
use signal_hook::iterator::{Handle as SignalsHandle, Signals};
use signal_hook::SigId;
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Timeout de la conexión que despierta al acceptor
const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Fase del servidor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Listening,
    Draining,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Listening => "listening",
            LifecycleState::Draining => "draining",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

struct Phase {
    state: LifecycleState,
    local_addr: Option<SocketAddr>,
}

struct Shared {
    shutdown: AtomicBool,
    phase: Mutex<Phase>,
    changed: Condvar,
}

/// Handle clonable para observar el ciclo de vida y pedir el apagado
#[derive(Clone)]
pub struct ShutdownHandle {
    shared: Arc<Shared>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                shutdown: AtomicBool::new(false),
                phase: Mutex::new(Phase {
                    state: LifecycleState::Starting,
                    local_addr: None,
                }),
                changed: Condvar::new(),
            }),
        }
    }

    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.shared
            .phase
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Pide el apagado ordenado; llamadas repetidas no hacen nada
    pub fn trigger(&self) {
        let wake_addr = {
            let phase = self.phase();
            if self.shared.shutdown.swap(true, Ordering::SeqCst) {
                return;
            }
            phase.local_addr
        };
        self.shared.changed.notify_all();

        tracing::info!("apagado solicitado");

        if let Some(addr) = wake_addr {
            wake_acceptor(addr);
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.shared.shutdown.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> LifecycleState {
        self.phase().state
    }

    /// Dirección local del listener, una vez publicada
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.phase().local_addr
    }

    /// Espera a que el servidor esté escuchando y devuelve su dirección
    ///
    /// Devuelve `None` si se agota el timeout o si el servidor terminó sin
    /// llegar a escuchar.
    pub fn wait_until_listening(&self, timeout: Duration) -> Option<SocketAddr> {
        let deadline = Instant::now() + timeout;
        let mut phase = self.phase();
        loop {
            match phase.state {
                LifecycleState::Listening => return phase.local_addr,
                LifecycleState::Stopped => return None,
                _ => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            phase = self
                .shared
                .changed
                .wait_timeout(phase, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Espera a que el servidor llegue a `Stopped`
    pub fn wait_until_stopped(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut phase = self.phase();
        while phase.state != LifecycleState::Stopped {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            phase = self
                .shared
                .changed
                .wait_timeout(phase, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Publica la dirección y pasa a `Listening`
    ///
    /// Devuelve `false` si el apagado ya fue pedido: en ese caso el
    /// acceptor no debe arrancar. El chequeo y la publicación ocurren bajo
    /// el mismo lock que usa `trigger`, así que ningún trigger se pierde.
    pub(crate) fn publish_listening(&self, addr: SocketAddr) -> bool {
        let mut phase = self.phase();
        if self.is_triggered() {
            return false;
        }
        phase.local_addr = Some(addr);
        phase.state = LifecycleState::Listening;
        drop(phase);
        self.shared.changed.notify_all();
        true
    }

    pub(crate) fn set_state(&self, state: LifecycleState) {
        let mut phase = self.phase();
        if phase.state != state {
            tracing::info!(from = %phase.state, to = %state, "cambio de estado");
            phase.state = state;
        }
        drop(phase);
        self.shared.changed.notify_all();
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Conecta una vez al listener para que un `accept` bloqueado retorne
fn wake_acceptor(addr: SocketAddr) {
    let target = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => SocketAddr::new(Ipv4Addr::LOCALHOST.into(), addr.port()),
        IpAddr::V6(ip) if ip.is_unspecified() => SocketAddr::new(Ipv6Addr::LOCALHOST.into(), addr.port()),
        _ => addr,
    };

    if let Err(e) = TcpStream::connect_timeout(&target, WAKE_TIMEOUT) {
        tracing::debug!(addr = %target, error = %e, "no se pudo despertar al acceptor");
    }
}

/// Mantiene vivo el thread que escucha SIGINT/SIGTERM
///
/// Al hacer drop se cierra el iterador de señales, se espera al thread y
/// se quita la salida forzada por segunda señal.
pub struct SignalGuard {
    handle: SignalsHandle,
    thread: Option<JoinHandle<()>>,
    armed: Arc<AtomicBool>,
    hooks: Vec<SigId>,
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        for id in self.hooks.drain(..) {
            signal_hook::low_level::unregister(id);
        }
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Instala el manejador de SIGINT y SIGTERM
///
/// La primera señal se recibe en un thread dedicado, fuera del contexto
/// del handler, que sólo llama a `trigger`. Una segunda señal mientras el
/// apagado sigue en curso termina el proceso con `128 + señal`.
pub fn install_signal_handler(shutdown: ShutdownHandle) -> Result<SignalGuard, ServerError> {
    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(ServerError::Signal)?;
    let handle = signals.handle();

    let armed = Arc::new(AtomicBool::new(false));
    let hooks = match register_forced_exit(&armed) {
        Ok(hooks) => hooks,
        Err(e) => {
            handle.close();
            return Err(ServerError::Signal(e));
        }
    };

    let spawned = thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                tracing::info!(signal, "señal recibida");
                shutdown.trigger();
            }
        });

    let thread = match spawned {
        Ok(thread) => thread,
        Err(e) => {
            for id in hooks {
                signal_hook::low_level::unregister(id);
            }
            handle.close();
            return Err(ServerError::Signal(e));
        }
    };

    Ok(SignalGuard {
        handle,
        thread: Some(thread),
        armed,
        hooks,
    })
}

// El hook condicional va primero: con la primera señal ve el flag en
// false y recién después `flag::register` lo pone en true.
fn register_forced_exit(armed: &Arc<AtomicBool>) -> io::Result<Vec<SigId>> {
    let mut hooks = Vec::with_capacity(4);
    for signal in [SIGINT, SIGTERM] {
        let registered = flag::register_conditional_shutdown(signal, 128 + signal, Arc::clone(armed))
            .and_then(|exit_id| {
                hooks.push(exit_id);
                flag::register(signal, Arc::clone(armed))
            });
        match registered {
            Ok(id) => hooks.push(id),
            Err(e) => {
                for id in hooks {
                    signal_hook::low_level::unregister(id);
                }
                return Err(e);
            }
        }
    }
    Ok(hooks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_initial_state() {
        let handle = ShutdownHandle::new();
        assert_eq!(handle.state(), LifecycleState::Starting);
        assert!(!handle.is_triggered());
        assert_eq!(handle.local_addr(), None);
    }

    #[test]
    fn test_trigger_is_idempotent() {
        let handle = ShutdownHandle::new();
        handle.trigger();
        handle.trigger();
        assert!(handle.is_triggered());
    }

    #[test]
    fn test_publish_after_trigger_is_refused() {
        let handle = ShutdownHandle::new();
        handle.trigger();

        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
        assert!(!handle.publish_listening(addr));
        assert_eq!(handle.state(), LifecycleState::Starting);
    }

    #[test]
    fn test_wait_until_listening_returns_addr() {
        let handle = ShutdownHandle::new();
        let addr: SocketAddr = "127.0.0.1:4321".parse().unwrap();

        let publisher = {
            let handle = handle.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                handle.publish_listening(addr)
            })
        };

        assert_eq!(handle.wait_until_listening(Duration::from_secs(5)), Some(addr));
        assert!(publisher.join().unwrap());
    }

    #[test]
    fn test_wait_until_listening_times_out() {
        let handle = ShutdownHandle::new();
        assert_eq!(handle.wait_until_listening(Duration::from_millis(20)), None);
    }

    #[test]
    fn test_wait_until_stopped() {
        let handle = ShutdownHandle::new();
        assert!(!handle.wait_until_stopped(Duration::from_millis(10)));

        handle.set_state(LifecycleState::Stopped);
        assert!(handle.wait_until_stopped(Duration::from_millis(10)));
        assert_eq!(handle.wait_until_listening(Duration::from_millis(10)), None);
    }

    #[test]
    fn test_trigger_wakes_blocked_accept() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let handle = ShutdownHandle::new();
        assert!(handle.publish_listening(listener.local_addr().unwrap()));

        let acceptor = thread::spawn(move || listener.accept().is_ok());

        thread::sleep(Duration::from_millis(30));
        handle.trigger();

        assert!(acceptor.join().unwrap());
    }

    #[test]
    fn test_first_signal_triggers_and_arms_forced_exit() {
        let handle = ShutdownHandle::new();
        let guard = install_signal_handler(handle.clone()).unwrap();
        assert!(!guard.armed.load(Ordering::SeqCst));
        assert_eq!(guard.hooks.len(), 4);

        signal_hook::low_level::raise(SIGTERM).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !handle.is_triggered() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(handle.is_triggered());
        // Una segunda señal ahora terminaría el proceso
        assert!(guard.armed.load(Ordering::SeqCst));

        drop(guard);
    }

    #[test]
    fn test_unspecified_addr_wakes_via_loopback() {
        let listener = TcpListener::bind("0.0.0.0:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = ShutdownHandle::new();
        assert!(handle.publish_listening(SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), port)));

        let acceptor = thread::spawn(move || listener.accept().map(|(_, peer)| peer.ip()));

        handle.trigger();

        let peer = acceptor.join().unwrap().unwrap();
        assert!(peer.is_loopback());
    }
}
