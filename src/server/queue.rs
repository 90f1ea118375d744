//! # Cola de Conexiones
//! src/server/queue.rs
//!
//! FIFO sin límite entre el acceptor (único productor) y los workers
//! (consumidores). Un `Mutex` protege la cola y un `Condvar` despierta a
//! los workers bloqueados cuando llega una conexión o cuando se cierra.
//!
//! El flag `closed` es atómico para que `close()` nunca tenga que esperar
//! a un worker, pero se escribe antes de tomar el lock y notificar: así un
//! worker que revisó el flag bajo el lock y entró a `wait` siempre recibe
//! la notificación.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Cola FIFO thread-safe de conexiones pendientes
pub struct ConnectionQueue<C> {
    items: Mutex<VecDeque<C>>,
    available: Condvar,
    closed: AtomicBool,
}

impl<C> ConnectionQueue<C> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            closed: AtomicBool::new(false),
        }
    }

    // Un panic con el lock tomado no deja la cola inconsistente:
    // push_back/pop_front no pueden quedar a medias.
    fn lock(&self) -> MutexGuard<'_, VecDeque<C>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Encola al final y despierta a un worker
    pub fn push(&self, item: C) {
        let mut items = self.lock();
        items.push_back(item);
        drop(items);
        self.available.notify_one();
    }

    /// Saca el primer elemento sin bloquear
    pub fn try_pop(&self) -> Option<C> {
        self.lock().pop_front()
    }

    /// Bloquea hasta que haya un elemento o la cola se cierre
    ///
    /// Una cola cerrada se sigue vaciando: `None` sólo cuando está cerrada
    /// y vacía.
    pub fn wait_and_pop(&self) -> Option<C> {
        let mut items = self.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
            if self.is_closed() {
                return None;
            }
            items = self
                .available
                .wait(items)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Marca la cola como cerrada y despierta a todos los workers
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _guard = self.lock();
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Vacía la cola y devuelve lo que quedaba, en orden
    ///
    /// Sólo hace falta cuando no quedan workers que la vacíen.
    pub fn drain_remaining(&self) -> Vec<C> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<C> Default for ConnectionQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}
