//! # Pool de Workers
//! src/server/worker.rs
//!
//! N threads fijos. El worker `i` recibe el slot `i` del pool al arrancar,
//! lo usa para cada conexión que atiende y lo devuelve al terminar, a
//! través del `JoinHandle`. Ningún otro thread toca ese slot.

use super::queue::ConnectionQueue;
use crate::pool::ResourceSlot;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

struct WorkerHandle<R> {
    index: usize,
    thread: JoinHandle<ResourceSlot<R>>,
}

/// Workers en ejecución, cada uno dueño de su slot
pub struct WorkerPool<R> {
    workers: Vec<WorkerHandle<R>>,
}

/// Falla al crear el thread del worker `index`
///
/// `recovered` trae los slots que se pudieron recuperar (los de workers ya
/// lanzados y los que no llegaron a asignarse) para que el llamador los
/// cierre. El slot `index` se movió al closure que no llegó a correr y se
/// libera con él.
pub struct SpawnFailure<R> {
    pub index: usize,
    pub source: io::Error,
    pub recovered: Vec<ResourceSlot<R>>,
}

/// Resultado de `WorkerPool::join`
pub struct JoinReport<R> {
    /// Slots devueltos por los workers, en orden de índice
    pub slots: Vec<ResourceSlot<R>>,
    /// Workers cuyo thread terminó en panic (su slot se perdió)
    pub lost: Vec<usize>,
}

impl<R: Send + 'static> WorkerPool<R> {
    /// Lanza un worker por slot
    ///
    /// Cada worker repite `wait_and_pop` y le pasa la conexión a `process`
    /// junto con su slot, hasta que la cola queda cerrada y vacía. Si `process` entra en
    /// panic, el worker lo registra y sigue con la próxima conexión.
    ///
    /// Si falla la creación de un thread, la cola se cierra, se espera a los
    /// workers ya lanzados y se devuelven sus slots en `SpawnFailure`.
    pub fn spawn<C, F>(
        queue: Arc<ConnectionQueue<C>>,
        slots: Vec<ResourceSlot<R>>,
        process: F,
    ) -> Result<Self, SpawnFailure<R>>
    where
        C: Send + 'static,
        F: Fn(C, &mut ResourceSlot<R>) + Send + Sync + 'static,
    {
        let process = Arc::new(process);
        let mut workers = Vec::with_capacity(slots.len());
        let mut pending = slots.into_iter();

        while let Some(slot) = pending.next() {
            let index = slot.index();
            let worker_queue = Arc::clone(&queue);
            let worker_process = Arc::clone(&process);

            let spawned = thread::Builder::new()
                .name(format!("worker-{}", index))
                .spawn(move || worker_loop(worker_queue, slot, &*worker_process));

            match spawned {
                Ok(thread) => workers.push(WorkerHandle { index, thread }),
                Err(source) => {
                    tracing::error!(worker = index, error = %source, "no se pudo crear el worker");
                    queue.close();

                    let report = WorkerPool { workers }.join();
                    let mut recovered = report.slots;
                    recovered.extend(pending);

                    return Err(SpawnFailure {
                        index,
                        source,
                        recovered,
                    });
                }
            }
        }

        tracing::info!(workers = workers.len(), "workers iniciados");
        Ok(Self { workers })
    }
}

impl<R> WorkerPool<R> {
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Espera a todos los workers y recupera sus slots
    ///
    /// Sólo retorna cuando cada worker vio la cola cerrada y vacía, así que
    /// hay que llamar a `ConnectionQueue::close` antes.
    pub fn join(self) -> JoinReport<R> {
        let mut slots = Vec::with_capacity(self.workers.len());
        let mut lost = Vec::new();

        for worker in self.workers {
            match worker.thread.join() {
                Ok(slot) => slots.push(slot),
                Err(_) => {
                    tracing::error!(worker = worker.index, "el thread del worker terminó en panic");
                    lost.push(worker.index);
                }
            }
        }

        JoinReport { slots, lost }
    }
}

fn worker_loop<C, R, F>(
    queue: Arc<ConnectionQueue<C>>,
    mut slot: ResourceSlot<R>,
    process: &F,
) -> ResourceSlot<R>
where
    F: Fn(C, &mut ResourceSlot<R>),
{
    let index = slot.index();
    let mut handled: u64 = 0;
    tracing::debug!(worker = index, "worker iniciado");

    while let Some(conn) = queue.wait_and_pop() {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| process(conn, &mut slot)));
        if outcome.is_err() {
            tracing::error!(worker = index, "panic procesando una conexión; el worker continúa");
        }
        handled += 1;
    }

    tracing::debug!(worker = index, handled, "worker terminado");
    slot
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    fn slots(n: usize) -> Vec<ResourceSlot<usize>> {
        (0..n).map(|i| ResourceSlot::new(i, 0)).collect()
    }

    fn wait_until_empty<C>(queue: &ConnectionQueue<C>) {
        while !queue.is_empty() {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_each_connection_served_once() {
        let queue = Arc::new(ConnectionQueue::new());
        let served = Arc::new(Mutex::new(Vec::new()));

        let pool = {
            let served = Arc::clone(&served);
            WorkerPool::spawn(Arc::clone(&queue), slots(4), move |conn: u32, _slot| {
                served.lock().unwrap().push(conn);
            })
            .ok()
            .unwrap()
        };
        assert_eq!(pool.len(), 4);

        for conn in 0..500 {
            queue.push(conn);
        }
        wait_until_empty(&queue);
        thread::sleep(Duration::from_millis(50));
        queue.close();
        let report = pool.join();

        let served = served.lock().unwrap();
        assert_eq!(served.len(), 500);
        let unique: HashSet<u32> = served.iter().copied().collect();
        assert_eq!(unique.len(), 500);
        assert_eq!(report.slots.len(), 4);
        assert!(report.lost.is_empty());
    }

    #[test]
    fn test_slot_affinity_is_stable() {
        let queue = Arc::new(ConnectionQueue::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let pool = {
            let seen = Arc::clone(&seen);
            WorkerPool::spawn(Arc::clone(&queue), slots(3), move |_conn: (), slot| {
                let name = thread::current().name().unwrap().to_string();
                *slot.resource_mut() += 1;
                seen.lock().unwrap().push((name, slot.index()));
                thread::sleep(Duration::from_millis(1));
            })
            .ok()
            .unwrap()
        };

        for _ in 0..60 {
            queue.push(());
        }
        wait_until_empty(&queue);
        thread::sleep(Duration::from_millis(50));
        queue.close();
        let report = pool.join();

        for (name, index) in seen.lock().unwrap().iter() {
            assert_eq!(name, &format!("worker-{}", index));
        }

        // Cada slot volvió con el conteo de su propio worker
        let indexes: Vec<usize> = report.slots.iter().map(|s| s.index()).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        let total: usize = report.slots.iter().map(|s| *s.resource()).sum();
        assert_eq!(total, 60);
    }

    #[test]
    fn test_panic_does_not_kill_worker() {
        let queue = Arc::new(ConnectionQueue::new());
        let served = Arc::new(Mutex::new(Vec::new()));

        let pool = {
            let served = Arc::clone(&served);
            WorkerPool::spawn(Arc::clone(&queue), slots(1), move |conn: u32, _slot| {
                if conn == 1 {
                    panic!("handler roto");
                }
                served.lock().unwrap().push(conn);
            })
            .ok()
            .unwrap()
        };

        queue.push(1);
        queue.push(2);
        queue.push(3);
        wait_until_empty(&queue);
        thread::sleep(Duration::from_millis(50));
        queue.close();
        let report = pool.join();

        assert_eq!(*served.lock().unwrap(), vec![2, 3]);
        assert_eq!(report.slots.len(), 1);
        assert!(report.lost.is_empty());
    }

    #[test]
    fn test_idle_workers_exit_on_close() {
        let queue: Arc<ConnectionQueue<u32>> = Arc::new(ConnectionQueue::new());
        let pool = WorkerPool::spawn(Arc::clone(&queue), slots(8), |_conn, _slot| {})
            .ok()
            .unwrap();

        thread::sleep(Duration::from_millis(20));
        queue.close();

        let report = pool.join();
        assert_eq!(report.slots.len(), 8);
    }
}
