//! # Collector de Métricas
//! src/metrics/collector.rs
//!
//! Contadores del acceptor y de los workers. El lock es propio del
//! collector y se toma sólo para actualizar números, nunca durante I/O.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Máximo de latencias a guardar (para calcular percentiles)
const MAX_LATENCIES: usize = 10_000;

/// Collector de métricas thread-safe
#[derive(Clone)]
pub struct ServerMetrics {
    inner: Arc<Mutex<MetricsData>>,
    start_time: Instant,
}

struct MetricsData {
    accepted: u64,
    served: u64,
    parse_rejected: u64,
    read_failures: u64,
    handler_failures: u64,

    /// Requests atendidos por cada worker (índice = slot)
    served_per_worker: Vec<u64>,

    status_codes: BTreeMap<u16, u64>,

    /// Latencias en microsegundos, ventana circular
    latencies: Vec<u64>,
    next_latency: usize,
}

impl ServerMetrics {
    pub fn new(workers: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsData {
                accepted: 0,
                served: 0,
                parse_rejected: 0,
                read_failures: 0,
                handler_failures: 0,
                served_per_worker: vec![0; workers],
                status_codes: BTreeMap::new(),
                latencies: Vec::with_capacity(MAX_LATENCIES.min(1024)),
                next_latency: 0,
            })),
            start_time: Instant::now(),
        }
    }

    fn data(&self) -> MutexGuard<'_, MetricsData> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_accepted(&self) {
        self.data().accepted += 1;
    }

    /// Registra un request atendido por el worker `worker`
    pub fn record_served(&self, worker: usize, status_code: u16, latency: Duration) {
        let mut data = self.data();

        data.served += 1;
        if let Some(count) = data.served_per_worker.get_mut(worker) {
            *count += 1;
        }
        *data.status_codes.entry(status_code).or_insert(0) += 1;

        let latency_us = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        if data.latencies.len() < MAX_LATENCIES {
            data.latencies.push(latency_us);
        } else {
            let slot = data.next_latency;
            data.latencies[slot] = latency_us;
        }
        data.next_latency = (data.next_latency + 1) % MAX_LATENCIES;
    }

    pub fn record_parse_rejected(&self) {
        self.data().parse_rejected += 1;
    }

    pub fn record_read_failure(&self) {
        self.data().read_failures += 1;
    }

    pub fn record_handler_failure(&self) {
        self.data().handler_failures += 1;
    }

    /// Foto de las métricas actuales
    pub fn snapshot(&self) -> MetricsSnapshot {
        let data = self.data();
        let (p50, p95, p99, avg) = calculate_percentiles(&data.latencies);

        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            accepted: data.accepted,
            served: data.served,
            parse_rejected: data.parse_rejected,
            read_failures: data.read_failures,
            handler_failures: data.handler_failures,
            served_per_worker: data.served_per_worker.clone(),
            status_codes: data.status_codes.clone(),
            latency_p50_us: p50,
            latency_p95_us: p95,
            latency_p99_us: p99,
            latency_avg_us: avg,
        }
    }
}

/// Calcula (p50, p95, p99, promedio)
fn calculate_percentiles(latencies: &[u64]) -> (u64, u64, u64, u64) {
    if latencies.is_empty() {
        return (0, 0, 0, 0);
    }

    let mut sorted = latencies.to_vec();
    sorted.sort_unstable();

    let len = sorted.len();
    let p50 = sorted[len * 50 / 100];
    let p95 = sorted[len * 95 / 100];
    let p99 = sorted[len * 99 / 100];

    let sum: u64 = sorted.iter().sum();
    (p50, p95, p99, sum / len as u64)
}

/// Snapshot serializable de las métricas
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub accepted: u64,
    pub served: u64,
    pub parse_rejected: u64,
    pub read_failures: u64,
    pub handler_failures: u64,
    pub served_per_worker: Vec<u64>,
    pub status_codes: BTreeMap<u16, u64>,
    pub latency_p50_us: u64,
    pub latency_p95_us: u64,
    pub latency_p99_us: u64,
    pub latency_avg_us: u64,
}

impl MetricsSnapshot {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
