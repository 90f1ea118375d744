//! # Sistema de Métricas
//! src/metrics/mod.rs
//!
//! - Conexiones aceptadas
//! - Requests atendidos por worker
//! - Rechazos de parsing, fallas de lectura y de handlers
//! - Latencias (p50, p95, p99)

pub mod collector;

pub use collector::{MetricsSnapshot, ServerMetrics};
