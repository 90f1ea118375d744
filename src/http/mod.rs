//! # Módulo HTTP
//! src/http/mod.rs
//!
//! HTTP/1.1 mínimo implementado a mano, sin librerías de alto nivel:
//!
//! - `reader`: framing, lee un request completo de la conexión
//! - `request`: parser del buffer crudo a `ParsedRequest`
//! - `response`: construcción de respuestas
//! - `status`: códigos de estado
//!
//! ## Lo que no se soporta
//!
//! - Chunked transfer-encoding
//! - Keep-alive / pipelining: cada conexión lleva un único request
//! - TLS

pub mod reader;
pub mod request;
pub mod response;
pub mod status;

pub use reader::{read_request, RawRequest, ReadError, ReadLimits};
pub use request::{parse_request, Delimiter, ParseError, ParsedRequest};
pub use response::Response;
pub use status::StatusCode;
