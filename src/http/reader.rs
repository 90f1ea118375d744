//! # Lector de Requests (framing)
//! src/http/reader.rs
//!
//! Lee los bytes de una conexión en un buffer que arranca con una capacidad
//! fija y se duplica cada vez que se llena.
//!
//! ## Fin del request
//!
//! - `read` devuelve 0: el peer cerró su lado.
//! - `read` devuelve menos bytes de los pedidos: se asume que no hay más datos.
//!
//! La segunda regla es una heurística que sólo vale porque cada conexión lleva
//! exactamente un request (sin keep-alive). Un request que llega partido en
//! varios segmentos TCP pequeños se corta en el primero. No se intenta leer
//! `Content-Length`: cambiaría el comportamiento observable ante input
//! malformado.

use std::io::{self, Read};
use thiserror::Error;

/// Capacidad inicial del buffer de lectura
pub const DEFAULT_INITIAL_CAPACITY: usize = 1024;

/// Techo por defecto para las duplicaciones del buffer
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Errores de framing
#[derive(Debug, Error)]
pub enum ReadError {
    /// Falló el `read` del socket
    #[error("failed to read request: {0}")]
    Io(#[from] io::Error),

    /// El request no entra en el máximo configurado
    #[error("request exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

impl ReadError {
    /// Indica si el error vino de un timeout de lectura configurado
    pub fn is_timeout(&self) -> bool {
        match self {
            ReadError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            ReadError::TooLarge { .. } => false,
        }
    }
}

/// Límites del lector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadLimits {
    pub initial_capacity: usize,
    pub max_bytes: usize,
}

impl Default for ReadLimits {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

/// Bytes crudos de un request
///
/// El largo del vector es el límite que usa el parser; no hace falta
/// ningún terminador extra.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest {
    bytes: Vec<u8>,
    buffer_capacity: usize,
}

impl RawRequest {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// `true` si el peer cerró sin mandar nada
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Tamaño final que alcanzó el buffer después de las duplicaciones
    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }
}

/// Lee un request completo desde `stream`
///
/// # Ejemplo
///
/// ```
/// use std::io::Cursor;
/// use pgweb::http::{read_request, ReadLimits};
///
/// let mut stream = Cursor::new(b"GET / HTTP/1.1\r\n\r\n".to_vec());
/// let raw = read_request(&mut stream, ReadLimits::default()).unwrap();
///
/// assert_eq!(raw.as_bytes(), b"GET / HTTP/1.1\r\n\r\n");
/// ```
pub fn read_request<S: Read>(stream: &mut S, limits: ReadLimits) -> Result<RawRequest, ReadError> {
    let mut buffer = vec![0u8; limits.initial_capacity.max(1)];
    let mut filled = 0;

    loop {
        let bytes_read = read_some(stream, &mut buffer[filled..])?;
        if bytes_read == 0 {
            break;
        }

        filled += bytes_read;

        if filled < buffer.len() {
            break;
        }

        // Lleno justo en el límite: sólo se acepta si lo que sigue es EOF
        if buffer.len() >= limits.max_bytes {
            let mut extra = [0u8; 1];
            if read_some(stream, &mut extra)? == 0 {
                break;
            }
            return Err(ReadError::TooLarge {
                limit: limits.max_bytes,
            });
        }

        // Buffer lleno antes de ver el final: duplicar y seguir leyendo
        let next_len = (buffer.len() * 2).min(limits.max_bytes);
        buffer.resize(next_len, 0);
    }

    let buffer_capacity = buffer.len();
    buffer.truncate(filled);

    Ok(RawRequest {
        bytes: buffer,
        buffer_capacity,
    })
}

fn read_some<S: Read>(stream: &mut S, buf: &mut [u8]) -> Result<usize, ReadError> {
    loop {
        match stream.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ReadError::Io(e)),
        }
    }
}
