//! # pgweb
//! src/lib.rs
//!
//! Servidor HTTP/1.1 implementado desde cero sobre TCP: un acceptor, una
//! cola de conexiones protegida por `Mutex` + `Condvar` y un pool fijo de
//! workers, cada uno dueño de una conexión a PostgreSQL.
//!
//! ## Arquitectura
//!
//! - `http`: framing, parsing y respuestas HTTP/1.1
//! - `server`: acceptor, cola, workers y ciclo de vida
//! - `pool`: conexiones a la base de datos, una por worker
//! - `router`: contrato con la aplicación y routing por método y path
//! - `app`: páginas de ejemplo (alta de usuarios)
//! - `metrics`: contadores y latencias
//! - `config`: CLI, variables de entorno y archivo `.env`
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use pgweb::config::{Config, DbSettings};
//! use pgweb::pool::PgConnector;
//! use pgweb::server::{install_signal_handler, Server};
//!
//! let config = Config::default();
//! let settings = DbSettings::from_env_file(&config.env_file).unwrap();
//! let server = Server::new(config, PgConnector::new(&settings), pgweb::app::router());
//!
//! let _signals = install_signal_handler(server.shutdown_handle()).unwrap();
//! let summary = server.run().unwrap();
//! println!("{} slots cerrados", summary.slots_closed);
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod pool;
pub mod router;
pub mod server;

pub use error::ServerError;
