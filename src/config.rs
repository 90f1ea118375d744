//! # Configuración del Servidor
//! src/config.rs
//!
//! Dos fuentes de configuración:
//!
//! - `Config`: argumentos CLI y variables de entorno (puerto, tamaño del pool,
//!   límites del lector).
//! - `DbSettings`: parámetros de conexión a PostgreSQL leídos de un archivo
//!   `KEY=value` (por defecto `.env.dev`).
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./pgweb --port 8080 --workers 70 --env-file .env.dev
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=8080 POOL_SIZE=16 ./pgweb
//! ```
//!
//! ### Archivo de base de datos
//! ```text
//! # credenciales de desarrollo
//! DB_NAME=appdb
//! DB_USER=app
//! DB_PASSWORD=secret
//! DB_HOST=localhost
//! DB_PORT=5432
//! ```

use crate::http::ReadLimits;
use clap::Parser;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BACKLOG: u32 = 100;
pub const DEFAULT_POOL_SIZE: usize = 70;
pub const DEFAULT_ENV_FILE: &str = ".env.dev";

/// Errores de configuración (fatales al arrancar)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to read env file {path}: {source}")]
    EnvFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("missing key {0} in env file")]
    MissingKey(&'static str),

    #[error("invalid DB_PORT value: {0:?}")]
    InvalidPort(String),
}

/// Configuración del servidor
#[derive(Debug, Clone, Parser)]
#[command(name = "pgweb")]
#[command(about = "Servidor HTTP/1.1 con pool fijo de workers y conexiones PostgreSQL")]
#[command(version)]
pub struct Config {
    /// Puerto en el que escucha el servidor (0 = efímero)
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "HTTP_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha (todas las interfaces por defecto)
    #[arg(long, default_value = "0.0.0.0", env = "HTTP_HOST")]
    pub host: String,

    /// Número de workers, igual al número de conexiones a la base de datos
    #[arg(short, long, default_value_t = DEFAULT_POOL_SIZE, env = "POOL_SIZE")]
    pub workers: usize,

    /// Backlog de `listen`
    #[arg(long, default_value_t = DEFAULT_BACKLOG, env = "LISTEN_BACKLOG")]
    pub backlog: u32,

    /// Capacidad inicial del buffer de lectura de cada request
    #[arg(long = "read-buffer", default_value_t = crate::http::reader::DEFAULT_INITIAL_CAPACITY, env = "READ_BUFFER_SIZE")]
    pub read_buffer_size: usize,

    /// Máximo de bytes que puede ocupar un request
    #[arg(long = "max-request-bytes", default_value_t = crate::http::reader::DEFAULT_MAX_REQUEST_BYTES, env = "MAX_REQUEST_BYTES")]
    pub max_request_bytes: usize,

    /// Timeout de lectura por conexión en milisegundos (0 = sin timeout)
    #[arg(long = "read-timeout-ms", default_value_t = 0, env = "READ_TIMEOUT_MS")]
    pub read_timeout_ms: u64,

    /// Archivo `KEY=value` con los parámetros de la base de datos
    #[arg(long = "env-file", default_value = DEFAULT_ENV_FILE, env = "ENV_FILE")]
    pub env_file: PathBuf,
}

impl Config {
    /// Dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use pgweb::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "0.0.0.0:8080");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Límites para el lector de requests
    pub fn read_limits(&self) -> ReadLimits {
        ReadLimits {
            initial_capacity: self.read_buffer_size,
            max_bytes: self.max_request_bytes,
        }
    }

    /// Timeout de lectura, si está habilitado
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_ms > 0).then(|| Duration::from_millis(self.read_timeout_ms))
    }

    /// Valida la configuración
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be >= 1".to_string()));
        }
        if self.backlog == 0 {
            return Err(ConfigError::Invalid("backlog must be >= 1".to_string()));
        }
        if i32::try_from(self.backlog).is_err() {
            return Err(ConfigError::Invalid(format!(
                "backlog must be <= {}",
                i32::MAX
            )));
        }
        if self.read_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "read buffer size must be >= 1".to_string(),
            ));
        }
        if self.max_request_bytes < self.read_buffer_size {
            return Err(ConfigError::Invalid(
                "max request bytes must be >= read buffer size".to_string(),
            ));
        }
        Ok(())
    }

    /// Registra un resumen de la configuración
    pub fn log_summary(&self) {
        tracing::info!(
            address = %self.address(),
            workers = self.workers,
            backlog = self.backlog,
            read_buffer = self.read_buffer_size,
            max_request_bytes = self.max_request_bytes,
            read_timeout_ms = self.read_timeout_ms,
            env_file = %self.env_file.display(),
            "configuración cargada"
        );
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: "0.0.0.0".to_string(),
            workers: DEFAULT_POOL_SIZE,
            backlog: DEFAULT_BACKLOG,
            read_buffer_size: crate::http::reader::DEFAULT_INITIAL_CAPACITY,
            max_request_bytes: crate::http::reader::DEFAULT_MAX_REQUEST_BYTES,
            read_timeout_ms: 0,
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
        }
    }
}

/// Parámetros de conexión a la base de datos
#[derive(Clone, PartialEq, Eq)]
pub struct DbSettings {
    pub name: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
}

impl fmt::Debug for DbSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbSettings")
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl DbSettings {
    /// Lee los parámetros desde un archivo `KEY=value`
    pub fn from_env_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::EnvFileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_env_str(&contents)
    }

    /// Igual que `from_env_file` pero sobre el contenido ya leído
    ///
    /// # Ejemplo
    /// ```
    /// use pgweb::config::DbSettings;
    ///
    /// let settings = DbSettings::from_env_str(
    ///     "DB_NAME=app\nDB_USER=u\nDB_PASSWORD=p # dev\nDB_HOST=localhost\nDB_PORT=5432\n",
    /// ).unwrap();
    ///
    /// assert_eq!(settings.password, "p");
    /// assert_eq!(settings.port, 5432);
    /// ```
    pub fn from_env_str(contents: &str) -> Result<Self, ConfigError> {
        let mut values = parse_env_pairs(contents);
        let mut take = |key: &'static str| values.remove(key).ok_or(ConfigError::MissingKey(key));

        let name = take("DB_NAME")?;
        let user = take("DB_USER")?;
        let password = take("DB_PASSWORD")?;
        let host = take("DB_HOST")?;
        let raw_port = take("DB_PORT")?;
        let port = raw_port
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort(raw_port.clone()))?;

        Ok(Self {
            name,
            user,
            password,
            host,
            port,
        })
    }
}

/// Parsea líneas `KEY=value`; `#` inicia un comentario
///
/// Una línea sin `=` se ignora con un warning.
fn parse_env_pairs(contents: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();

    for (number, raw_line) in contents.lines().enumerate() {
        let line = match raw_line.find('#') {
            Some(comment) => &raw_line[..comment],
            None => raw_line,
        }
        .trim();

        if line.is_empty() {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            tracing::warn!(line = number + 1, "línea sin '=' en el archivo env, se ignora");
            continue;
        };

        values.insert(key.trim().to_string(), value.trim().to_string());
    }

    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_ENV: &str = "\
# base de desarrollo
DB_NAME=appdb
DB_USER=app_user
DB_PASSWORD=secret   # no usar en producción

DB_HOST=localhost
DB_PORT=5432
EXTRA=ignored
";

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.workers, 70);
        assert_eq!(config.backlog, 100);
        assert_eq!(config.read_buffer_size, 1024);
        assert_eq!(config.env_file, PathBuf::from(".env.dev"));
        assert!(config.read_timeout().is_none());
    }

    #[test]
    fn test_address_custom() {
        let mut config = Config::default();
        config.host = "127.0.0.1".to_string();
        config.port = 3000;
        assert_eq!(config.address(), "127.0.0.1:3000");
    }

    #[test]
    fn test_parse_from_cli_args() {
        let config = Config::try_parse_from([
            "pgweb",
            "--port",
            "9000",
            "--workers",
            "4",
            "--read-buffer",
            "512",
            "--read-timeout-ms",
            "2500",
            "--env-file",
            "/etc/pgweb.env",
        ])
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.workers, 4);
        assert_eq!(config.read_limits().initial_capacity, 512);
        assert_eq!(config.read_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(config.env_file, PathBuf::from("/etc/pgweb.env"));
    }

    #[test]
    fn test_validate_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_workers() {
        let mut config = Config::default();
        config.workers = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn test_validate_zero_backlog() {
        let mut config = Config::default();
        config.backlog = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_backlog_overflow() {
        let mut config = Config::default();
        config.backlog = u32::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_max_below_initial() {
        let mut config = Config::default();
        config.read_buffer_size = 4096;
        config.max_request_bytes = 1024;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max request bytes"));
    }

    #[test]
    fn test_db_settings_from_str() {
        let settings = DbSettings::from_env_str(SAMPLE_ENV).unwrap();

        assert_eq!(settings.name, "appdb");
        assert_eq!(settings.user, "app_user");
        assert_eq!(settings.password, "secret");
        assert_eq!(settings.host, "localhost");
        assert_eq!(settings.port, 5432);
    }

    #[test]
    fn test_db_settings_debug_hides_password() {
        let settings = DbSettings::from_env_str(SAMPLE_ENV).unwrap();
        let debug = format!("{:?}", settings);

        assert!(!debug.contains("secret"));
        assert!(debug.contains("appdb"));
    }

    #[test]
    fn test_db_settings_missing_key() {
        let result = DbSettings::from_env_str("DB_NAME=a\nDB_USER=b\n");
        assert!(matches!(result, Err(ConfigError::MissingKey("DB_PASSWORD"))));
    }

    #[test]
    fn test_db_settings_invalid_port() {
        let contents = SAMPLE_ENV.replace("5432", "notaport");
        let result = DbSettings::from_env_str(&contents);
        assert!(matches!(result, Err(ConfigError::InvalidPort(_))));
    }

    #[test]
    fn test_db_settings_skips_line_without_equals() {
        let contents = SAMPLE_ENV.replace("DB_HOST=localhost", "DB_HOST=localhost\nthis line is wrong");
        let settings = DbSettings::from_env_str(&contents).unwrap();
        assert_eq!(settings.host, "localhost");
        assert_eq!(settings.port, 5432);
    }

    #[test]
    fn test_db_settings_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_ENV.as_bytes()).unwrap();

        let settings = DbSettings::from_env_file(file.path()).unwrap();
        assert_eq!(settings.port, 5432);
    }

    #[test]
    fn test_db_settings_missing_file() {
        let result = DbSettings::from_env_file(Path::new("/nonexistent/.env.dev"));
        assert!(matches!(result, Err(ConfigError::EnvFileRead { .. })));
    }
}
