//! # Sistema de Routing
//! src/router/mod.rs
//!
//! Contrato entre el servidor y la aplicación, más un router simple por
//! método y path exacto.
//!
//! ## Arquitectura
//!
//! ```text
//! ParsedRequest ─► Router ─► Handler(request, slot) ─► Response ─► conexión
//! ```
//!
//! El handler recibe el slot del worker que atiende la conexión, así que
//! cada query a la base de datos usa la conexión propia de ese worker.

use crate::http::{ParsedRequest, Response, StatusCode};
use crate::pool::{BoxError, ResourceSlot};
use std::io::{self, Write};
use thiserror::Error;

/// Valor del header `Server` en todas las respuestas
pub const SERVER_NAME: &str = "pgweb/0.1";

/// Errores de un handler
///
/// El router ya intentó mandar un 500 cuando el worker recibe uno de
/// estos; el worker sólo lo registra y cierra la conexión.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("resource error: {0}")]
    Resource(#[source] BoxError),

    #[error("failed to write response: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Internal(String),
}

/// Lo que el servidor le pide a la aplicación por cada request
///
/// La implementación escribe la respuesta completa en `conn` y devuelve el
/// status enviado. La conexión se cierra al volver, haya error o no.
pub trait RequestHandler<R>: Send + Sync + 'static {
    fn handle(
        &self,
        conn: &mut dyn Write,
        slot: &mut ResourceSlot<R>,
        request: &ParsedRequest,
    ) -> Result<StatusCode, HandlerError>;
}

/// Tipo de función handler
///
/// Recibe el request y el slot del worker y retorna una Response
pub type Handler<R> = fn(&ParsedRequest, &mut ResourceSlot<R>) -> Result<Response, HandlerError>;

struct Route<R> {
    method: String,
    path: String,
    handler: Handler<R>,
}

/// Router que mapea (método, path) a handlers
pub struct Router<R> {
    routes: Vec<Route<R>>,
}

impl<R> Router<R> {
    /// Crea un nuevo router vacío
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registra una ruta con su handler
    pub fn register(&mut self, method: &str, path: &str, handler: Handler<R>) {
        self.routes.push(Route {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            handler,
        });
    }

    /// Atajo para `register("GET", ...)`
    pub fn get(mut self, path: &str, handler: Handler<R>) -> Self {
        self.register("GET", path, handler);
        self
    }

    /// Atajo para `register("POST", ...)`
    pub fn post(mut self, path: &str, handler: Handler<R>) -> Self {
        self.register("POST", path, handler);
        self
    }

    /// Encuentra y ejecuta el handler apropiado para un request
    ///
    /// - Path y método coinciden: se ejecuta el handler.
    /// - Sólo el path coincide: 405 con `Allow`.
    /// - Ninguno: 404.
    pub fn route(
        &self,
        request: &ParsedRequest,
        slot: &mut ResourceSlot<R>,
    ) -> Result<Response, HandlerError> {
        let path = request.path();
        let mut allowed: Vec<&str> = Vec::new();

        for route in self.routes.iter().filter(|r| r.path == path) {
            if route.method == request.method() {
                let mut response = (route.handler)(request, slot)?;
                add_common_headers(&mut response);
                return Ok(response);
            }
            allowed.push(&route.method);
        }

        let mut response = if allowed.is_empty() {
            not_found_page(path)
        } else {
            Response::error(
                StatusCode::MethodNotAllowed,
                &format!("{} is not allowed on {}", request.method(), path),
            )
            .with_header("Allow", &allowed.join(", "))
        };
        add_common_headers(&mut response);
        Ok(response)
    }
}

impl<R> Default for Router<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: 'static> RequestHandler<R> for Router<R> {
    fn handle(
        &self,
        conn: &mut dyn Write,
        slot: &mut ResourceSlot<R>,
        request: &ParsedRequest,
    ) -> Result<StatusCode, HandlerError> {
        match self.route(request, slot) {
            Ok(response) => {
                response.write_to(conn)?;
                Ok(response.status())
            }
            Err(e) => {
                let mut response =
                    Response::error(StatusCode::InternalServerError, "Internal Server Error");
                add_common_headers(&mut response);
                // Best effort
                let _ = response.write_to(conn);
                Err(e)
            }
        }
    }
}

/// Agrega headers comunes a todas las respuestas
fn add_common_headers(response: &mut Response) {
    response.add_header("Server", SERVER_NAME);
    response.add_header("Connection", "close");
}

fn not_found_page(path: &str) -> Response {
    let body = format!(
        "<!DOCTYPE html>\n<html><head><title>404 Not Found</title></head>\
         <body><h1>Page not found</h1><p>No page at <code>{}</code>.</p>\
         <p><a href=\"/\">Home</a></p></body></html>",
        crate::http::response::escape_html(path)
    );
    Response::html(StatusCode::NotFound, &body)
}
