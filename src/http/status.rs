//! # Códigos de Estado HTTP
//! src/http/status.rs
//!
//! Sólo los códigos que el router y las páginas de la aplicación emiten.
//! Los errores de framing y de parsing no generan respuesta: la conexión
//! simplemente se cierra.

/// Códigos de estado que puede enviar el router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// 200 OK
    Ok = 200,

    /// 303 See Other - Redirección después de un POST exitoso
    SeeOther = 303,

    /// 400 Bad Request - Formulario inválido
    BadRequest = 400,

    /// 404 Not Found - Ruta no registrada
    NotFound = 404,

    /// 405 Method Not Allowed - Ruta registrada con otro método
    MethodNotAllowed = 405,

    /// 409 Conflict - El recurso ya existe (ej: email repetido)
    Conflict = 409,

    /// 500 Internal Server Error - Falló el handler
    InternalServerError = 500,
}

impl StatusCode {
    /// Valor numérico del código
    ///
    /// # Ejemplo
    /// ```
    /// use pgweb::http::StatusCode;
    /// assert_eq!(StatusCode::SeeOther.as_u16(), 303);
    /// ```
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Texto de razón asociado al código
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::SeeOther => "See Other",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::Conflict => "Conflict",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

impl std::fmt::Display for StatusCode {
    /// Formato: "200 OK"
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}
