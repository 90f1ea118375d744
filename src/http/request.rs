//! # Parsing de Requests HTTP/1.1
//! src/http/request.rs
//!
//! Parser de una sola pasada, de izquierda a derecha, sobre los bytes crudos
//! que entrega el lector de requests.
//!
//! ## Formato esperado
//!
//! ```text
//! POST /sign-up/create-user?from=home HTTP/1.1\r\n
//! Host: localhost:8080\r\n
//! Content-Type: application/x-www-form-urlencoded\r\n
//! \r\n
//! email=a%40b.com&password=secret
//! ```
//!
//! ## Pasos
//!
//! 1. **Método**: hasta el primer espacio.
//! 2. **Target**: hasta el siguiente espacio; el primer `?` separa path y query string.
//! 3. **Versión**: hasta el primer `\r\n`.
//! 4. **Headers**: bloque crudo hasta el primer `\r\n\r\n`.
//! 5. **Body**: todo lo que sigue al separador, hasta el primer NUL.
//!
//! Si falta cualquiera de los delimitadores el request se rechaza: no se
//! adivina ninguna ruta por defecto.

use std::fmt;
use thiserror::Error;

const CRLF: &[u8] = b"\r\n";
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Delimitadores obligatorios de un request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// Espacio entre método y target
    MethodSpace,

    /// Espacio entre target y versión
    TargetSpace,

    /// `\r\n` que cierra la request line
    RequestLineEnd,

    /// `\r\n\r\n` que separa headers del body
    HeaderTerminator,
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Delimiter::MethodSpace => "space after method",
            Delimiter::TargetSpace => "space after request target",
            Delimiter::RequestLineEnd => "CRLF after protocol version",
            Delimiter::HeaderTerminator => "CRLFCRLF header terminator",
        };
        f.write_str(name)
    }
}

/// Errores que pueden ocurrir durante el parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Buffer vacío (o que empieza con NUL)
    #[error("Empty request")]
    EmptyRequest,

    /// Falta un delimitador obligatorio
    #[error("Malformed request: missing {0}")]
    MissingDelimiter(Delimiter),

    /// Un campo de texto no es UTF-8 válido
    #[error("Malformed request: {0} is not valid UTF-8")]
    InvalidUtf8(&'static str),
}

/// Request HTTP ya parseado
///
/// Cada campo es un buffer propio; todos se liberan juntos cuando el worker
/// suelta el request al terminar el handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    method: String,
    path: String,
    query_string: Option<String>,
    version: String,
    headers: String,
    body: String,
}

/// Parsea un request desde el buffer crudo
///
/// # Ejemplo
///
/// ```
/// use pgweb::http::parse_request;
///
/// let raw = b"GET /a/b?x=1 HTTP/1.1\r\nHost: h\r\n\r\n";
/// let request = parse_request(raw).unwrap();
///
/// assert_eq!(request.method(), "GET");
/// assert_eq!(request.path(), "/a/b");
/// assert_eq!(request.query_string(), Some("x=1"));
/// assert_eq!(request.headers(), "Host: h");
/// assert_eq!(request.body(), "");
/// ```
pub fn parse_request(raw: &[u8]) -> Result<ParsedRequest, ParseError> {
    // El buffer se trata como terminado en NUL, igual que lo entrega el lector
    let raw = match raw.iter().position(|&b| b == 0) {
        Some(end) => &raw[..end],
        None => raw,
    };

    if raw.is_empty() {
        return Err(ParseError::EmptyRequest);
    }

    // Los dos espacios tienen que estar dentro de la request line
    let line_limit = find(raw, CRLF, 0).unwrap_or(raw.len());

    let method_end = find(&raw[..line_limit], b" ", 0)
        .ok_or(ParseError::MissingDelimiter(Delimiter::MethodSpace))?;

    let target_start = method_end + 1;
    let target_end = find(&raw[..line_limit], b" ", target_start)
        .ok_or(ParseError::MissingDelimiter(Delimiter::TargetSpace))?;

    let version_start = target_end + 1;
    let line_end = find(raw, CRLF, version_start)
        .ok_or(ParseError::MissingDelimiter(Delimiter::RequestLineEnd))?;

    // Sin headers el separador arranca en el mismo CRLF de la request line
    let separator = find(raw, HEADER_TERMINATOR, line_end)
        .ok_or(ParseError::MissingDelimiter(Delimiter::HeaderTerminator))?;

    let target = &raw[target_start..target_end];
    let (path, query_string) = match target.iter().position(|&b| b == b'?') {
        Some(mark) => (&target[..mark], Some(&target[mark + 1..])),
        None => (target, None),
    };

    let headers = if separator == line_end {
        &raw[line_end..line_end]
    } else {
        &raw[line_end + CRLF.len()..separator]
    };

    Ok(ParsedRequest {
        method: text(&raw[..method_end], "method")?,
        path: text(path, "path")?,
        query_string: query_string.map(|q| text(q, "query string")).transpose()?,
        version: text(&raw[version_start..line_end], "protocol version")?,
        headers: text(headers, "headers")?,
        body: String::from_utf8_lossy(&raw[separator + HEADER_TERMINATOR.len()..]).into_owned(),
    })
}

/// Busca `needle` en `haystack` a partir de `from`
fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

fn text(bytes: &[u8], field: &'static str) -> Result<String, ParseError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| ParseError::InvalidUtf8(field))
}

impl ParsedRequest {
    /// Método HTTP tal cual llegó (ej: "GET")
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Path sin query string (ej: "/sign-up")
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query string cruda, presente sólo si el target tenía `?`
    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    /// Versión del protocolo (ej: "HTTP/1.1")
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Bloque de headers crudo, sin el `\r\n\r\n` final
    pub fn headers(&self) -> &str {
        &self.headers
    }

    /// Body (vacío si no vino nada después del separador)
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Busca un header por nombre, sin distinguir mayúsculas
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .split("\r\n")
            .filter_map(|line| line.split_once(':'))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
            .map(|(_, value)| value.trim())
    }

    /// Obtiene un parámetro decodificado de la query string
    ///
    /// # Ejemplo
    /// ```
    /// use pgweb::http::parse_request;
    ///
    /// let request = parse_request(b"GET /users?name=ana%20maria HTTP/1.1\r\n\r\n").unwrap();
    ///
    /// assert_eq!(request.query_param("name").as_deref(), Some("ana maria"));
    /// assert_eq!(request.query_param("missing"), None);
    /// ```
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query_string
            .as_deref()
            .and_then(|query| urlencoded_value(query, name))
    }

    /// Obtiene un campo de un body `application/x-www-form-urlencoded`
    pub fn form_value(&self, name: &str) -> Option<String> {
        urlencoded_value(&self.body, name)
    }
}

/// Busca `name` en una lista `k=v&k2=v2` y decodifica su valor
fn urlencoded_value(encoded: &str, name: &str) -> Option<String> {
    encoded
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .find(|(key, _)| url_decode(key) == name)
        .map(|(_, value)| url_decode(value))
}

/// Decodifica `%XX` y `+` (espacio)
///
/// Secuencias `%` inválidas se dejan tal cual.
pub fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => decoded.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(high), Some(low)) => {
                        decoded.push(high << 4 | low);
                        i += 2;
                    }
                    _ => decoded.push(b'%'),
                }
            }
            other => decoded.push(other),
        }
        i += 1;
    }

    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_get_with_query_string() {
        let raw = b"GET /a/b?x=1 HTTP/1.1\r\nHost: h\r\n\r\n";
        let request = parse_request(raw).unwrap();

        assert_eq!(request.method(), "GET");
        assert_eq!(request.path(), "/a/b");
        assert_eq!(request.query_string(), Some("x=1"));
        assert_eq!(request.version(), "HTTP/1.1");
        assert_eq!(request.headers(), "Host: h");
        assert_eq!(request.body(), "");
    }

    #[test]
    fn test_parse_post_without_query_string() {
        let raw = b"POST /submit HTTP/1.1\r\nHost: h\r\n\r\nfoo=bar";
        let request = parse_request(raw).unwrap();

        assert_eq!(request.method(), "POST");
        assert_eq!(request.path(), "/submit");
        assert_eq!(request.query_string(), None);
        assert_eq!(request.body(), "foo=bar");
        assert_eq!(request.form_value("foo").as_deref(), Some("bar"));
    }

    #[test]
    fn test_question_mark_without_query_keeps_empty_query() {
        let request = parse_request(b"GET /search? HTTP/1.1\r\n\r\n").unwrap();

        assert_eq!(request.path(), "/search");
        assert_eq!(request.query_string(), Some(""));
    }

    #[test]
    fn test_only_first_question_mark_splits() {
        let request = parse_request(b"GET /p?a=1?b=2 HTTP/1.1\r\n\r\n").unwrap();

        assert_eq!(request.path(), "/p");
        assert_eq!(request.query_string(), Some("a=1?b=2"));
    }

    #[test]
    fn test_request_without_headers() {
        let request = parse_request(b"GET / HTTP/1.0\r\n\r\n").unwrap();

        assert_eq!(request.path(), "/");
        assert_eq!(request.version(), "HTTP/1.0");
        assert_eq!(request.headers(), "");
        assert_eq!(request.body(), "");
    }

    #[test]
    fn test_multiple_headers_block_is_raw() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\nUser-Agent: test\r\n\r\n";
        let request = parse_request(raw).unwrap();

        assert_eq!(request.headers(), "Host: localhost\r\nUser-Agent: test");
        assert_eq!(request.header("host"), Some("localhost"));
        assert_eq!(request.header("USER-AGENT"), Some("test"));
        assert_eq!(request.header("Accept"), None);
    }

    #[test]
    fn test_body_stops_at_nul() {
        let raw = b"POST /x HTTP/1.1\r\nHost: h\r\n\r\nabc\0\0\0garbage";
        let request = parse_request(raw).unwrap();

        assert_eq!(request.body(), "abc");
    }

    #[test]
    fn test_body_keeps_crlf_sequences() {
        let raw = b"POST /x HTTP/1.1\r\n\r\nline1\r\n\r\nline2";
        let request = parse_request(raw).unwrap();

        assert_eq!(request.body(), "line1\r\n\r\nline2");
    }

    #[test]
    fn test_missing_header_terminator_is_rejected() {
        let result = parse_request(b"GET / HTTP/1.1\r\nHost: h\r\n");

        assert_eq!(
            result,
            Err(ParseError::MissingDelimiter(Delimiter::HeaderTerminator))
        );
    }

    #[test]
    fn test_missing_method_space() {
        let result = parse_request(b"GARBAGE\r\nHost: a b\r\n\r\n");

        assert_eq!(result, Err(ParseError::MissingDelimiter(Delimiter::MethodSpace)));
    }

    #[test]
    fn test_missing_target_space() {
        let result = parse_request(b"GET /\r\nHost: a b\r\n\r\n");

        assert_eq!(result, Err(ParseError::MissingDelimiter(Delimiter::TargetSpace)));
    }

    #[test]
    fn test_missing_request_line_end() {
        let result = parse_request(b"GET / HTTP/1.1");

        assert_eq!(
            result,
            Err(ParseError::MissingDelimiter(Delimiter::RequestLineEnd))
        );
    }

    #[test]
    fn test_empty_request() {
        assert_eq!(parse_request(b""), Err(ParseError::EmptyRequest));
        assert_eq!(parse_request(b"\0\0\0"), Err(ParseError::EmptyRequest));
    }

    #[test]
    fn test_invalid_utf8_in_path() {
        let result = parse_request(b"GET /\xff\xfe HTTP/1.1\r\n\r\n");

        assert_eq!(result, Err(ParseError::InvalidUtf8("path")));
    }

    #[test]
    fn test_query_param_decoding() {
        let request =
            parse_request(b"GET /r?text=hello%20world&x=a+b&flag HTTP/1.1\r\n\r\n").unwrap();

        assert_eq!(request.query_param("text").as_deref(), Some("hello world"));
        assert_eq!(request.query_param("x").as_deref(), Some("a b"));
        assert_eq!(request.query_param("flag").as_deref(), Some(""));
        assert_eq!(request.query_param("nope"), None);
    }

    #[test]
    fn test_url_decode_edge_cases() {
        assert_eq!(url_decode("a%40b.com"), "a@b.com");
        assert_eq!(url_decode("100%"), "100%");
        assert_eq!(url_decode("%zz"), "%zz");
        assert_eq!(url_decode("%C3%B1"), "ñ");
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::MissingDelimiter(Delimiter::HeaderTerminator);
        assert!(err.to_string().contains("CRLFCRLF"));
    }
}
