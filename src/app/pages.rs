//! # Páginas
//! src/app/pages.rs
//!
//! Handlers de la aplicación. Cada uno recibe el slot del worker que
//! atiende la conexión y hace sus queries sobre esa conexión.

use super::password::{hash_password, PasswordError};
use super::store::{NewUser, Store, StoreError};
use crate::http::response::escape_html;
use crate::http::{ParsedRequest, Response, StatusCode};
use crate::pool::ResourceSlot;
use crate::router::HandlerError;
use serde_json::json;

/// Envuelve `body` en el layout común
fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n\
         <body>\n<nav><a href=\"/\">Home</a> | <a href=\"/sign-up\">Sign up</a> | \
         <a href=\"/ui-test\">Users</a></nav>\n{}\n</body>\n</html>\n",
        escape_html(title),
        body
    )
}

/// GET /
pub fn home<R>(_req: &ParsedRequest, _slot: &mut ResourceSlot<R>) -> Result<Response, HandlerError> {
    let body = page(
        "Home",
        "<h1>Welcome</h1>\n<p><a href=\"/sign-up\">Create an account</a></p>",
    );
    Ok(Response::html(StatusCode::Ok, &body))
}

/// GET /sign-up
pub fn sign_up_form<R>(
    _req: &ParsedRequest,
    _slot: &mut ResourceSlot<R>,
) -> Result<Response, HandlerError> {
    Ok(Response::html(StatusCode::Ok, &sign_up_page(None)))
}

fn sign_up_page(error: Option<&str>) -> String {
    let error = error
        .map(|msg| format!("<p class=\"error\">{}</p>\n", escape_html(msg)))
        .unwrap_or_default();

    page(
        "Sign up",
        &format!(
            "<h1>Sign up</h1>\n{}\
             <form method=\"post\" action=\"/sign-up/create-user\">\n\
             <label>Email <input name=\"email\" type=\"email\"></label>\n\
             <label>Full name <input name=\"full_name\"></label>\n\
             <label>Country <input name=\"country\"></label>\n\
             <label>Password <input name=\"password\" type=\"password\"></label>\n\
             <label>Repeat password <input name=\"repeat_password\" type=\"password\"></label>\n\
             <button type=\"submit\">Create</button>\n\
             </form>",
            error
        ),
    )
}

/// Campos del formulario de alta
#[derive(Debug, PartialEq, Eq)]
struct SignUpForm {
    email: String,
    full_name: String,
    country: String,
    password: String,
    repeat_password: String,
}

impl SignUpForm {
    fn from_request(req: &ParsedRequest) -> Result<Self, &'static str> {
        let field = |name: &'static str| -> Result<String, &'static str> {
            match req.form_value(name) {
                Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
                _ => Err("All fields are required"),
            }
        };

        let form = SignUpForm {
            email: field("email")?,
            full_name: field("full_name")?,
            country: field("country")?,
            // Las contraseñas no se recortan
            password: req.form_value("password").unwrap_or_default(),
            repeat_password: req.form_value("repeat_password").unwrap_or_default(),
        };

        if form.password.is_empty() {
            return Err("All fields are required");
        }
        if !form.email.contains('@') {
            return Err("Invalid email address");
        }
        if form.password != form.repeat_password {
            return Err("Passwords do not match");
        }

        Ok(form)
    }
}

/// POST /sign-up/create-user
pub fn create_user<R: Store>(
    req: &ParsedRequest,
    slot: &mut ResourceSlot<R>,
) -> Result<Response, HandlerError> {
    let form = match SignUpForm::from_request(req) {
        Ok(form) => form,
        Err(msg) => {
            return Ok(Response::html(StatusCode::BadRequest, &sign_up_page(Some(msg))));
        }
    };

    let store = slot.resource_mut();

    if store.find_user_by_email(&form.email)?.is_some() {
        tracing::debug!(email = %form.email, "email ya registrado");
        return Ok(email_taken());
    }

    let user = NewUser {
        email: form.email,
        full_name: form.full_name,
        country: form.country,
        password_hash: hash_password(&form.password)?,
    };

    match store.insert_user(&user) {
        Ok(()) => {}
        // Otro worker lo insertó entre el SELECT y el INSERT
        Err(StoreError::Duplicate(_)) => return Ok(email_taken()),
        Err(e) => return Err(e.into()),
    }

    tracing::info!(worker = slot.index(), email = %user.email, "usuario creado");
    Ok(Response::redirect("/ui-test"))
}

impl From<PasswordError> for HandlerError {
    fn from(e: PasswordError) -> Self {
        HandlerError::Internal(e.to_string())
    }
}

fn email_taken() -> Response {
    Response::html(
        StatusCode::Conflict,
        &sign_up_page(Some("A user with that email already exists")),
    )
}

/// GET /ui-test
pub fn user_table<R: Store>(
    _req: &ParsedRequest,
    slot: &mut ResourceSlot<R>,
) -> Result<Response, HandlerError> {
    let users = slot.resource_mut().list_users()?;

    let mut rows = String::new();
    for user in &users {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape_html(&user.email),
            escape_html(&user.full_name),
            escape_html(&user.country)
        ));
    }

    let body = page(
        "Users",
        &format!(
            "<h1>Users ({})</h1>\n<table>\n<tr><th>Email</th><th>Name</th><th>Country</th></tr>\n{}</table>",
            users.len(),
            rows
        ),
    );
    Ok(Response::html(StatusCode::Ok, &body))
}

/// GET /status
pub fn status<R>(_req: &ParsedRequest, slot: &mut ResourceSlot<R>) -> Result<Response, HandlerError> {
    let body = json!({
        "status": "running",
        "pid": std::process::id(),
        "worker": slot.index(),
    });
    Ok(Response::json(StatusCode::Ok, &body))
}
