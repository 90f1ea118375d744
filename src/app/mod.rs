//! # Aplicación
//! src/app/mod.rs
//!
//! Páginas de ejemplo que corren sobre el servidor:
//!
//! | Método | Path | Handler |
//! |--------|------|---------|
//! | GET | `/` | home |
//! | GET | `/sign-up` | formulario de alta |
//! | POST | `/sign-up/create-user` | crea el usuario y redirige a `/ui-test` |
//! | GET | `/ui-test` | tabla de usuarios |
//! | GET | `/status` | JSON con pid y worker |

pub mod pages;
pub mod password;
pub mod store;

pub use store::{MemoryStore, NewUser, Store, StoreError, UserRow};

use crate::router::Router;

/// Router con todas las rutas de la aplicación
pub fn router<R: Store + 'static>() -> Router<R> {
    Router::new()
        .get("/", pages::home::<R>)
        .get("/sign-up", pages::sign_up_form::<R>)
        .post("/sign-up/create-user", pages::create_user::<R>)
        .get("/ui-test", pages::user_table::<R>)
        .get("/status", pages::status::<R>)
}
