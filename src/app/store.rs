//! # Almacenamiento de Usuarios
//! src/app/store.rs
//!
//! `Store` es lo único que las páginas necesitan de la base de datos. Se
//! implementa para `postgres::Client` (una por worker) y para `MemoryStore`,
//! que usan los tests.
//!
//! Tabla esperada:
//!
//! ```sql
//! CREATE TABLE app.users (
//!     id            SERIAL PRIMARY KEY,
//!     email         TEXT NOT NULL UNIQUE,
//!     full_name     TEXT NOT NULL,
//!     country       TEXT NOT NULL,
//!     password_hash TEXT NOT NULL
//! );
//! ```

use crate::router::HandlerError;
use postgres::error::SqlState;
use postgres::Client;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] postgres::Error),

    #[error("user {0} already exists")]
    Duplicate(String),
}

impl From<StoreError> for HandlerError {
    fn from(e: StoreError) -> Self {
        HandlerError::Resource(Box::new(e))
    }
}

/// Usuario tal como se muestra en las páginas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub email: String,
    pub full_name: String,
    pub country: String,
}

/// Usuario a insertar, con la contraseña ya hasheada
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub country: String,
    pub password_hash: String,
}

pub trait Store {
    fn find_user_by_email(&mut self, email: &str) -> Result<Option<UserRow>, StoreError>;

    /// Falla con `StoreError::Duplicate` si el email ya existe
    fn insert_user(&mut self, user: &NewUser) -> Result<(), StoreError>;

    /// Todos los usuarios, ordenados por email
    fn list_users(&mut self) -> Result<Vec<UserRow>, StoreError>;
}

impl Store for Client {
    fn find_user_by_email(&mut self, email: &str) -> Result<Option<UserRow>, StoreError> {
        let row = self.query_opt(
            "SELECT email, full_name, country FROM app.users WHERE email = $1",
            &[&email],
        )?;

        Ok(row.map(|row| UserRow {
            email: row.get(0),
            full_name: row.get(1),
            country: row.get(2),
        }))
    }

    fn insert_user(&mut self, user: &NewUser) -> Result<(), StoreError> {
        let result = self.execute(
            "INSERT INTO app.users (email, full_name, country, password_hash) \
             VALUES ($1, $2, $3, $4)",
            &[
                &user.email,
                &user.full_name,
                &user.country,
                &user.password_hash,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) => {
                Err(StoreError::Duplicate(user.email.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn list_users(&mut self) -> Result<Vec<UserRow>, StoreError> {
        let rows = self.query(
            "SELECT email, full_name, country FROM app.users ORDER BY email",
            &[],
        )?;

        Ok(rows
            .iter()
            .map(|row| UserRow {
                email: row.get(0),
                full_name: row.get(1),
                country: row.get(2),
            })
            .collect())
    }
}

/// Store en memoria
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: Vec<NewUser>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash guardado para `email`, si existe
    pub fn password_hash(&self, email: &str) -> Option<&str> {
        self.users
            .iter()
            .find(|u| u.email == email)
            .map(|u| u.password_hash.as_str())
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

fn to_row(user: &NewUser) -> UserRow {
    UserRow {
        email: user.email.clone(),
        full_name: user.full_name.clone(),
        country: user.country.clone(),
    }
}

impl Store for MemoryStore {
    fn find_user_by_email(&mut self, email: &str) -> Result<Option<UserRow>, StoreError> {
        Ok(self.users.iter().find(|u| u.email == email).map(to_row))
    }

    fn insert_user(&mut self, user: &NewUser) -> Result<(), StoreError> {
        if self.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(user.email.clone()));
        }
        self.users.push(user.clone());
        Ok(())
    }

    fn list_users(&mut self) -> Result<Vec<UserRow>, StoreError> {
        let mut rows: Vec<UserRow> = self.users.iter().map(to_row).collect();
        rows.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(rows)
    }
}
