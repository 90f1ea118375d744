//! # Hash de Contraseñas
//! src/app/password.rs
//!
//! Argon2i con t=2, m=64 MiB y un solo carril. Se guarda como string PHC:
//!
//! ```text
//! $argon2i$v=19$m=65536,t=2,p=1$<salt>$<hash>
//! ```

use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use thiserror::Error;

const SALT_LENGTH: usize = 16;
const TIME_COST: u32 = 2;
const MEMORY_COST_KIB: u32 = 64 * 1024;
const PARALLELISM: u32 = 1;

#[derive(Debug, Error)]
#[error("password hashing failed: {0}")]
pub struct PasswordError(#[from] password_hash::Error);

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
        .map_err(password_hash::Error::from)?;
    Ok(Argon2::new(Algorithm::Argon2i, Version::V0x13, params))
}

/// Hashea `password` con un salt nuevo
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt)?;

    let hash = hasher()?.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verifica `password` contra un string PHC
///
/// Los parámetros salen del propio string; un valor ilegible no verifica.
pub fn verify_password(stored: &str, password: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
