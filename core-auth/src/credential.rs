//! Session token derivation.
//!
//! The backend stores the SHA-256 of the password and accepts that digest,
//! hex encoded, as the bearer token. The client derives the same value
//! locally after a successful login.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `password`.
pub fn derive_token(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}
