//! Optional server-side credential hashing.
//!
//! Clients normally submit the stored hash directly. When `HASH_PASSWORDS` is
//! enabled the submitted value is treated as plaintext and hashed here first.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `password`
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}
