//! SHA-256 fingerprints for downloaded source files

use sha2::{Digest, Sha256};

/// Compute the hex SHA-256 of an in-memory buffer
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
