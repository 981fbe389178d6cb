//! Password hashing
//!
//! Hashes are stored as `pbkdf2_sha256$<iterations>$<salt_hex>$<hash_hex>`,
//! so the iteration count can be raised without invalidating old hashes.

use super::{decode_hex, encode_hex, HmacSha256};
use crate::error::{AuzolanError, Result};
use hmac::Mac;
use rand::RngCore;

const ALGORITHM: &str = "pbkdf2_sha256";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);

        let derived = pbkdf2_sha256(password.as_bytes(), &salt, self.iterations)?;
        Ok(format!(
            "{}${}${}${}",
            ALGORITHM,
            self.iterations,
            encode_hex(&salt),
            encode_hex(&derived)
        ))
    }

    /// Check a password against a stored hash
    ///
    /// Malformed hashes never match.
    pub fn verify(&self, password: &str, stored: &str) -> Result<bool> {
        let mut parts = stored.split('$');
        let (Some(ALGORITHM), Some(iterations), Some(salt), Some(expected), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Ok(false);
        };

        let (Ok(iterations), Some(salt), Some(expected)) = (
            iterations.parse::<u32>(),
            decode_hex(salt),
            decode_hex(expected),
        ) else {
            return Ok(false);
        };
        if iterations == 0 || expected.len() != HASH_LEN {
            return Ok(false);
        }

        let derived = pbkdf2_sha256(password.as_bytes(), &salt, iterations)?;
        Ok(constant_time_eq(&derived, &expected))
    }
}

/// PBKDF2 with HMAC-SHA256, single 32-byte block
fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> Result<[u8; HASH_LEN]> {
    let prf = HmacSha256::new_from_slice(password)
        .map_err(|e| AuzolanError::Other(format!("Invalid HMAC key: {}", e)))?;

    let mut mac = prf.clone();
    mac.update(salt);
    mac.update(&1u32.to_be_bytes());
    let mut block = mac.finalize().into_bytes();

    let mut output = [0u8; HASH_LEN];
    output.copy_from_slice(&block);

    for _ in 1..iterations {
        let mut mac = prf.clone();
        mac.update(&block);
        block = mac.finalize().into_bytes();
        for (out, byte) in output.iter_mut().zip(block.iter()) {
            *out ^= byte;
        }
    }

    Ok(output)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
