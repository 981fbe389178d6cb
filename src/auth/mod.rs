//! Authentication primitives
//!
//! - [`password`]: PBKDF2-HMAC-SHA256 password hashing
//! - [`tokens`]: signed access/refresh bearer tokens
//!
//! Both sign with HMAC-SHA256 from the `hmac` and `sha2` crates and encode
//! binary values as lower-case hex.

pub mod password;
pub mod tokens;

pub use password::PasswordHasher;
pub use tokens::{Claims, TokenKind, TokenPair, TokenSigner};

use hmac::Hmac;
use sha2::Sha256;

pub(crate) type HmacSha256 = Hmac<Sha256>;

pub(crate) fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect::<String>()
}

pub(crate) fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).ok())
        .collect()
}
