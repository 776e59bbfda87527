//! PBKDF2 password hashing.
//!
//! Stored format: `pbkdf2$<iterations>$<salt hex>$<hash hex>`.

use hmac::Hmac;
use pbkdf2::pbkdf2;
use rand::RngCore;
use sha2::Sha256;

const ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut out = [0u8; HASH_LEN];
    let _ = pbkdf2::<Hmac<Sha256>>(password.as_bytes(), &salt, ITERATIONS, &mut out);

    format!(
        "pbkdf2${}${}${}",
        ITERATIONS,
        hex::encode(salt),
        hex::encode(out)
    )
}

/// Verify a password against a stored hash. Malformed stored values verify
/// as false rather than erroring.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (scheme, iters, salt_hex, hash_hex) = match (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) {
        (Some(s), Some(i), Some(salt), Some(hash)) => (s, i, salt, hash),
        _ => return false,
    };
    if scheme != "pbkdf2" {
        return false;
    }
    let iterations: u32 = match iters.parse() {
        Ok(n) => n,
        Err(_) => return false,
    };
    let salt = match hex::decode(salt_hex) {
        Ok(s) => s,
        Err(_) => return false,
    };
    let expected = match hex::decode(hash_hex) {
        Ok(h) => h,
        Err(_) => return false,
    };

    let mut out = vec![0u8; expected.len()];
    if pbkdf2::<Hmac<Sha256>>(password.as_bytes(), &salt, iterations, &mut out).is_err() {
        return false;
    }
    constant_time_eq(&out, &expected)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
