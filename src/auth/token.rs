use rand::Rng;
use sha2::{Digest, Sha256};

const TOKEN_PREFIX: &str = "cust";
const SECRET_BYTES: usize = 16;

/// Hex-encoded SHA-256 of a raw customer token. Only digests are stored.
#[must_use]
pub fn token_digest(raw_token: &str) -> String {
    hex::encode(Sha256::digest(raw_token.as_bytes()))
}

/// Generates a new token with the format: cust_<32 hex chars>
#[must_use]
pub fn generate_token() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill(&mut bytes);
    format!("{TOKEN_PREFIX}_{}", hex::encode(bytes))
}
