use sha2::{Digest, Sha256};

use crate::types::SessionId;

const FINGERPRINT_HEX_LEN: usize = 12;

/// Short, non-reversible tag for a session id. Session ids are bearer
/// credentials, so logs only ever carry this form.
pub fn session_fingerprint(session_id: &SessionId) -> String {
    fingerprint(&session_id.to_string())
}

pub fn fingerprint(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(FINGERPRINT_HEX_LEN);
    encoded
}

/// Constant-time comparison for bearer tokens.
pub fn tokens_match(provided: &str, expected: &str) -> bool {
    let provided = Sha256::digest(provided.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    provided
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
