//! HMAC-SHA256 payload signing shared by the agent and the server.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signs `payload` with `key` and returns the raw digest bytes.
pub fn sign_payload(payload: &[u8], key: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Signs `payload` and hex-encodes the digest for header transport.
pub fn sign_payload_hex(payload: &[u8], key: &[u8]) -> String {
    hex::encode(sign_payload(payload, key))
}

/// Constant-time check of a received digest against the payload.
pub fn verify_payload(payload: &[u8], key: &[u8], signature: &[u8]) -> bool {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(payload);
    mac.verify_slice(signature).is_ok()
}

/// Hex-decodes `signature` and verifies it against the payload.
pub fn verify_payload_hex(payload: &[u8], key: &[u8], signature: &str) -> bool {
    match hex::decode(signature) {
        Ok(raw) => verify_payload(payload, key, &raw),
        Err(_) => false,
    }
}
