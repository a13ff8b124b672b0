//! Chunked RSA PKCS#1 v1.5 payload protection.
//!
//! Payloads larger than one key block are split into fixed-size chunks and
//! each chunk is encrypted separately; ciphertext is the concatenation of
//! the encrypted chunks, so its length is always a multiple of the key size.

use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

use crate::core::{MetricsError, Result};

/// PKCS#1 v1.5 padding overhead per encrypted block.
const PADDING_OVERHEAD: usize = 11;

/// Loads an RSA public key from PEM, accepting SPKI and PKCS#1 encodings.
pub fn load_public_key(pem: &str) -> Result<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|err| MetricsError::Config(format!("cannot parse RSA public key: {err}")))
}

/// Loads an RSA private key from PEM, accepting PKCS#8 and PKCS#1 encodings.
pub fn load_private_key(pem: &str) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|err| MetricsError::Config(format!("cannot parse RSA private key: {err}")))
}

/// Encrypts `payload` in chunks of `key size - 11` bytes.
pub fn encrypt_chunked(key: &RsaPublicKey, payload: &[u8]) -> Result<Vec<u8>> {
    let chunk_size = key.size() - PADDING_OVERHEAD;
    let mut rng = OsRng;
    let mut ciphertext = Vec::with_capacity(payload.len() + key.size());

    for chunk in payload.chunks(chunk_size) {
        let encrypted = key
            .encrypt(&mut rng, Pkcs1v15Encrypt, chunk)
            .map_err(|err| MetricsError::Crypto(format!("RSA encryption failed: {err}")))?;
        ciphertext.extend_from_slice(&encrypted);
    }

    Ok(ciphertext)
}

/// Decrypts a ciphertext produced by [`encrypt_chunked`]. The input length
/// must be a non-zero multiple of the key size.
pub fn decrypt_chunked(key: &RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let chunk_size = key.size();
    if ciphertext.is_empty() || ciphertext.len() % chunk_size != 0 {
        return Err(MetricsError::Crypto(
            "invalid encrypted data length".to_string(),
        ));
    }

    let mut plaintext = Vec::with_capacity(ciphertext.len());
    for chunk in ciphertext.chunks(chunk_size) {
        let decrypted = key
            .decrypt(Pkcs1v15Encrypt, chunk)
            .map_err(|err| MetricsError::Crypto(format!("RSA decryption failed: {err}")))?;
        plaintext.extend_from_slice(&decrypted);
    }

    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> RsaPrivateKey {
        RsaPrivateKey::new(&mut OsRng, 2048).unwrap()
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let private = test_key();
        let public = RsaPublicKey::from(&private);

        // Larger than one 2048-bit block to exercise chunking.
        let payload: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();

        let ciphertext = encrypt_chunked(&public, &payload).unwrap();
        assert!(!ciphertext.is_empty());
        assert_eq!(ciphertext.len() % public.size(), 0);

        let recovered = decrypt_chunked(&private, &ciphertext).unwrap();
        assert_eq!(recovered, payload);
    }

    #[test]
    fn decrypt_rejects_truncated_input() {
        let private = test_key();
        let err = decrypt_chunked(&private, &[0u8; 17]).unwrap_err();
        assert!(matches!(err, MetricsError::Crypto(_)));
    }

    #[test]
    fn decrypt_rejects_garbage_block() {
        let private = test_key();
        let garbage = vec![0xABu8; private.size()];
        assert!(decrypt_chunked(&private, &garbage).is_err());
    }
}
