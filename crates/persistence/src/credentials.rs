//! Provider-credential blobs and API-key digests
//!
//! Tenant-supplied provider credentials are stored as AES-256-CBC
//! ciphertext with the 16-byte IV prefixed to the blob. Tenant API keys are
//! never stored raw; only an HMAC-SHA256 digest keyed by `API_KEY_SECRET`.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::PersistenceError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

const IV_LEN: usize = 16;

/// Parse `ENCRYPTION_KEY` (64 hex chars) into a 32-byte AES key.
pub fn parse_encryption_key(hex: &str) -> Result<[u8; 32], PersistenceError> {
    let hex = hex.trim();
    if hex.len() != 64 {
        return Err(PersistenceError::Crypto(
            "ENCRYPTION_KEY must be 64 hex characters (32 bytes)".to_string(),
        ));
    }
    let mut key = [0u8; 32];
    for (i, byte) in key.iter_mut().enumerate() {
        let pair = &hex[i * 2..i * 2 + 2];
        *byte = u8::from_str_radix(pair, 16)
            .map_err(|_| PersistenceError::Crypto(format!("invalid hex at offset {}", i * 2)))?;
    }
    Ok(key)
}

/// Encrypt a credential; output is IV ‖ ciphertext.
pub fn encrypt_credential(key: &[u8; 32], plaintext: &[u8]) -> Vec<u8> {
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let ciphertext =
        Aes256CbcEnc::new(key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut blob = Vec::with_capacity(IV_LEN + ciphertext.len());
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&ciphertext);
    blob
}

/// Decrypt an IV-prefixed credential blob.
pub fn decrypt_credential(key: &[u8; 32], blob: &[u8]) -> Result<Vec<u8>, PersistenceError> {
    if blob.len() < IV_LEN + 16 {
        return Err(PersistenceError::Crypto("credential blob too short".to_string()));
    }
    let (iv, ciphertext) = blob.split_at(IV_LEN);
    let iv: [u8; IV_LEN] = iv.try_into().expect("split length");

    Aes256CbcDec::new(key.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| PersistenceError::Crypto("credential blob failed to decrypt".to_string()))
}

/// Hex HMAC-SHA256 digest of a tenant API key.
pub fn api_key_digest(secret: &str, api_key: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(api_key.as_bytes());
    let bytes = mac.finalize().into_bytes();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; 32] {
        parse_encryption_key(
            "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
        )
        .unwrap()
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let key = test_key();
        let blob = encrypt_credential(&key, b"sk-vendor-secret");
        assert!(blob.len() > IV_LEN);
        let plain = decrypt_credential(&key, &blob).unwrap();
        assert_eq!(plain, b"sk-vendor-secret");
    }

    #[test]
    fn iv_randomisation_changes_ciphertext() {
        let key = test_key();
        let a = encrypt_credential(&key, b"same");
        let b = encrypt_credential(&key, b"same");
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails_cleanly() {
        let blob = encrypt_credential(&test_key(), b"secret");
        let other = parse_encryption_key(
            "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
        )
        .unwrap();
        assert!(decrypt_credential(&other, &blob).is_err());
    }

    #[test]
    fn short_key_rejected() {
        assert!(parse_encryption_key("abcd").is_err());
        assert!(parse_encryption_key(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn digest_is_stable_and_keyed() {
        let a = api_key_digest("secret", "va_live_123");
        let b = api_key_digest("secret", "va_live_123");
        let c = api_key_digest("other", "va_live_123");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
