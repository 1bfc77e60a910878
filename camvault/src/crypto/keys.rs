//! CamVault - Key Derivation
//!
//! Turns an account's stored secret string into a 128-bit cipher key.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{VaultError, VaultResult};

/// Key length for AES-128
pub const KEY_LEN: usize = 16;

/// HKDF labels for the optional derivation policy
pub mod contexts {
    /// Salt for secret -> key derivation
    pub const SALT: &[u8] = b"CAMVAULT:SALT:v1";

    /// Info label for image keys
    pub const IMAGE_KEY: &[u8] = b"CAMVAULT:IMAGE:v1";
}

/// Fixed-size symmetric key, zeroized on drop. Never persisted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CipherKey([u8; KEY_LEN]);

impl CipherKey {
    /// Wrap raw key bytes
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Expose the key bytes (use with caution)
    pub fn expose(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CipherKey(..)")
    }
}

/// Maps a secret string to a cipher key. Must be deterministic.
pub trait KeyDeriver: Send + Sync {
    fn derive(&self, secret: &str) -> VaultResult<CipherKey>;
}

/// Compatible policy: UTF-8 bytes of the secret, zero-padded or truncated to 16 bytes.
///
/// Secrets that are not exactly 16 bytes long are accepted silently, so
/// `"abc"` and `"abc\0"` map to the same key.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaddedKeyDeriver;

impl KeyDeriver for PaddedKeyDeriver {
    fn derive(&self, secret: &str) -> VaultResult<CipherKey> {
        let mut key = [0u8; KEY_LEN];
        let bytes = secret.as_bytes();
        let n = bytes.len().min(KEY_LEN);
        key[..n].copy_from_slice(&bytes[..n]);
        Ok(CipherKey::new(key))
    }
}

/// HKDF-SHA256 over the secret, first 16 bytes of output.
///
/// Not compatible with ciphertexts produced under [`PaddedKeyDeriver`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HkdfKeyDeriver;

impl KeyDeriver for HkdfKeyDeriver {
    fn derive(&self, secret: &str) -> VaultResult<CipherKey> {
        let hk = Hkdf::<Sha256>::new(Some(contexts::SALT), secret.as_bytes());
        let mut okm = [0u8; KEY_LEN];
        hk.expand(contexts::IMAGE_KEY, &mut okm)
            .map_err(|e| VaultError::EncryptionFailed(format!("HKDF expand: {}", e)))?;
        Ok(CipherKey::new(okm))
    }
}

/// Constant-time comparison of a supplied secret against the stored one
pub fn secrets_match(supplied: &str, stored: &str) -> bool {
    let (a, b) = (supplied.as_bytes(), stored.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
