//! CamVault - Image Cipher
//!
//! AES-128-CBC with PKCS#7 padding. A fresh random IV per encryption; the
//! caller persists it next to the image record.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use thiserror::Error;

use super::keys::CipherKey;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// IV length for AES-CBC
pub const IV_LEN: usize = 16;

/// Length of a hex-encoded IV as persisted in image records
pub const IV_HEX_LEN: usize = IV_LEN * 2;

/// Per-image decryption failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptError {
    #[error("IV must be 16 bytes, got {0}")]
    InvalidIv(usize),

    #[error("IV is not valid hex: {0}")]
    MalformedIv(String),

    /// Bad padding after decryption: wrong key, wrong IV or corrupted data
    #[error("cipher mismatch")]
    CipherMismatch,
}

/// Ciphertext plus the IV it was produced with
#[derive(Debug, Clone)]
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub iv: [u8; IV_LEN],
}

impl Sealed {
    /// Lowercase hex of the IV, exactly 32 characters
    pub fn iv_hex(&self) -> String {
        hex::encode(self.iv)
    }
}

/// Generate a random IV
pub fn generate_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}

/// Encrypt an image payload under a fresh IV
pub fn encrypt(plaintext: &[u8], key: &CipherKey) -> Sealed {
    let iv = generate_iv();
    let ciphertext = Aes128CbcEnc::new(key.expose().into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    Sealed { ciphertext, iv }
}

/// Decrypt an image payload
pub fn decrypt(ciphertext: &[u8], iv: &[u8], key: &CipherKey) -> Result<Vec<u8>, DecryptError> {
    let iv: &[u8; IV_LEN] = iv
        .try_into()
        .map_err(|_| DecryptError::InvalidIv(iv.len()))?;

    Aes128CbcDec::new(key.expose().into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| DecryptError::CipherMismatch)
}

/// Decode a persisted hex IV
pub fn decode_iv(iv_hex: &str) -> Result<[u8; IV_LEN], DecryptError> {
    let bytes = hex::decode(iv_hex).map_err(|e| DecryptError::MalformedIv(e.to_string()))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| DecryptError::InvalidIv(len))
}
