//! CamVault - Error Types

use thiserror::Error;

use crate::crypto::DecryptError;

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    // ═══════════════════════════════════════════════════════════════
    // UPLOAD ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("No image data received")]
    EmptyPayload,

    #[error("No AES key found in DB")]
    NoKeyAvailable,

    #[error("Unsupported content type: {0}")]
    UnsupportedMediaType(String),

    // ═══════════════════════════════════════════════════════════════
    // REQUEST / ACCOUNT ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("{0}")]
    MissingParams(String),

    #[error("{0}")]
    InvalidField(String),

    #[error("Invalid email")]
    UnknownAccount,

    #[error("Invalid AES Key")]
    KeyMismatch,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Email or Product Number already registered")]
    AccountExists,

    #[error("Invalid email or password")]
    InvalidCredentials,

    // ═══════════════════════════════════════════════════════════════
    // IMAGE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("No images found for this user")]
    NoImages,

    #[error("No decrypted images found")]
    NoDecryptedImages,

    #[error("Invalid IV: {0}")]
    InvalidIv(String),

    #[error("Decryption failed - wrong key, wrong IV or corrupted data")]
    CipherMismatch,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    // ═══════════════════════════════════════════════════════════════
    // STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VaultError {
    /// HTTP status code reported for this error
    pub fn status_code(&self) -> u16 {
        match self {
            VaultError::EmptyPayload
            | VaultError::MissingParams(_)
            | VaultError::InvalidField(_)
            | VaultError::PasswordMismatch
            | VaultError::AccountExists => 400,
            VaultError::KeyMismatch | VaultError::InvalidCredentials => 401,
            VaultError::UnknownAccount | VaultError::NoImages | VaultError::NoDecryptedImages => {
                404
            }
            VaultError::UnsupportedMediaType(_) => 415,
            VaultError::NoKeyAvailable
            | VaultError::InvalidIv(_)
            | VaultError::CipherMismatch
            | VaultError::EncryptionFailed(_)
            | VaultError::StorageUnavailable(_)
            | VaultError::Io(_) => 500,
        }
    }

    /// Server-side failures hide their detail behind a generic message
    pub fn is_internal(&self) -> bool {
        self.status_code() >= 500 && !matches!(self, VaultError::NoKeyAvailable)
    }

    /// Per-image failures the decrypt handler skips instead of aborting on
    pub fn is_per_image(&self) -> bool {
        matches!(self, VaultError::InvalidIv(_) | VaultError::CipherMismatch)
    }
}

impl From<DecryptError> for VaultError {
    fn from(e: DecryptError) -> Self {
        match e {
            DecryptError::InvalidIv(len) => {
                VaultError::InvalidIv(format!("expected 16 bytes, got {}", len))
            }
            DecryptError::MalformedIv(detail) => VaultError::InvalidIv(detail),
            DecryptError::CipherMismatch => VaultError::CipherMismatch,
        }
    }
}

impl From<rusqlite::Error> for VaultError {
    fn from(e: rusqlite::Error) -> Self {
        VaultError::StorageUnavailable(e.to_string())
    }
}
