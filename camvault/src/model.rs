//! CamVault - Records and wire types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered user/device identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    /// Product number of the camera sold with the account
    pub product_number: i64,
    pub name: String,
    pub mobile: String,
    pub email: String,
    /// Argon2id PHC string
    pub password_hash: String,
    /// Shared secret, stored verbatim so images can be decrypted later
    pub secret_key: String,
}

/// Account fields as inserted at registration
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub product_number: i64,
    pub name: String,
    pub mobile: String,
    pub email: String,
    pub password_hash: String,
    pub secret_key: String,
}

/// Metadata for one encrypted image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    /// Name of the blob in the cipher store
    pub filename: String,
    /// Lowercase hex IV, 32 characters
    pub iv: String,
    /// Email of the account whose key encrypted the image
    pub email: String,
    pub captured_at: DateTime<Utc>,
}

impl ImageRecord {
    /// Name of the decrypted copy in the plain cache
    pub fn plain_filename(&self) -> String {
        plain_filename(&self.filename)
    }
}

/// Plain cache name for a cipher blob name
pub fn plain_filename(cipher_filename: &str) -> String {
    format!("dec_{}", cipher_filename)
}

/// A decrypted image the client can fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDescriptor {
    pub filename: String,
    pub image_path: String,
    pub timestamp: DateTime<Utc>,
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub filename: String,
    pub owner_email: String,
    pub captured_at: DateTime<Utc>,
}

/// Public part of an account returned on login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub productnumber: i64,
    pub name: String,
    pub email: String,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            productnumber: account.product_number,
            name: account.name.clone(),
            email: account.email.clone(),
        }
    }
}

/// Registration form. Every field is optional on the wire so missing ones
/// can be reported together.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(rename = "productnumber")]
    pub product_number: Option<i64>,
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    pub aes_key: Option<String>,
    pub agree: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptRequest {
    pub email: Option<String>,
    pub aes_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListDecryptedRequest {
    pub email: Option<String>,
}
