//! CamVault - Storage collaborators
//!
//! The core only talks to these two traits. `SqliteRecordStore` and
//! `FsBlobStore` are the concrete backends used by the server.

pub mod blobs;
pub mod records;

pub use blobs::FsBlobStore;
pub use records::SqliteRecordStore;

use std::path::PathBuf;

use crate::error::VaultResult;
use crate::model::{Account, ImageRecord, NewAccount};

/// Durable keyed storage for accounts and image metadata
pub trait RecordStore: Send + Sync {
    /// Create tables and indexes if missing. Idempotent.
    fn ensure_schema(&self) -> VaultResult<()>;

    /// Insert a new account; unique email and product number are enforced by the caller
    fn create_account(&self, account: &NewAccount) -> VaultResult<Account>;

    fn find_account_by_email(&self, email: &str) -> VaultResult<Option<Account>>;

    fn find_account_by_product_number(&self, product_number: i64) -> VaultResult<Option<Account>>;

    /// Whether an account already uses this email or product number
    fn account_exists(&self, email: &str, product_number: i64) -> VaultResult<bool>;

    /// First registered account, if any
    fn find_any_account(&self) -> VaultResult<Option<Account>>;

    fn create_image(&self, record: &ImageRecord) -> VaultResult<()>;

    /// All image records owned by `email`, newest first
    fn images_for_owner(&self, email: &str) -> VaultResult<Vec<ImageRecord>>;
}

/// Blob namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Raw uploads, removed once encrypted
    Incoming,
    /// Encrypted images
    CipherStore,
    /// Decrypted images, doubles as a cache
    PlainCache,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [Namespace::Incoming, Namespace::CipherStore, Namespace::PlainCache];

    /// Directory name on disk
    pub fn dir_name(self) -> &'static str {
        match self {
            Namespace::Incoming => "received-images",
            Namespace::CipherStore => "encrypted-images",
            Namespace::PlainCache => "decrypted-images",
        }
    }
}

/// Filesystem-like storage split into namespaces
pub trait BlobStore: Send + Sync {
    /// Create all namespaces if missing. Idempotent.
    fn ensure_namespaces(&self) -> VaultResult<()>;

    fn write(&self, ns: Namespace, name: &str, data: &[u8]) -> VaultResult<()>;

    /// Write a blob only if the name is free. Returns `false`, leaving the
    /// existing blob untouched, when it is taken.
    fn create(&self, ns: Namespace, name: &str, data: &[u8]) -> VaultResult<bool>;

    fn read(&self, ns: Namespace, name: &str) -> VaultResult<Vec<u8>>;

    fn exists(&self, ns: Namespace, name: &str) -> bool;

    fn delete(&self, ns: Namespace, name: &str) -> VaultResult<()>;

    /// Location of a namespace, for static serving
    fn namespace_path(&self, ns: Namespace) -> PathBuf;
}
