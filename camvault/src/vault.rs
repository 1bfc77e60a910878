//! CamVault - Image Vault
//!
//! Composition root: bootstraps the stores once and wires the handlers.

use std::sync::Arc;

use crate::accounts::AccountService;
use crate::config::{KeyDerivation, KeySelection, ServerConfig};
use crate::crypto::{HkdfKeyDeriver, KeyDeriver, PaddedKeyDeriver};
use crate::decrypt::DecryptHandler;
use crate::error::VaultResult;
use crate::store::{BlobStore, FsBlobStore, Namespace, RecordStore, SqliteRecordStore};
use crate::upload::{AnyAccountSelector, DeviceAccountSelector, KeySelector, UploadHandler};

/// Pluggable policies the handlers are built with
#[derive(Debug, Clone)]
pub struct VaultOptions {
    pub key_selection: KeySelection,
    pub key_derivation: KeyDerivation,
    pub public_base_url: String,
}

impl From<&ServerConfig> for VaultOptions {
    fn from(config: &ServerConfig) -> Self {
        Self {
            key_selection: config.key_selection,
            key_derivation: config.key_derivation,
            public_base_url: config.public_base_url(),
        }
    }
}

/// Stores plus the handlers operating on them
pub struct ImageVault {
    blobs: Arc<dyn BlobStore>,
    accounts: AccountService,
    uploads: UploadHandler,
    decryptor: DecryptHandler,
}

impl ImageVault {
    /// Open the vault under `config.data_dir`, creating directories and schema as needed
    pub fn open(config: &ServerConfig) -> VaultResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(&config.data_dir));
        let records: Arc<dyn RecordStore> =
            Arc::new(SqliteRecordStore::open(&config.database_path())?);

        tracing::info!("Vault opened at {}", config.data_dir.display());

        Self::with_stores(records, blobs, VaultOptions::from(config))
    }

    /// Build a vault over existing stores. Runs the idempotent store setup.
    pub fn with_stores(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        options: VaultOptions,
    ) -> VaultResult<Self> {
        records.ensure_schema()?;
        blobs.ensure_namespaces()?;

        let deriver: Arc<dyn KeyDeriver> = match options.key_derivation {
            KeyDerivation::Padded => Arc::new(PaddedKeyDeriver),
            KeyDerivation::Hkdf => Arc::new(HkdfKeyDeriver),
        };
        let selector: Arc<dyn KeySelector> = match options.key_selection {
            KeySelection::AnyAccount => Arc::new(AnyAccountSelector),
            KeySelection::Device => Arc::new(DeviceAccountSelector),
        };

        tracing::info!(
            "Key selection: {:?}, key derivation: {:?}",
            options.key_selection,
            options.key_derivation
        );

        Ok(Self {
            accounts: AccountService::new(Arc::clone(&records)),
            uploads: UploadHandler::new(
                Arc::clone(&records),
                Arc::clone(&blobs),
                selector,
                Arc::clone(&deriver),
            ),
            decryptor: DecryptHandler::new(
                records,
                Arc::clone(&blobs),
                deriver,
                &options.public_base_url,
            ),
            blobs,
        })
    }

    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    pub fn uploads(&self) -> &UploadHandler {
        &self.uploads
    }

    pub fn decryptor(&self) -> &DecryptHandler {
        &self.decryptor
    }

    /// Directory the decrypted images are served from
    pub fn plain_cache_dir(&self) -> std::path::PathBuf {
        self.blobs.namespace_path(Namespace::PlainCache)
    }
}
