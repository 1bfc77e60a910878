//! CamVault - Decrypt-and-Serve Handler
//!
//! Decrypts an owner's images into the plain cache on demand. A cached
//! plaintext is never re-derived or invalidated, so the first key that
//! successfully decrypts an image wins.

use std::sync::Arc;

use crate::crypto::{self, secrets_match, CipherKey, KeyDeriver};
use crate::error::{VaultError, VaultResult};
use crate::model::{ImageDescriptor, ImageRecord};
use crate::store::{BlobStore, Namespace, RecordStore};

/// URL prefix the plain cache is served under
pub const IMAGES_ROUTE: &str = "/images";

/// Decrypts owner images and lists cached results
pub struct DecryptHandler {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    deriver: Arc<dyn KeyDeriver>,
    public_base_url: String,
}

impl DecryptHandler {
    pub fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        deriver: Arc<dyn KeyDeriver>,
        public_base_url: &str,
    ) -> Self {
        Self {
            records,
            blobs,
            deriver,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Decrypt every image owned by `email`, newest first.
    ///
    /// Images whose ciphertext is missing or fails to decrypt are skipped,
    /// so the result may be shorter than the number of records.
    pub fn decrypt_all(
        &self,
        email: Option<&str>,
        supplied_key: Option<&str>,
    ) -> VaultResult<Vec<ImageDescriptor>> {
        let (email, supplied_key) = match (non_empty(email), non_empty(supplied_key)) {
            (Some(e), Some(k)) => (e, k),
            _ => return Err(VaultError::MissingParams("Email and AES Key are required".into())),
        };

        let account = self
            .records
            .find_account_by_email(email)?
            .ok_or(VaultError::UnknownAccount)?;

        if !secrets_match(supplied_key, &account.secret_key) {
            return Err(VaultError::KeyMismatch);
        }

        let records = self.records.images_for_owner(email)?;
        if records.is_empty() {
            return Err(VaultError::NoImages);
        }

        let key = self.deriver.derive(supplied_key)?;
        let mut images = Vec::with_capacity(records.len());

        for record in &records {
            let plain_name = record.plain_filename();

            if self.blobs.exists(Namespace::PlainCache, &plain_name) {
                tracing::debug!("Cache hit for {}", record.filename);
                images.push(self.descriptor(record));
                continue;
            }

            if !self.blobs.exists(Namespace::CipherStore, &record.filename) {
                tracing::warn!("Encrypted file not found: {}", record.filename);
                continue;
            }

            let plaintext = match self.open_cipher_blob(record, &key) {
                Ok(plaintext) => plaintext,
                Err(e) if e.is_per_image() => {
                    tracing::warn!("Decryption failed for {}: {}", record.filename, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            self.blobs.write(Namespace::PlainCache, &plain_name, &plaintext)?;
            tracing::debug!("Decrypted {} ({} bytes)", record.filename, plaintext.len());
            images.push(self.descriptor(record));
        }

        tracing::info!(
            "Decrypted images for {}: {} of {} available",
            email,
            images.len(),
            records.len()
        );

        Ok(images)
    }

    /// Already-decrypted images for `email`, without touching key material
    pub fn list_decrypted(&self, email: Option<&str>) -> VaultResult<Vec<ImageDescriptor>> {
        let email =
            non_empty(email).ok_or_else(|| VaultError::MissingParams("Email is required".into()))?;

        let records = self.records.images_for_owner(email)?;
        if records.is_empty() {
            return Err(VaultError::NoImages);
        }

        let images: Vec<ImageDescriptor> = records
            .iter()
            .filter(|r| self.blobs.exists(Namespace::PlainCache, &r.plain_filename()))
            .map(|r| self.descriptor(r))
            .collect();

        if images.is_empty() {
            return Err(VaultError::NoDecryptedImages);
        }

        Ok(images)
    }

    fn open_cipher_blob(&self, record: &ImageRecord, key: &CipherKey) -> VaultResult<Vec<u8>> {
        let ciphertext = self.blobs.read(Namespace::CipherStore, &record.filename)?;
        let iv = crypto::decode_iv(&record.iv)?;
        Ok(crypto::decrypt(&ciphertext, &iv, key)?)
    }

    fn descriptor(&self, record: &ImageRecord) -> ImageDescriptor {
        let filename = record.plain_filename();
        ImageDescriptor {
            image_path: format!("{}{}/{}", self.public_base_url, IMAGES_ROUTE, filename),
            filename,
            timestamp: record.captured_at,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
