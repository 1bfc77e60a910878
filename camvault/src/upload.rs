//! CamVault - Upload Handler
//!
//! Raw camera payload -> Incoming -> encrypt -> CipherStore + image record.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::crypto::{self, KeyDeriver};
use crate::error::{VaultError, VaultResult};
use crate::model::{Account, ImageRecord, UploadReceipt};
use crate::store::{BlobStore, Namespace, RecordStore};

/// Fresh ids tried before giving up on finding a free cipher blob name
const MAX_NAME_ATTEMPTS: usize = 16;

// ═══════════════════════════════════════════════════════════════════════════
// KEY SELECTION
// ═══════════════════════════════════════════════════════════════════════════

/// Picks the account whose secret encrypts an upload
pub trait KeySelector: Send + Sync {
    fn select(&self, records: &dyn RecordStore, device_id: Option<&str>) -> VaultResult<Account>;
}

/// Uses the first registered account regardless of which device uploaded.
///
/// Every image ends up encrypted under (and owned by) that one account.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyAccountSelector;

impl KeySelector for AnyAccountSelector {
    fn select(&self, records: &dyn RecordStore, _device_id: Option<&str>) -> VaultResult<Account> {
        let account = records.find_any_account()?.ok_or(VaultError::NoKeyAvailable)?;
        usable(account)
    }
}

/// Binds an upload to the account registered with the uploading device's product number
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceAccountSelector;

impl KeySelector for DeviceAccountSelector {
    fn select(&self, records: &dyn RecordStore, device_id: Option<&str>) -> VaultResult<Account> {
        let device_id = device_id
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| VaultError::MissingParams("Device id is required".into()))?;

        let product_number: i64 = device_id
            .parse()
            .map_err(|_| VaultError::InvalidField(format!("Invalid device id: {}", device_id)))?;

        let account = records
            .find_account_by_product_number(product_number)?
            .ok_or(VaultError::NoKeyAvailable)?;
        usable(account)
    }
}

fn usable(account: Account) -> VaultResult<Account> {
    if account.secret_key.is_empty() {
        return Err(VaultError::NoKeyAvailable);
    }
    Ok(account)
}

// ═══════════════════════════════════════════════════════════════════════════
// UPLOAD IDS
// ═══════════════════════════════════════════════════════════════════════════

/// Millisecond timestamps made strictly increasing within the process
#[derive(Debug, Default)]
pub struct UploadIdGenerator {
    last: AtomicI64,
}

impl UploadIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id: the current time in millis, or `last + 1` if the clock has not moved past it
    pub fn next_id(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = if now > last { now } else { last + 1 };
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// UPLOAD HANDLER
// ═══════════════════════════════════════════════════════════════════════════

/// Encrypts and stores camera uploads
pub struct UploadHandler {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    selector: Arc<dyn KeySelector>,
    deriver: Arc<dyn KeyDeriver>,
    ids: UploadIdGenerator,
}

impl UploadHandler {
    pub fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        selector: Arc<dyn KeySelector>,
        deriver: Arc<dyn KeyDeriver>,
    ) -> Self {
        Self {
            records,
            blobs,
            selector,
            deriver,
            ids: UploadIdGenerator::new(),
        }
    }

    /// Store one uploaded image.
    ///
    /// `device_id` is only consulted by selectors that bind uploads to devices.
    pub fn upload(&self, payload: &[u8], device_id: Option<&str>) -> VaultResult<UploadReceipt> {
        if payload.is_empty() {
            return Err(VaultError::EmptyPayload);
        }

        let id = self.ids.next_id();
        let incoming_name = format!("img_{}.jpg", id);
        self.blobs.write(Namespace::Incoming, &incoming_name, payload)?;

        let result = self.encrypt_and_persist(id, payload, device_id);

        if let Err(e) = self.blobs.delete(Namespace::Incoming, &incoming_name) {
            tracing::warn!("Failed to remove incoming file {}: {}", incoming_name, e);
        }

        result
    }

    fn encrypt_and_persist(
        &self,
        id: i64,
        plaintext: &[u8],
        device_id: Option<&str>,
    ) -> VaultResult<UploadReceipt> {
        let account = self.selector.select(self.records.as_ref(), device_id)?;
        let key = self.deriver.derive(&account.secret_key)?;

        let sealed = crypto::encrypt(plaintext, &key);
        let (id, filename) = self.store_ciphertext(id, &sealed.ciphertext)?;

        let record = ImageRecord {
            filename: filename.clone(),
            iv: sealed.iv_hex(),
            email: account.email.clone(),
            captured_at: capture_time(id),
        };
        if let Err(e) = self.records.create_image(&record) {
            // Only ever the blob created just above
            if let Err(cleanup) = self.blobs.delete(Namespace::CipherStore, &filename) {
                tracing::warn!("Failed to remove orphaned {}: {}", filename, cleanup);
            }
            return Err(e);
        }

        tracing::info!(
            "Stored {} ({} bytes, encrypted {} bytes) for {}",
            filename,
            plaintext.len(),
            sealed.ciphertext.len(),
            account.email
        );

        Ok(UploadReceipt {
            filename,
            owner_email: account.email,
            captured_at: record.captured_at,
        })
    }

    /// Claim `enc_<id>.jpg` for the ciphertext, moving to a fresh id while the
    /// name belongs to an existing image. Ids repeat across restarts when the
    /// clock steps back, or when processes share a data directory.
    fn store_ciphertext(&self, first_id: i64, ciphertext: &[u8]) -> VaultResult<(i64, String)> {
        let mut id = first_id;
        for _ in 0..MAX_NAME_ATTEMPTS {
            let filename = format!("enc_{}.jpg", id);
            if self.blobs.create(Namespace::CipherStore, &filename, ciphertext)? {
                return Ok((id, filename));
            }
            tracing::warn!("Cipher blob {} already exists, taking the next id", filename);
            id = self.ids.next_id();
        }

        Err(VaultError::StorageUnavailable(format!(
            "No free cipher blob name after {} attempts",
            MAX_NAME_ATTEMPTS
        )))
    }
}

fn capture_time(id: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(id).single().unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PaddedKeyDeriver;
    use crate::model::NewAccount;
    use crate::store::{FsBlobStore, SqliteRecordStore};
    use std::collections::HashSet;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        records: Arc<SqliteRecordStore>,
        blobs: Arc<FsBlobStore>,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let blobs = Arc::new(FsBlobStore::new(dir.path()));
        blobs.ensure_namespaces().unwrap();
        Fixture {
            _dir: dir,
            records: Arc::new(SqliteRecordStore::in_memory().unwrap()),
            blobs,
        }
    }

    fn add_account(records: &SqliteRecordStore, n: i64, email: &str, secret: &str) {
        records
            .create_account(&NewAccount {
                product_number: n,
                name: "Cam Owner".into(),
                mobile: "0123456789".into(),
                email: email.into(),
                password_hash: "$argon2id$fake".into(),
                secret_key: secret.into(),
            })
            .unwrap();
    }

    fn handler(fx: &Fixture, selector: Arc<dyn KeySelector>) -> UploadHandler {
        UploadHandler::new(
            fx.records.clone(),
            fx.blobs.clone(),
            selector,
            Arc::new(PaddedKeyDeriver),
        )
    }

    #[test]
    fn test_upload_encrypts_and_records() {
        let fx = fixture();
        add_account(&fx.records, 1, "a@x.com", "0123456789abcdef");
        let uploads = handler(&fx, Arc::new(AnyAccountSelector));

        let payload: Vec<u8> = (0..12_345).map(|i| (i % 256) as u8).collect();
        let receipt = uploads.upload(&payload, None).unwrap();

        assert!(receipt.filename.starts_with("enc_"));
        assert!(receipt.filename.ends_with(".jpg"));
        assert_eq!(receipt.owner_email, "a@x.com");

        let records = fx.records.images_for_owner("a@x.com").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].filename, receipt.filename);
        assert_eq!(records[0].iv.len(), 32);
        assert!(records[0].iv.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        // Ciphertext decrypts back with the account's key
        let ciphertext = fx.blobs.read(Namespace::CipherStore, &receipt.filename).unwrap();
        assert_ne!(ciphertext, payload);
        let iv = crypto::decode_iv(&records[0].iv).unwrap();
        let key = PaddedKeyDeriver.derive("0123456789abcdef").unwrap();
        assert_eq!(crypto::decrypt(&ciphertext, &iv, &key).unwrap(), payload);

        // Incoming is cleaned up
        let incoming = std::fs::read_dir(fx.blobs.namespace_path(Namespace::Incoming)).unwrap();
        assert_eq!(incoming.count(), 0);
    }

    #[test]
    fn test_empty_payload() {
        let fx = fixture();
        add_account(&fx.records, 1, "a@x.com", "secret");
        let uploads = handler(&fx, Arc::new(AnyAccountSelector));

        assert!(matches!(uploads.upload(&[], None), Err(VaultError::EmptyPayload)));
    }

    #[test]
    fn test_no_account_available() {
        let fx = fixture();
        let uploads = handler(&fx, Arc::new(AnyAccountSelector));

        let err = uploads.upload(b"jpeg", None).unwrap_err();
        assert!(matches!(err, VaultError::NoKeyAvailable));

        // Raw upload does not linger after the failure
        let incoming = std::fs::read_dir(fx.blobs.namespace_path(Namespace::Incoming)).unwrap();
        assert_eq!(incoming.count(), 0);
    }

    #[test]
    fn test_empty_secret_is_not_a_key() {
        let fx = fixture();
        add_account(&fx.records, 1, "a@x.com", "");
        let uploads = handler(&fx, Arc::new(AnyAccountSelector));

        assert!(matches!(uploads.upload(b"jpeg", None), Err(VaultError::NoKeyAvailable)));
    }

    #[test]
    fn test_device_selector() {
        let fx = fixture();
        add_account(&fx.records, 100, "first@x.com", "first-secret");
        add_account(&fx.records, 200, "second@x.com", "second-secret");
        let uploads = handler(&fx, Arc::new(DeviceAccountSelector));

        let receipt = uploads.upload(b"jpeg", Some("200")).unwrap();
        assert_eq!(receipt.owner_email, "second@x.com");

        assert!(matches!(
            uploads.upload(b"jpeg", None),
            Err(VaultError::MissingParams(_))
        ));
        assert!(matches!(
            uploads.upload(b"jpeg", Some("300")),
            Err(VaultError::NoKeyAvailable)
        ));
        assert!(matches!(
            uploads.upload(b"jpeg", Some("cam-x")),
            Err(VaultError::InvalidField(_))
        ));
    }

    #[test]
    fn test_any_account_ignores_device() {
        let fx = fixture();
        add_account(&fx.records, 100, "first@x.com", "first-secret");
        add_account(&fx.records, 200, "second@x.com", "second-secret");
        let uploads = handler(&fx, Arc::new(AnyAccountSelector));

        let receipt = uploads.upload(b"jpeg", Some("200")).unwrap();
        assert_eq!(receipt.owner_email, "first@x.com");
    }

    #[test]
    fn test_ids_strictly_increase() {
        let ids = UploadIdGenerator::new();
        let mut prev = ids.next_id();
        for _ in 0..1_000 {
            let next = ids.next_id();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let ids = Arc::new(UploadIdGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..250).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 1_000);
    }

    #[test]
    fn test_repeated_id_after_restart_keeps_existing_image() {
        let fx = fixture();
        add_account(&fx.records, 1, "a@x.com", "0123456789abcdef");
        let future = Utc::now().timestamp_millis() + 60_000;

        let before = handler(&fx, Arc::new(AnyAccountSelector));
        before.ids.last.store(future - 1, Ordering::SeqCst);
        let first = before.upload(b"first image", None).unwrap();
        assert_eq!(first.filename, format!("enc_{}.jpg", future));

        // A new process whose generator starts from the same point
        let after = handler(&fx, Arc::new(AnyAccountSelector));
        after.ids.last.store(future - 1, Ordering::SeqCst);
        let second = after.upload(b"second image", None).unwrap();
        assert_ne!(second.filename, first.filename);

        let records = fx.records.images_for_owner("a@x.com").unwrap();
        assert_eq!(records.len(), 2);

        let key = PaddedKeyDeriver.derive("0123456789abcdef").unwrap();
        for (receipt, expected) in [(&first, &b"first image"[..]), (&second, &b"second image"[..])] {
            let record = records.iter().find(|r| r.filename == receipt.filename).unwrap();
            let ciphertext = fx.blobs.read(Namespace::CipherStore, &record.filename).unwrap();
            let iv = crypto::decode_iv(&record.iv).unwrap();
            assert_eq!(crypto::decrypt(&ciphertext, &iv, &key).unwrap(), expected);
        }
    }

    #[test]
    fn test_rapid_uploads_get_distinct_names() {
        let fx = fixture();
        add_account(&fx.records, 1, "a@x.com", "secret");
        let uploads = handler(&fx, Arc::new(AnyAccountSelector));

        let a = uploads.upload(b"one", None).unwrap();
        let b = uploads.upload(b"two", None).unwrap();
        assert_ne!(a.filename, b.filename);
        assert_eq!(fx.records.images_for_owner("a@x.com").unwrap().len(), 2);
    }
}
