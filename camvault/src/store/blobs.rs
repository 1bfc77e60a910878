//! CamVault - Filesystem blob store
//!
//! One directory per namespace under a common root. Writes go through a
//! temporary file and a rename so concurrent writers of the same blob never
//! leave a torn file behind.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{BlobStore, Namespace};
use crate::error::{VaultError, VaultResult};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Filesystem blob store
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at `root`. Call `ensure_namespaces` before use.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn full_path(&self, ns: Namespace, name: &str) -> VaultResult<PathBuf> {
        // Blob names are generated by the server, but the plain cache is also
        // keyed by names read back from the record store
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(VaultError::InvalidField(format!("Invalid blob name: {:?}", name)));
        }
        Ok(self.namespace_path(ns).join(name))
    }
}

impl BlobStore for FsBlobStore {
    fn ensure_namespaces(&self) -> VaultResult<()> {
        for ns in Namespace::ALL {
            fs::create_dir_all(self.namespace_path(ns))?;
        }
        Ok(())
    }

    fn write(&self, ns: Namespace, name: &str, data: &[u8]) -> VaultResult<()> {
        let path = self.full_path(ns, name)?;

        let seq = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_path = path.with_file_name(format!(".{}.{}.{}.tmp", name, std::process::id(), seq));

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;

        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        Ok(())
    }

    fn create(&self, ns: Namespace, name: &str, data: &[u8]) -> VaultResult<bool> {
        let path = self.full_path(ns, name)?;

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = file.write_all(data).and_then(|_| file.sync_all()) {
            drop(file);
            let _ = fs::remove_file(&path);
            return Err(e.into());
        }

        Ok(true)
    }

    fn read(&self, ns: Namespace, name: &str) -> VaultResult<Vec<u8>> {
        let path = self.full_path(ns, name)?;
        Ok(fs::read(path)?)
    }

    fn exists(&self, ns: Namespace, name: &str) -> bool {
        self.full_path(ns, name).map(|p| p.is_file()).unwrap_or(false)
    }

    fn delete(&self, ns: Namespace, name: &str) -> VaultResult<()> {
        let path = self.full_path(ns, name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn namespace_path(&self, ns: Namespace) -> PathBuf {
        self.root.join(ns.dir_name())
    }
}
