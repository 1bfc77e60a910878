//! CamVault - SQLite record store
//!
//! Accounts and image metadata in one SQLite database.

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::RecordStore;
use crate::error::{VaultError, VaultResult};
use crate::model::{Account, ImageRecord, NewAccount};

const ACCOUNT_COLUMNS: &str =
    "id, product_number, name, mobile, email, password_hash, secret_key";

/// SQLite-backed record store
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open (or create) the database file and ensure the schema
    pub fn open(db_path: &Path) -> VaultResult<Self> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn)
    }

    /// In-memory database, for tests
    pub fn in_memory() -> VaultResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> VaultResult<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
        Ok(Account {
            id: row.get(0)?,
            product_number: row.get(1)?,
            name: row.get(2)?,
            mobile: row.get(3)?,
            email: row.get(4)?,
            password_hash: row.get(5)?,
            secret_key: row.get(6)?,
        })
    }

    fn find_account(&self, filter: &str, value: &dyn rusqlite::ToSql) -> VaultResult<Option<Account>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM accounts WHERE {} LIMIT 1", ACCOUNT_COLUMNS, filter);
        let account = conn
            .query_row(&sql, [value], Self::account_from_row)
            .optional()?;
        Ok(account)
    }
}

fn timestamp_from_millis(millis: i64) -> VaultResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| VaultError::StorageUnavailable(format!("Invalid timestamp: {}", millis)))
}

impl RecordStore for SqliteRecordStore {
    fn ensure_schema(&self) -> VaultResult<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_number INTEGER NOT NULL UNIQUE,
                name TEXT NOT NULL,
                mobile TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                secret_key TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL UNIQUE,
                iv TEXT NOT NULL CHECK (length(iv) = 32),
                email TEXT NOT NULL,
                captured_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_images_owner ON images(email, captured_at);
            "#,
        )?;
        Ok(())
    }

    fn create_account(&self, account: &NewAccount) -> VaultResult<Account> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO accounts (product_number, name, mobile, email, password_hash, secret_key)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                account.product_number,
                account.name,
                account.mobile,
                account.email,
                account.password_hash,
                account.secret_key,
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                VaultError::AccountExists
            }
            other => other.into(),
        })?;

        Ok(Account {
            id: conn.last_insert_rowid(),
            product_number: account.product_number,
            name: account.name.clone(),
            mobile: account.mobile.clone(),
            email: account.email.clone(),
            password_hash: account.password_hash.clone(),
            secret_key: account.secret_key.clone(),
        })
    }

    fn find_account_by_email(&self, email: &str) -> VaultResult<Option<Account>> {
        self.find_account("email = ?1", &email)
    }

    fn find_account_by_product_number(&self, product_number: i64) -> VaultResult<Option<Account>> {
        self.find_account("product_number = ?1", &product_number)
    }

    fn account_exists(&self, email: &str, product_number: i64) -> VaultResult<bool> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE email = ?1 OR product_number = ?2",
            params![email, product_number],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn find_any_account(&self) -> VaultResult<Option<Account>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM accounts ORDER BY id ASC LIMIT 1", ACCOUNT_COLUMNS);
        let account = conn
            .query_row(&sql, [], Self::account_from_row)
            .optional()?;
        Ok(account)
    }

    fn create_image(&self, record: &ImageRecord) -> VaultResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO images (filename, iv, email, captured_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.filename,
                record.iv,
                record.email,
                record.captured_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    fn images_for_owner(&self, email: &str) -> VaultResult<Vec<ImageRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT filename, iv, email, captured_at FROM images
             WHERE email = ?1
             ORDER BY captured_at DESC, id DESC",
        )?;

        let rows = stmt.query_map(params![email], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (filename, iv, email, captured_at) = row?;
            records.push(ImageRecord {
                filename,
                iv,
                email,
                captured_at: timestamp_from_millis(captured_at)?,
            });
        }

        Ok(records)
    }
}
