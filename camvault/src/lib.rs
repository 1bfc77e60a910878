//! # CamVault
//!
//! Encrypted image store for camera uploads.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                        CAMVAULT                          │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────┐  │
//! │  │  ACCOUNTS   │  │   UPLOAD    │  │    DECRYPT      │  │
//! │  │  argon2     │  │  AES-128-CBC│  │  + plain cache  │  │
//! │  └──────┬──────┘  └──────┬──────┘  └────────┬────────┘  │
//! │         │                │                   │           │
//! │  ┌──────┴────────────────┴───────────────────┴────────┐ │
//! │  │        RECORD STORE (sqlite)  ·  BLOB STORE (fs)     │ │
//! │  └─────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Model
//!
//! - Uploads encrypted with AES-128-CBC under the owner's secret, fresh IV each
//! - Raw uploads removed once the ciphertext is persisted
//! - Secret comparison in constant time
//! - Passwords stored as Argon2id hashes
//! - Key material zeroized on drop

pub mod accounts;
pub mod api;
pub mod config;
pub mod crypto;
pub mod decrypt;
pub mod error;
pub mod model;
pub mod store;
pub mod upload;
pub mod vault;

pub use api::build_router;
pub use config::ServerConfig;
pub use error::{VaultError, VaultResult};
pub use vault::{ImageVault, VaultOptions};

/// CamVault version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
