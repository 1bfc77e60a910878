//! CamVault - Server configuration
//!
//! CLI flags with `CAMVAULT_*` environment fallbacks.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// How the upload handler chooses the account whose key encrypts an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeySelection {
    /// First registered account, whichever device uploaded
    AnyAccount,
    /// Account whose product number matches the `X-Device-Id` header
    Device,
}

/// How a secret string becomes a cipher key
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeyDerivation {
    /// Zero-pad or truncate the UTF-8 secret to 16 bytes
    Padded,
    /// HKDF-SHA256 over the secret
    Hkdf,
}

/// CamVault server
#[derive(Parser, Debug, Clone)]
#[command(name = "camvault-server", version, about = "Encrypted image store for camera uploads")]
pub struct ServerConfig {
    /// Port to listen on
    #[arg(long, env = "CAMVAULT_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "CAMVAULT_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Data directory (database and image directories)
    #[arg(long, env = "CAMVAULT_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Base URL used in returned image links (default: http://localhost:<port>)
    #[arg(long, env = "CAMVAULT_PUBLIC_URL")]
    pub public_url: Option<String>,

    /// Maximum upload size in megabytes
    #[arg(long, env = "CAMVAULT_MAX_UPLOAD_MB", default_value_t = 10)]
    pub max_upload_mb: usize,

    /// Upload key selection policy
    #[arg(long, env = "CAMVAULT_KEY_SELECTION", value_enum, default_value_t = KeySelection::AnyAccount)]
    pub key_selection: KeySelection,

    /// Secret -> key derivation policy
    #[arg(long, env = "CAMVAULT_KEY_DERIVATION", value_enum, default_value_t = KeyDerivation::Padded)]
    pub key_derivation: KeyDerivation,

    /// Enable structured JSON logging
    #[arg(long, env = "CAMVAULT_JSON_LOGS")]
    pub json_logs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            bind_address: "0.0.0.0".into(),
            data_dir: PathBuf::from("./data"),
            public_url: None,
            max_upload_mb: 10,
            key_selection: KeySelection::AnyAccount,
            key_derivation: KeyDerivation::Padded,
            json_logs: false,
        }
    }
}

impl ServerConfig {
    /// Base URL for image links
    pub fn public_base_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.port),
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("camvault.db")
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
