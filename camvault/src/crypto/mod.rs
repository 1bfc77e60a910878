//! CamVault - Cryptographic Core
//!
//! Key derivation, the image cipher and account password hashing.

pub mod keys;
pub mod cipher;
pub mod password;

pub use keys::*;
pub use cipher::*;
pub use password::{hash_password, verify_password};
