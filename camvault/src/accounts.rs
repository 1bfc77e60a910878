//! CamVault - Account registration and login

use std::sync::Arc;

use crate::crypto::{hash_password, verify_password};
use crate::error::{VaultError, VaultResult};
use crate::model::{Account, AccountSummary, LoginRequest, NewAccount, SignupRequest};
use crate::store::RecordStore;

/// Registers accounts and checks login credentials
pub struct AccountService {
    records: Arc<dyn RecordStore>,
}

impl AccountService {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    /// Register a new account. The secret key is stored as given so it can
    /// be compared against later decrypt requests.
    pub fn register(&self, req: &SignupRequest) -> VaultResult<Account> {
        let missing = || VaultError::MissingParams("All fields are required".into());

        let product_number = req.product_number.ok_or_else(missing)?;
        let name = required(&req.name).ok_or_else(missing)?;
        let mobile = required(&req.mobile).ok_or_else(missing)?;
        let email = required(&req.email).ok_or_else(missing)?;
        let password = required(&req.password).ok_or_else(missing)?;
        let confirm = required(&req.confirm_password).ok_or_else(missing)?;
        let secret_key = required(&req.aes_key).ok_or_else(missing)?;
        if req.agree != Some(true) {
            return Err(missing());
        }

        if password != confirm {
            return Err(VaultError::PasswordMismatch);
        }

        if mobile.len() != 10 || !mobile.bytes().all(|b| b.is_ascii_digit()) {
            return Err(VaultError::InvalidField(
                "Mobile number must be exactly 10 digits".into(),
            ));
        }

        if self.records.account_exists(email, product_number)? {
            return Err(VaultError::AccountExists);
        }

        let account = self.records.create_account(&NewAccount {
            product_number,
            name: name.to_string(),
            mobile: mobile.to_string(),
            email: email.to_string(),
            password_hash: hash_password(password)?,
            secret_key: secret_key.to_string(),
        })?;

        tracing::info!("Registered account {} (product {})", account.email, product_number);
        Ok(account)
    }

    /// Check credentials. Unknown email and wrong password are indistinguishable.
    pub fn login(&self, req: &LoginRequest) -> VaultResult<AccountSummary> {
        let (email, password) = match (required(&req.email), required(&req.password)) {
            (Some(e), Some(p)) => (e, p),
            _ => {
                return Err(VaultError::MissingParams(
                    "Email and password are required".into(),
                ))
            }
        };

        let account = self
            .records
            .find_account_by_email(email)?
            .ok_or(VaultError::InvalidCredentials)?;

        if !verify_password(password, &account.password_hash) {
            return Err(VaultError::InvalidCredentials);
        }

        Ok(AccountSummary::from(&account))
    }
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
