//! Platform keychain storage for the last logged-in user fingerprint.
//!
//! Uses the `keyring` crate for cross-platform access:
//! - macOS: Keychain Services
//! - Linux: Secret Service (D-Bus)
//! - Windows: Credential Manager

use pdrive_core::{DriveError, DriveResult};

use crate::store::StoredUserHashRepository;

/// Keychain entry name of the stored fingerprint
pub const USER_HASH_KEY: &str = "user-hash";

pub struct KeychainUserHashRepository {
    service: String,
}

impl KeychainUserHashRepository {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> DriveResult<keyring::Entry> {
        keyring::Entry::new(&self.service, USER_HASH_KEY)
            .map_err(|e| DriveError::Secrets(format!("keychain entry creation: {e}")))
    }

    /// Remove the stored fingerprint (e.g. on sign-out).
    pub fn delete(&self) -> DriveResult<()> {
        match self.entry()?.delete_credential() {
            Ok(()) => {
                tracing::debug!(service = %self.service, "deleted user fingerprint from keychain");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(DriveError::Secrets(format!("keychain delete: {e}"))),
        }
    }
}

impl StoredUserHashRepository for KeychainUserHashRepository {
    fn store(&self, hash: &str) -> DriveResult<()> {
        self.entry()?
            .set_password(hash)
            .map_err(|e| DriveError::Secrets(format!("keychain store for '{USER_HASH_KEY}': {e}")))?;
        tracing::debug!(service = %self.service, "stored user fingerprint in keychain");
        Ok(())
    }

    fn load_hash(&self) -> DriveResult<String> {
        match self.entry()?.get_password() {
            Ok(hash) => Ok(hash),
            Err(keyring::Error::NoEntry) => {
                Err(DriveError::Secrets("missing stored user fingerprint".into()))
            }
            Err(e) => Err(DriveError::Secrets(format!(
                "keychain get for '{USER_HASH_KEY}': {e}"
            ))),
        }
    }
}
