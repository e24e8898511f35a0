//! Classifies whether the account logged in now is the one that last used
//! this device.

use pdrive_core::DriveResult;

use crate::fingerprint::CurrentUserHashRepository;
use crate::store::StoredUserHashRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviouslyLoggedInUser {
    SameUser,
    DifferentUser,
    /// Nothing stored yet (new install, or upgrade from a version without fingerprints)
    MissingInfo,
}

impl PreviouslyLoggedInUser {
    /// Whether locally cached state must be wiped before it can be trusted.
    pub fn requires_cache_reset(self) -> bool {
        !matches!(self, PreviouslyLoggedInUser::SameUser)
    }
}

pub struct PreviouslyLoggedInUserRepository {
    current: Box<dyn CurrentUserHashRepository>,
    stored: Box<dyn StoredUserHashRepository>,
}

impl PreviouslyLoggedInUserRepository {
    pub fn new(
        current: Box<dyn CurrentUserHashRepository>,
        stored: Box<dyn StoredUserHashRepository>,
    ) -> Self {
        Self { current, stored }
    }

    /// Compare the current fingerprint against the stored one.
    ///
    /// Failing to compute the current fingerprint is fatal. Failing to load the
    /// stored one is an expected absence and yields `MissingInfo`.
    pub fn get_previous_user(&self) -> DriveResult<PreviouslyLoggedInUser> {
        let current = self.current.load_hash()?;

        let stored = match self.stored.load_hash() {
            Ok(hash) => hash,
            Err(e) => {
                tracing::info!(reason = %e, "no stored user fingerprint");
                return Ok(PreviouslyLoggedInUser::MissingInfo);
            }
        };

        let previous = if current == stored {
            PreviouslyLoggedInUser::SameUser
        } else {
            PreviouslyLoggedInUser::DifferentUser
        };
        tracing::debug!(?previous, "compared user fingerprints");
        Ok(previous)
    }

    /// Persist the current fingerprint; call after a successful login.
    pub fn store_current_user(&self) -> DriveResult<()> {
        let current = self.current.load_hash()?;
        self.stored.store(&current)
    }
}
