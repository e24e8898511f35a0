//! pdrive-secrets: account continuity across app sessions
//!
//! The device remembers an opaque fingerprint of the last account that used it.
//! Comparing it with the fingerprint of the current session tells whether the
//! local cache belongs to this account and can be trusted.
//!
//! Fingerprint stores (in order of preference):
//!   1. platform keychain (`keyring`)
//!   2. plain file next to the cache
//!   3. process memory (tests, embedding)

pub mod fingerprint;
pub mod keychain;
pub mod previous_user;
pub mod store;

pub use fingerprint::{CurrentUserHashRepository, SessionUserHashRepository};
pub use keychain::KeychainUserHashRepository;
pub use previous_user::{PreviouslyLoggedInUser, PreviouslyLoggedInUserRepository};
pub use store::{FileUserHashRepository, MemoryUserHashRepository, StoredUserHashRepository};

use pdrive_core::config::{expand_home, SessionConfig, UserHashStoreKind};

/// Build the fingerprint store selected in the session config.
pub fn stored_hash_repository(config: &SessionConfig) -> Box<dyn StoredUserHashRepository> {
    match config.user_hash_store {
        UserHashStoreKind::Keychain => {
            Box::new(KeychainUserHashRepository::new(config.keychain_service.clone()))
        }
        UserHashStoreKind::File => Box::new(FileUserHashRepository::new(expand_home(
            &config.user_hash_file,
        ))),
        UserHashStoreKind::Memory => Box::new(MemoryUserHashRepository::default()),
    }
}
