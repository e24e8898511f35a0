use pdrive_core::{DriveError, DriveResult};

/// Source of the fingerprint of the account logged in right now.
pub trait CurrentUserHashRepository: Send + Sync {
    fn load_hash(&self) -> DriveResult<String>;
}

/// Fingerprint derived from the authenticated session's user ID.
#[derive(Debug, Clone, Default)]
pub struct SessionUserHashRepository {
    user_id: Option<String>,
}

impl SessionUserHashRepository {
    pub fn new(user_id: Option<String>) -> Self {
        Self { user_id }
    }
}

impl CurrentUserHashRepository for SessionUserHashRepository {
    fn load_hash(&self) -> DriveResult<String> {
        let user_id = self
            .user_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DriveError::CurrentUserUnavailable("no authenticated session".into()))?;
        Ok(blake3::hash(user_id.as_bytes()).to_hex().to_string())
    }
}
