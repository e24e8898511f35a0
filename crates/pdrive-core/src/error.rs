use thiserror::Error;

pub type DriveResult<T> = Result<T, DriveError>;

#[derive(Debug, Error)]
pub enum DriveError {
    /// No content identity can be derived for a revision from any source.
    #[error("missing content identity: {0}")]
    MissingContentIdentity(String),

    /// A cached entity lacks context an operation needs (parent, name, root).
    #[error("invalid state of {entity}: {reason}")]
    InvalidState { entity: String, reason: String },

    /// The current session fingerprint cannot be computed.
    #[error("current user fingerprint unavailable: {0}")]
    CurrentUserUnavailable(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("secrets error: {0}")]
    Secrets(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DriveError {
    pub fn invalid_state(entity: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        DriveError::InvalidState {
            entity: entity.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error signals corrupted or inconsistent cached data.
    pub fn is_integrity_fault(&self) -> bool {
        matches!(
            self,
            DriveError::MissingContentIdentity(_) | DriveError::InvalidState { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_message_names_entity() {
        let err = DriveError::invalid_state("node vol-1/link-1", "no parent");
        assert_eq!(err.to_string(), "invalid state of node vol-1/link-1: no parent");
        assert!(err.is_integrity_fault());
    }

    #[test]
    fn storage_errors_are_not_integrity_faults() {
        assert!(!DriveError::Storage("disk full".into()).is_integrity_fault());
    }
}
