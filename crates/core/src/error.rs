//! Domain error type shared by every QueryPilot crate.

use std::fmt::Display;

/// Errors raised by domain rules and repository-backed lookups.
///
/// `NotFound` carries the key as a string so both numeric store ids and
/// confirmation tickets (UUIDs) fit the same variant.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Too many requests, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for [`CoreError::NotFound`] with any displayable key.
    pub fn not_found(entity: &'static str, id: impl Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_formats_numeric_and_uuid_keys() {
        let err = CoreError::not_found("ChatSession", 7);
        assert_eq!(err.to_string(), "Entity not found: ChatSession with id 7");

        let ticket = uuid::Uuid::nil();
        let err = CoreError::not_found("PendingStatement", ticket);
        assert!(err.to_string().ends_with("00000000-0000-0000-0000-000000000000"));
    }
}
