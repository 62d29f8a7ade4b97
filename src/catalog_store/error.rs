use super::models::EntityKind;
use super::validation::{ValidationError, ValidationErrors};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Another {kind} already has {description}")]
    Uniqueness {
        kind: EntityKind,
        description: String,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Internal(err.into())
    }
}

impl From<ValidationErrors> for StoreError {
    fn from(errors: ValidationErrors) -> Self {
        StoreError::Validation(errors)
    }
}

impl From<ValidationError> for StoreError {
    fn from(error: ValidationError) -> Self {
        StoreError::Validation(ValidationErrors::single(error))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a version-checked update that got past existence and validation.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome<E> {
    /// The update was applied; carries the entity with its new version.
    Updated(E),
    /// The expected version was stale; carries the entity as currently stored.
    Conflict(E),
}
