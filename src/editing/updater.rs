use async_trait::async_trait;
use serde::Deserialize;

use crate::catalog_store::{
    CatalogEntity, SqliteCatalogStore, StoreError, UpdateOutcome, VersionToken,
};

/// A field-level problem reported back by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldMessage {
    pub field: String,
    pub message: String,
}

/// Why a submitted update was neither applied nor reported as a conflict.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitFailure {
    #[error("{0}")]
    NotFound(String),

    #[error("Validation failed: {}", join_messages(.0))]
    Validation(Vec<FieldMessage>),

    /// A request the catalog could not interpret, such as a field of the
    /// wrong type. Carries the catalog's message.
    #[error("Rejected by the catalog: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Uniqueness(String),

    #[error("Not logged in")]
    Unauthenticated,

    #[error("Not allowed to edit the catalog")]
    Unauthorized,

    #[error("Server error: {0}")]
    Internal(String),

    #[error("Could not reach the catalog: {0}")]
    Transport(String),
}

fn join_messages(fields: &[FieldMessage]) -> String {
    fields
        .iter()
        .map(|f| f.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<StoreError> for SubmitFailure {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => SubmitFailure::NotFound(err.to_string()),
            StoreError::Validation(errors) => SubmitFailure::Validation(
                errors
                    .details()
                    .into_iter()
                    .map(|detail| FieldMessage {
                        field: detail.field.to_string(),
                        message: detail.message,
                    })
                    .collect(),
            ),
            StoreError::Uniqueness { .. } => SubmitFailure::Uniqueness(err.to_string()),
            StoreError::Internal(err) => SubmitFailure::Internal(format!("{:#}", err)),
        }
    }
}

/// Where an edit session sends its changes.
#[async_trait]
pub trait CatalogUpdater<E: CatalogEntity>: Send + Sync {
    /// Applies `patch` to entity `id` if it is still at version `expected`.
    async fn submit_update(
        &self,
        id: &str,
        patch: E::Patch,
        expected: Option<VersionToken>,
    ) -> Result<UpdateOutcome<E>, SubmitFailure>;
}

#[async_trait]
impl<E: CatalogEntity> CatalogUpdater<E> for SqliteCatalogStore {
    async fn submit_update(
        &self,
        id: &str,
        patch: E::Patch,
        expected: Option<VersionToken>,
    ) -> Result<UpdateOutcome<E>, SubmitFailure> {
        let store = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || store.update::<E>(&id, patch, expected.as_ref()))
            .await
            .map_err(|err| SubmitFailure::Internal(err.to_string()))?
            .map_err(SubmitFailure::from)
    }
}
