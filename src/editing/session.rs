//! Client-side state of one in-progress edit.
//!
//! ```text
//!            submit                 Updated
//! Editing ──────────▶ Submitting ──────────▶ Saved
//!    ▲                    │ Conflict
//!    │ adopt_current      ▼
//!    └──────────────  Conflicted ──force_overwrite──▶ Submitting
//! ```
//!
//! A failed submit returns to `Editing` with the failure kept in
//! [`EditSession::last_error`]. `cancel` ends the session from `Editing` or
//! `Conflicted` without touching the catalog. After a conflict nothing is
//! resubmitted until the user picks `adopt_current` or `force_overwrite`.

use tracing::{debug, info};

use super::updater::{CatalogUpdater, SubmitFailure};
use crate::catalog_store::{CatalogEntity, UpdateOutcome, VersionToken};

#[derive(Debug, Clone, PartialEq)]
pub enum EditPhase<E> {
    Editing,
    Submitting,
    Saved(E),
    /// Someone else saved first; carries their version of the record.
    Conflicted {
        current: E,
    },
    Cancelled,
}

impl<E> EditPhase<E> {
    pub fn name(&self) -> &'static str {
        match self {
            EditPhase::Editing => "editing",
            EditPhase::Submitting => "submitting",
            EditPhase::Saved(_) => "saved",
            EditPhase::Conflicted { .. } => "conflicted",
            EditPhase::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("Cannot {action} while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: &'static str,
    },
}

/// What a submit ended in.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome<E> {
    Saved(E),
    Conflicted(E),
    Failed(SubmitFailure),
}

pub struct EditSession<E: CatalogEntity> {
    id: String,
    form: E::Patch,
    version: VersionToken,
    phase: EditPhase<E>,
    last_error: Option<SubmitFailure>,
}

impl<E: CatalogEntity> EditSession<E> {
    /// Starts editing a freshly read record.
    pub fn open(entity: &E) -> Self {
        EditSession {
            id: entity.id().to_string(),
            form: entity.to_patch(),
            version: *entity.version(),
            phase: EditPhase::Editing,
            last_error: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn form(&self) -> &E::Patch {
        &self.form
    }

    /// The version the form's contents are based on.
    pub fn version(&self) -> &VersionToken {
        &self.version
    }

    pub fn phase(&self) -> &EditPhase<E> {
        &self.phase
    }

    pub fn last_error(&self) -> Option<&SubmitFailure> {
        self.last_error.as_ref()
    }

    fn invalid(&self, action: &'static str) -> EditError {
        EditError::InvalidTransition {
            action,
            phase: self.phase.name(),
        }
    }

    pub fn edit<F: FnOnce(&mut E::Patch)>(&mut self, change: F) -> Result<(), EditError> {
        if self.phase != EditPhase::Editing {
            return Err(self.invalid("edit"));
        }
        change(&mut self.form);
        Ok(())
    }

    /// Sends the whole form, guarded by the version it was based on.
    pub async fn submit<U>(&mut self, updater: &U) -> Result<SubmitOutcome<E>, EditError>
    where
        U: CatalogUpdater<E> + ?Sized,
    {
        if self.phase != EditPhase::Editing {
            return Err(self.invalid("submit"));
        }
        self.phase = EditPhase::Submitting;
        self.last_error = None;

        let result = updater
            .submit_update(&self.id, self.form.clone(), Some(self.version))
            .await;

        match result {
            Ok(UpdateOutcome::Updated(saved)) => {
                info!("Saved {} {} at {}", E::KIND, self.id, saved.version());
                self.version = *saved.version();
                self.form = saved.to_patch();
                self.phase = EditPhase::Saved(saved.clone());
                Ok(SubmitOutcome::Saved(saved))
            }
            Ok(UpdateOutcome::Conflict(current)) => {
                info!(
                    "Edit of {} {} conflicts: based on {}, stored {}",
                    E::KIND,
                    self.id,
                    self.version,
                    current.version()
                );
                self.phase = EditPhase::Conflicted {
                    current: current.clone(),
                };
                Ok(SubmitOutcome::Conflicted(current))
            }
            Err(failure) => {
                debug!("Submit of {} {} failed: {}", E::KIND, self.id, failure);
                self.phase = EditPhase::Editing;
                self.last_error = Some(failure.clone());
                Ok(SubmitOutcome::Failed(failure))
            }
        }
    }

    /// Discards the local changes and continues from the stored record.
    pub fn adopt_current(&mut self) -> Result<(), EditError> {
        let EditPhase::Conflicted { current } = &self.phase else {
            return Err(self.invalid("adopt the current record"));
        };
        self.form = current.to_patch();
        self.version = *current.version();
        self.phase = EditPhase::Editing;
        Ok(())
    }

    /// Keeps the local changes and resubmits them over the stored record.
    pub async fn force_overwrite<U>(&mut self, updater: &U) -> Result<SubmitOutcome<E>, EditError>
    where
        U: CatalogUpdater<E> + ?Sized,
    {
        let EditPhase::Conflicted { current } = &self.phase else {
            return Err(self.invalid("overwrite"));
        };
        self.version = *current.version();
        self.phase = EditPhase::Editing;
        self.submit(updater).await
    }

    pub fn cancel(&mut self) -> Result<(), EditError> {
        match self.phase {
            EditPhase::Editing | EditPhase::Conflicted { .. } => {
                self.phase = EditPhase::Cancelled;
                Ok(())
            }
            _ => Err(self.invalid("cancel")),
        }
    }
}
