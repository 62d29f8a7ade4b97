//! Client side of catalog editing: the edit session state machine and the
//! updaters it submits through.

mod http_client;
mod session;
mod updater;

pub use http_client::HttpCatalogClient;
pub use session::{EditError, EditPhase, EditSession, SubmitOutcome};
pub use updater::{CatalogUpdater, FieldMessage, SubmitFailure};
