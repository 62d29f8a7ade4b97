mod entities;
mod error;
pub mod export;
mod models;
pub mod occ;
mod schema;
mod store;
mod trait_def;
mod validation;

pub use error::{StoreError, StoreResult, UpdateOutcome};
pub use export::ExportFormat;
pub use models::*;
pub use occ::{GuardOutcome, VersionToken};
pub use schema::CATALOG_VERSIONED_SCHEMAS;
pub use store::{ListQuery, Page, SqliteCatalogStore, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
pub use trait_def::{CatalogEntity, Reference, UniqueKey};
pub use validation::{FieldError, ValidationError, ValidationErrors};
