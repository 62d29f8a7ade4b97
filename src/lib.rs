//! Doujin Catalog Server Library
//!
//! Back-office catalog for doujin music metadata, with optimistic
//! concurrency control on every admin update.

pub mod catalog_store;
pub mod config;
pub mod editing;
pub mod server;
pub mod sqlite_persistence;
pub mod user;

// Re-export commonly used types for convenience
pub use catalog_store::{SqliteCatalogStore, UpdateOutcome, VersionToken};
pub use editing::{EditSession, HttpCatalogClient};
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig};
pub use user::{SqliteUserStore, UserManager, UserRole, UserStore};
