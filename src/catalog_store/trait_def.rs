//! CatalogEntity trait definition.
//!
//! The store is generic over this trait: every catalog kind describes its table
//! columns, how to build itself from a row, and how drafts and patches apply to
//! it. The create/read/update/delete logic, including the version check on
//! update, is written once in the store.

use super::models::EntityKind;
use super::occ::VersionToken;
use super::validation::ValidationError;
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// A set of columns whose values must not repeat across rows of one table.
#[derive(Debug, Clone)]
pub struct UniqueKey {
    pub columns: &'static [&'static str],
    pub values: Vec<Value>,
    /// Used in the error message, e.g. `name 'Foo'`.
    pub description: String,
}

/// A field pointing at another catalog entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub field: &'static str,
    pub kind: EntityKind,
    pub id: String,
}

pub trait CatalogEntity:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Body of a create request.
    type Draft: DeserializeOwned + Send + 'static;
    /// Body of an update request, every field optional.
    type Patch: Serialize + DeserializeOwned + Default + Clone + Debug + Send + Sync + 'static;

    const KIND: EntityKind;

    /// Domain columns, in the order returned by [`CatalogEntity::column_values`].
    /// `id`, `created_at` and `updated_at` are managed by the store.
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> &str;

    fn created_at(&self) -> &VersionToken;

    fn version(&self) -> &VersionToken;

    fn set_version(&mut self, version: VersionToken);

    /// Caller supplied id, if any.
    fn draft_id(draft: &Self::Draft) -> Option<&str>;

    fn from_draft(id: String, draft: Self::Draft, version: VersionToken) -> Self;

    fn apply_patch(&mut self, patch: Self::Patch);

    /// A patch that sets every domain field to its current value.
    fn to_patch(&self) -> Self::Patch;

    fn validate(&self) -> Vec<ValidationError>;

    /// Builds the entity from a row selected with `id`, [`Self::COLUMNS`],
    /// `created_at` and `updated_at`. Children are loaded separately.
    fn from_row(row: &Row) -> rusqlite::Result<Self>;

    fn column_values(&self) -> Vec<Value>;

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![]
    }

    fn references(&self) -> Vec<Reference> {
        vec![]
    }

    /// Loads rows owned by this entity from side tables.
    fn load_children(&mut self, _conn: &Connection) -> rusqlite::Result<()> {
        Ok(())
    }

    /// Replaces rows owned by this entity in side tables.
    fn store_children(&self, _conn: &Connection) -> rusqlite::Result<()> {
        Ok(())
    }

    /// Extra TSV export columns for data not stored in [`Self::COLUMNS`].
    fn tsv_extra_headers() -> &'static [&'static str] {
        &[]
    }

    fn tsv_extra_values(&self) -> Vec<String> {
        vec![]
    }
}
