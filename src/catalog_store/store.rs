//! SQLite-backed catalog store.
//!
//! Writes go through a single connection, each inside `BEGIN IMMEDIATE`, while
//! reads are spread over a small pool of read-only WAL connections. Updates are
//! version-checked through [`guarded_update`], so the store never holds a lock
//! across requests and a stale writer fails fast with a conflict.

use super::error::{StoreError, StoreResult, UpdateOutcome};
use super::models::{EntityKind, Track};
use super::occ::{guarded_update, GuardOutcome, VersionToken};
use super::schema::CATALOG_VERSIONED_SCHEMAS;
use super::trait_def::CatalogEntity;
use super::validation::{validate_id, ValidationError, ValidationErrors};
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{anyhow, Context, Result};
use rusqlite::types::Value;
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

pub const DEFAULT_PAGE_LIMIT: usize = 50;
pub const MAX_PAGE_LIMIT: usize = 200;

/// Browse parameters, already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub q: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl ListQuery {
    /// Blank queries match everything; the limit defaults to
    /// [`DEFAULT_PAGE_LIMIT`] and is capped at [`MAX_PAGE_LIMIT`]. A zero
    /// limit is rejected.
    pub fn new(
        q: Option<String>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Self, ValidationError> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if limit == 0 {
            return Err(ValidationError::NonPositiveValue {
                field: "limit",
                value: 0,
            });
        }
        Ok(ListQuery {
            q: q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty()),
            limit: limit.min(MAX_PAGE_LIMIT),
            offset: offset.unwrap_or(0).min(i64::MAX as usize),
        })
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        ListQuery {
            q: None,
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<E> {
    pub items: Vec<E>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// SQL name of the Unicode lower-casing function registered on every
/// connection. SQLite's own `lower`, `LIKE` and `NOCASE` only fold ASCII.
const FOLD_FUNCTION: &str = "casefold";

fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        FOLD_FUNCTION,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text = ctx.get::<Option<String>>(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
}

fn select_sql<E: CatalogEntity>() -> String {
    format!(
        "SELECT id, {}, created_at, updated_at FROM {}",
        E::COLUMNS.join(", "),
        E::KIND.table()
    )
}

fn new_id(kind: EntityKind) -> String {
    format!("{}_{}", kind.id_prefix(), uuid::Uuid::new_v4().simple())
}

/// SQLite-backed catalog store.
#[derive(Clone)]
pub struct SqliteCatalogStore {
    read_pool: Vec<Arc<Mutex<Connection>>>,
    write_conn: Arc<Mutex<Connection>>,
    read_index: Arc<AtomicUsize>,
}

impl SqliteCatalogStore {
    /// Opens (creating or migrating as needed) the catalog database at `db_path`.
    ///
    /// `read_pool_size` is the number of read-only connections; at least one is
    /// always opened.
    pub fn new<P: AsRef<Path>>(db_path: P, read_pool_size: usize) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open catalog database")?;

        migrate_if_needed(&mut write_conn, CATALOG_VERSIONED_SCHEMAS, "catalog")?;

        write_conn.pragma_update(None, "journal_mode", "WAL")?;
        write_conn.pragma_update(None, "foreign_keys", "ON")?;
        register_functions(&write_conn)?;

        let mut counts = Vec::with_capacity(EntityKind::ALL.len());
        for kind in EntityKind::ALL {
            let count: i64 = write_conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", kind.table()),
                [],
                |r| r.get(0),
            )?;
            counts.push(format!("{} {}", count, kind.path()));
        }
        info!("Opened catalog: {}", counts.join(", "));

        let read_pool_size = read_pool_size.max(1);
        let mut read_pool = Vec::with_capacity(read_pool_size);
        for _ in 0..read_pool_size {
            let read_conn = Connection::open_with_flags(
                db_path_ref,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                    | rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .context("Failed to open catalog read connection")?;
            register_functions(&read_conn)?;
            read_pool.push(Arc::new(Mutex::new(read_conn)));
        }

        Ok(SqliteCatalogStore {
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_pool,
            read_index: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn get_read_conn(&self) -> Arc<Mutex<Connection>> {
        let index = self.read_index.fetch_add(1, Ordering::SeqCst) % self.read_pool.len();
        self.read_pool[index].clone()
    }

    fn lock(conn: &Mutex<Connection>) -> StoreResult<MutexGuard<'_, Connection>> {
        conn.lock()
            .map_err(|_| StoreError::Internal(anyhow!("Catalog connection mutex poisoned")))
    }

    fn with_read_conn<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let read_conn = self.get_read_conn();
        let conn = Self::lock(&read_conn)?;
        f(&conn)
    }

    /// Runs `f` inside an immediate transaction on the write connection,
    /// committing on `Ok` and rolling back on `Err`.
    fn with_write_tx<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let conn = Self::lock(&self.write_conn)?;
        conn.execute("BEGIN IMMEDIATE", [])?;

        match f(&conn) {
            Ok(value) => match conn.execute("COMMIT", []) {
                Ok(_) => Ok(value),
                Err(e) => {
                    let _ = conn.execute("ROLLBACK", []);
                    Err(e.into())
                }
            },
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    // =========================================================================
    // Internal Helper Methods
    // =========================================================================

    fn load<E: CatalogEntity>(conn: &Connection, id: &str) -> rusqlite::Result<Option<E>> {
        let mut stmt = conn.prepare_cached(&format!("{} WHERE id = ?1", select_sql::<E>()))?;
        let entity = stmt.query_row(params![id], |r| E::from_row(r)).optional()?;
        match entity {
            Some(mut entity) => {
                entity.load_children(conn)?;
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }

    fn query_many<E: CatalogEntity>(
        conn: &Connection,
        sql: &str,
        params: &[Value],
    ) -> rusqlite::Result<Vec<E>> {
        let mut stmt = conn.prepare_cached(sql)?;
        let mut entities = stmt
            .query_map(params_from_iter(params.iter()), |r| E::from_row(r))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for entity in entities.iter_mut() {
            entity.load_children(conn)?;
        }
        Ok(entities)
    }

    fn exists(conn: &Connection, kind: EntityKind, id: &str) -> rusqlite::Result<bool> {
        conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", kind.table()),
            params![id],
            |r| r.get(0),
        )
    }

    fn check_valid<E: CatalogEntity>(entity: &E) -> StoreResult<()> {
        match ValidationErrors::from_vec(entity.validate()) {
            Some(errors) => Err(errors.into()),
            None => Ok(()),
        }
    }

    fn check_references<E: CatalogEntity>(conn: &Connection, entity: &E) -> StoreResult<()> {
        let mut errors = vec![];
        for reference in entity.references() {
            if !Self::exists(conn, reference.kind, &reference.id)? {
                errors.push(ValidationError::MissingReference {
                    field: reference.field,
                    entity_type: reference.kind.label(),
                    id: reference.id,
                });
            }
        }
        match ValidationErrors::from_vec(errors) {
            Some(errors) => Err(errors.into()),
            None => Ok(()),
        }
    }

    /// Rejects `entity` if another row already holds one of its unique keys.
    fn check_unique<E: CatalogEntity>(conn: &Connection, entity: &E) -> StoreResult<()> {
        for key in entity.unique_keys() {
            let conditions: Vec<String> = key
                .columns
                .iter()
                .enumerate()
                .map(|(index, column)| format!("{} = ?{}", column, index + 1))
                .collect();
            let sql = format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE {} AND id != ?{})",
                E::KIND.table(),
                conditions.join(" AND "),
                key.columns.len() + 1
            );
            let mut values = key.values.clone();
            values.push(Value::Text(entity.id().to_string()));

            let taken: bool = conn.query_row(&sql, params_from_iter(values.iter()), |r| r.get(0))?;
            if taken {
                return Err(StoreError::Uniqueness {
                    kind: E::KIND,
                    description: key.description,
                });
            }
        }
        Ok(())
    }

    fn insert<E: CatalogEntity>(conn: &Connection, entity: &E) -> rusqlite::Result<()> {
        let column_count = E::COLUMNS.len();
        let placeholders: Vec<String> = (1..=column_count + 3).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} (id, {}, created_at, updated_at) VALUES ({})",
            E::KIND.table(),
            E::COLUMNS.join(", "),
            placeholders.join(", ")
        );

        let mut values = Vec::with_capacity(column_count + 3);
        values.push(Value::Text(entity.id().to_string()));
        values.extend(entity.column_values());
        values.push(Value::Text(entity.version().as_string()));
        values.push(Value::Text(entity.version().as_string()));

        conn.execute(&sql, params_from_iter(values.iter()))?;
        entity.store_children(conn)
    }

    // =========================================================================
    // Entity operations
    // =========================================================================

    pub fn get<E: CatalogEntity>(&self, id: &str) -> StoreResult<Option<E>> {
        self.with_read_conn(|conn| Ok(Self::load::<E>(conn, id)?))
    }

    pub fn create<E: CatalogEntity>(&self, draft: E::Draft) -> StoreResult<E> {
        let id = match E::draft_id(&draft) {
            Some(id) => {
                validate_id(id)?;
                id.to_string()
            }
            None => new_id(E::KIND),
        };
        let entity = E::from_draft(id, draft, VersionToken::now());
        Self::check_valid(&entity)?;

        self.with_write_tx(|conn| {
            if Self::exists(conn, E::KIND, entity.id())? {
                return Err(StoreError::Uniqueness {
                    kind: E::KIND,
                    description: format!("id '{}'", entity.id()),
                });
            }
            Self::check_references(conn, &entity)?;
            Self::check_unique(conn, &entity)?;
            Self::insert(conn, &entity)?;
            debug!("Created {} {}", E::KIND, entity.id());
            Ok(entity)
        })
    }

    /// Applies `patch` to entity `id` if its stored version still equals
    /// `expected`. Without an expected version the update is unconditional.
    ///
    /// Existence, validation, references and uniqueness are checked first, in
    /// the same transaction as the guarded write. A stale `expected` yields
    /// [`UpdateOutcome::Conflict`] with the record as stored, re-read after the
    /// rejected write.
    pub fn update<E: CatalogEntity>(
        &self,
        id: &str,
        patch: E::Patch,
        expected: Option<&VersionToken>,
    ) -> StoreResult<UpdateOutcome<E>> {
        self.with_write_tx(|conn| {
            let current: E = Self::load(conn, id)?.ok_or_else(|| StoreError::NotFound {
                kind: E::KIND,
                id: id.to_string(),
            })?;

            let mut updated = current.clone();
            updated.apply_patch(patch);
            Self::check_valid(&updated)?;
            Self::check_references(conn, &updated)?;
            Self::check_unique(conn, &updated)?;

            let new_version = VersionToken::next_after(Some(current.version()));
            let outcome = guarded_update(
                conn,
                E::KIND.table(),
                id,
                expected,
                &new_version,
                E::COLUMNS,
                &updated.column_values(),
            )?;

            match outcome {
                GuardOutcome::Applied => {
                    updated.set_version(new_version);
                    updated.store_children(conn)?;
                    debug!("Updated {} {} to version {}", E::KIND, id, new_version);
                    Ok(UpdateOutcome::Updated(updated))
                }
                GuardOutcome::Rejected => {
                    let current: E = Self::load(conn, id)?.ok_or_else(|| StoreError::NotFound {
                        kind: E::KIND,
                        id: id.to_string(),
                    })?;
                    info!(
                        "Rejected stale update of {} {}: expected {}, stored {}",
                        E::KIND,
                        id,
                        expected.map(|v| v.to_string()).unwrap_or_default(),
                        current.version()
                    );
                    Ok(UpdateOutcome::Conflict(current))
                }
            }
        })
    }

    /// Deletes entity `id` and whatever the schema cascades from it.
    pub fn delete<E: CatalogEntity>(&self, id: &str) -> StoreResult<()> {
        self.with_write_tx(|conn| {
            let deleted = conn.execute(
                &format!("DELETE FROM {} WHERE id = ?1", E::KIND.table()),
                params![id],
            )?;
            if deleted == 0 {
                return Err(StoreError::NotFound {
                    kind: E::KIND,
                    id: id.to_string(),
                });
            }
            debug!("Deleted {} {}", E::KIND, id);
            Ok(())
        })
    }

    /// One page of entities whose display field contains `query.q`, ignoring
    /// case, sorted by that field.
    pub fn list<E: CatalogEntity>(&self, query: &ListQuery) -> StoreResult<Page<E>> {
        let display = E::KIND.display_column();
        let filter = format!(
            "(?1 IS NULL OR instr({}({}), ?1) > 0)",
            FOLD_FUNCTION, display
        );
        let pattern = match &query.q {
            Some(q) => Value::Text(q.to_lowercase()),
            None => Value::Null,
        };

        self.with_read_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE {}", E::KIND.table(), filter),
                params_from_iter([&pattern]),
                |r| r.get(0),
            )?;

            let sql = format!(
                "{} WHERE {} ORDER BY {}({}), id LIMIT ?2 OFFSET ?3",
                select_sql::<E>(),
                filter,
                FOLD_FUNCTION,
                display
            );
            let items = Self::query_many(
                conn,
                &sql,
                &[
                    pattern.clone(),
                    Value::Integer(query.limit as i64),
                    Value::Integer(i64::try_from(query.offset).unwrap_or(i64::MAX)),
                ],
            )?;

            Ok(Page {
                items,
                total: total as usize,
                limit: query.limit,
                offset: query.offset,
            })
        })
    }

    /// Tracks of a release in disc/track order.
    pub fn list_release_tracks(&self, release_id: &str) -> StoreResult<Vec<Track>> {
        self.with_read_conn(|conn| {
            if !Self::exists(conn, EntityKind::Release, release_id)? {
                return Err(StoreError::NotFound {
                    kind: EntityKind::Release,
                    id: release_id.to_string(),
                });
            }
            let sql = format!(
                "{} WHERE release_id = ?1 ORDER BY disc_number, track_number",
                select_sql::<Track>()
            );
            Ok(Self::query_many(
                conn,
                &sql,
                &[Value::Text(release_id.to_string())],
            )?)
        })
    }

    /// Every entity of kind `E`, ordered by id.
    pub fn export_all<E: CatalogEntity>(&self) -> StoreResult<Vec<E>> {
        self.with_read_conn(|conn| {
            let sql = format!("{} ORDER BY id", select_sql::<E>());
            Ok(Self::query_many(conn, &sql, &[])?)
        })
    }

    pub fn count(&self, kind: EntityKind) -> StoreResult<usize> {
        self.with_read_conn(|conn| {
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", kind.table()),
                [],
                |r| r.get(0),
            )?;
            Ok(count as usize)
        })
    }
}
