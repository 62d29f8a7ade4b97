use crate::sqlite_column;
use crate::sqlite_persistence::{
    migrate_if_needed, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
    DEFAULT_TIMESTAMP,
};
use crate::user::*;
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::{
    path::Path,
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, SystemTime},
};
use tracing::debug;

use super::auth::CredentialHasher;

/// V 0
const USER_TABLE_V_0: Table = Table {
    name: "user",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!("handle", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("role", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[],
    indices: &[("idx_user_handle", "handle")],
};
const AUTH_TOKEN_TABLE_V_0: Table = Table {
    name: "auth_token",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "user",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("value", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_used", &SqlType::Integer),
    ],
    unique_constraints: &[],
    indices: &[("idx_auth_token_value", "value")],
};
const USER_PASSWORD_CREDENTIALS_V_0: Table = Table {
    name: "user_password_credentials",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            is_unique = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "user",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("salt", &SqlType::Text, non_null = true),
        sqlite_column!("hash", &SqlType::Text, non_null = true),
        sqlite_column!("hasher", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_used", &SqlType::Integer),
    ],
    unique_constraints: &[],
    indices: &[],
};

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        USER_TABLE_V_0,
        AUTH_TOKEN_TABLE_V_0,
        USER_PASSWORD_CREDENTIALS_V_0,
    ],
    migration: None,
}];

fn system_time_from_column_result(value: i64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(value as u64)
}

fn system_time_to_column(value: SystemTime) -> i64 {
    value
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn auth_token_from_row(row: &rusqlite::Row) -> rusqlite::Result<AuthToken> {
    Ok(AuthToken {
        user_id: row.get::<_, i64>("user_id")? as usize,
        value: AuthTokenValue(row.get("value")?),
        created: system_time_from_column_result(row.get("created")?),
        last_used: row
            .get::<_, Option<i64>>("last_used")?
            .map(system_time_from_column_result),
    })
}

#[derive(Clone)]
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let mut conn = Connection::open_with_flags(
            db_path.as_ref(),
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open user database")?;

        migrate_if_needed(&mut conn, VERSIONED_SCHEMAS, "user")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(SqliteUserStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("User store connection mutex poisoned"))
    }
}

impl UserStore for SqliteUserStore {
    fn create_user(&self, user_handle: &str, role: UserRole) -> Result<usize> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO user (handle, role) VALUES (?1, ?2)",
            params![user_handle, role.as_str()],
        )
        .with_context(|| format!("Failed to create user {}", user_handle))?;
        let id = conn.last_insert_rowid() as usize;
        debug!("Created user {} with id {}", user_handle, id);
        Ok(id)
    }

    fn get_user_handle(&self, user_id: usize) -> Result<Option<String>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT handle FROM user WHERE id = ?1",
                params![user_id as i64],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn get_all_user_handles(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT handle FROM user ORDER BY handle")?;
        let handles = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(handles)
    }

    fn get_user_id(&self, user_handle: &str) -> Result<Option<usize>> {
        let conn = self.conn()?;
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM user WHERE handle = ?1",
                params![user_handle],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(|id| id as usize))
    }

    fn get_user_role(&self, user_id: usize) -> Result<Option<UserRole>> {
        let conn = self.conn()?;
        let role: Option<String> = conn
            .query_row(
                "SELECT role FROM user WHERE id = ?1",
                params![user_id as i64],
                |row| row.get(0),
            )
            .optional()?;
        match role {
            Some(role) => Ok(Some(
                UserRole::from_str(&role)
                    .with_context(|| format!("Invalid role '{}' for user {}", role, user_id))?,
            )),
            None => Ok(None),
        }
    }

    fn set_user_role(&self, user_id: usize, role: UserRole) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE user SET role = ?1 WHERE id = ?2",
            params![role.as_str(), user_id as i64],
        )?;
        if updated == 0 {
            anyhow::bail!("User {} not found", user_id);
        }
        Ok(())
    }
}

impl UserAuthTokenStore for SqliteUserStore {
    fn get_user_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT user_id, value, created, last_used FROM auth_token WHERE value = ?1",
                params![value.0],
                auth_token_from_row,
            )
            .optional()?)
    }

    fn delete_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let Some(existing) = self.get_user_auth_token(token)? else {
            return Ok(None);
        };
        let conn = self.conn()?;
        conn.execute("DELETE FROM auth_token WHERE value = ?1", params![token.0])?;
        Ok(Some(existing))
    }

    fn update_user_auth_token_last_used_timestamp(&self, token: &AuthTokenValue) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE auth_token SET last_used = ?1 WHERE value = ?2",
            params![system_time_to_column(SystemTime::now()), token.0],
        )?;
        Ok(())
    }

    fn add_user_auth_token(&self, token: AuthToken) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO auth_token (value, user_id, created) VALUES (?1, ?2, ?3)",
            params![
                token.value.0,
                token.user_id as i64,
                system_time_to_column(token.created)
            ],
        )?;
        Ok(())
    }

    fn get_all_user_auth_tokens(&self, user_handle: &str) -> Result<Vec<AuthToken>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, value, created, last_used FROM auth_token
             WHERE user_id = (SELECT id FROM user WHERE handle = ?1)",
        )?;
        let tokens = stmt
            .query_map(params![user_handle], auth_token_from_row)?
            .collect::<Result<Vec<AuthToken>, _>>()?;
        Ok(tokens)
    }
}

impl UserAuthCredentialsStore for SqliteUserStore {
    fn get_password_credentials(
        &self,
        user_handle: &str,
    ) -> Result<Option<UsernamePasswordCredentials>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT c.user_id, c.salt, c.hash, c.hasher, c.created, c.last_used
                 FROM user_password_credentials c JOIN user u ON u.id = c.user_id
                 WHERE u.handle = ?1",
                params![user_handle],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, Option<i64>>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((user_id, salt, hash, hasher, created, last_used)) = row else {
            return Ok(None);
        };
        Ok(Some(UsernamePasswordCredentials {
            user_id: user_id as usize,
            salt,
            hash,
            hasher: CredentialHasher::from_str(&hasher)?,
            created: system_time_from_column_result(created),
            last_used: last_used.map(system_time_from_column_result),
        }))
    }

    fn set_password_credentials(&self, credentials: &UsernamePasswordCredentials) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO user_password_credentials (user_id, salt, hash, hasher, created)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
                salt = excluded.salt, hash = excluded.hash, hasher = excluded.hasher,
                created = excluded.created, last_used = NULL",
            params![
                credentials.user_id as i64,
                credentials.salt,
                credentials.hash,
                credentials.hasher.to_string(),
                system_time_to_column(credentials.created)
            ],
        )?;
        Ok(())
    }

    fn touch_password_credentials(&self, user_id: usize) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE user_password_credentials SET last_used = ?1 WHERE user_id = ?2",
            params![system_time_to_column(SystemTime::now()), user_id as i64],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use tempfile::TempDir;

    fn create_tmp_store() -> (SqliteUserStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let temp_file_path = temp_dir.path().join("test.db");
        let store = SqliteUserStore::new(&temp_file_path).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_create_user() {
        let (store, _temp_dir) = create_tmp_store();

        let user_id = store.create_user("test_user", UserRole::Editor).unwrap();
        assert_eq!(store.get_user_id("test_user").unwrap(), Some(user_id));
        assert_eq!(
            store.get_user_handle(user_id).unwrap(),
            Some("test_user".to_string())
        );
        assert_eq!(store.get_user_role(user_id).unwrap(), Some(UserRole::Editor));
        assert_eq!(store.get_user_id("nobody").unwrap(), None);
    }

    #[test]
    fn test_duplicate_handle_fails() {
        let (store, _temp_dir) = create_tmp_store();
        store.create_user("dup", UserRole::Viewer).unwrap();
        assert!(store.create_user("dup", UserRole::Admin).is_err());
    }

    #[test]
    fn test_set_user_role() {
        let (store, _temp_dir) = create_tmp_store();
        let user_id = store.create_user("someone", UserRole::Viewer).unwrap();
        store.set_user_role(user_id, UserRole::Admin).unwrap();
        assert_eq!(store.get_user_role(user_id).unwrap(), Some(UserRole::Admin));
        assert!(store.set_user_role(user_id + 100, UserRole::Admin).is_err());
    }

    #[test]
    fn test_auth_tokens() {
        let (store, _temp_dir) = create_tmp_store();
        let user_id = store.create_user("tok", UserRole::Editor).unwrap();
        let token = AuthToken {
            user_id,
            created: SystemTime::now(),
            last_used: None,
            value: AuthTokenValue::generate(),
        };
        store.add_user_auth_token(token.clone()).unwrap();

        let loaded = store.get_user_auth_token(&token.value).unwrap().unwrap();
        assert_eq!(loaded.user_id, user_id);
        assert!(loaded.last_used.is_none());

        store
            .update_user_auth_token_last_used_timestamp(&token.value)
            .unwrap();
        let loaded = store.get_user_auth_token(&token.value).unwrap().unwrap();
        assert!(loaded.last_used.is_some());

        assert_eq!(store.get_all_user_auth_tokens("tok").unwrap().len(), 1);

        assert!(store.delete_user_auth_token(&token.value).unwrap().is_some());
        assert!(store.get_user_auth_token(&token.value).unwrap().is_none());
        assert!(store.delete_user_auth_token(&token.value).unwrap().is_none());
    }

    #[test]
    fn test_password_credentials_are_replaced() {
        let (store, _temp_dir) = create_tmp_store();
        let user_id = store.create_user("pw", UserRole::Editor).unwrap();
        assert!(store.get_password_credentials("pw").unwrap().is_none());

        let first = UsernamePasswordCredentials::create(user_id, "first").unwrap();
        store.set_password_credentials(&first).unwrap();
        let second = UsernamePasswordCredentials::create(user_id, "second").unwrap();
        store.set_password_credentials(&second).unwrap();

        let loaded = store.get_password_credentials("pw").unwrap().unwrap();
        assert!(loaded.verify("second").unwrap());
        assert!(!loaded.verify("first").unwrap());
    }

    #[test]
    fn test_reopening_existing_database() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("user.db");
        {
            let store = SqliteUserStore::new(&path).unwrap();
            store.create_user("persisted", UserRole::Admin).unwrap();
        }
        let store = SqliteUserStore::new(&path).unwrap();
        assert!(store.get_user_id("persisted").unwrap().is_some());
    }
}
