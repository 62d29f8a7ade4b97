//! Optimistic concurrency control for catalog entity updates.
//!
//! Every catalog row carries an `updated_at` version token. An update names the
//! token it was based on, and the row is only rewritten if that token is still the
//! stored one. The comparison and the write happen in a single conditional
//! `UPDATE ... WHERE id = ? AND updated_at = ?`, whose affected-row count decides
//! the outcome, so two writers starting from the same token can never both win.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Version token of a catalog entity.
///
/// A UTC timestamp with millisecond resolution, rendered on the wire and in the
/// database as ISO-8601 (`2024-01-01T00:00:05.120Z`). Tokens of the same entity
/// are strictly increasing, see [`VersionToken::next_after`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionToken(DateTime<Utc>);

#[derive(Debug, thiserror::Error)]
#[error("invalid version token '{value}': {source}")]
pub struct VersionTokenParseError {
    value: String,
    source: chrono::ParseError,
}

impl VersionToken {
    pub fn now() -> Self {
        VersionToken(Utc::now().trunc_subsecs(3))
    }

    /// Token for a write that replaces `previous`.
    ///
    /// Usually the current time, but never less than one millisecond after the
    /// previous token, so a coarse or backwards-stepping clock can't hand out the
    /// same token twice for one entity.
    pub fn next_after(previous: Option<&VersionToken>) -> Self {
        let now = Self::now();
        match previous {
            Some(previous) if now <= *previous => {
                VersionToken(previous.0 + chrono::Duration::milliseconds(1))
            }
            _ => now,
        }
    }

    pub fn parse(value: &str) -> Result<Self, VersionTokenParseError> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| VersionToken(dt.with_timezone(&Utc).trunc_subsecs(3)))
            .map_err(|source| VersionTokenParseError {
                value: value.to_string(),
                source,
            })
    }

    pub fn as_string(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl Serialize for VersionToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_string())
    }
}

impl<'de> Deserialize<'de> for VersionToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        VersionToken::parse(&value).map_err(serde::de::Error::custom)
    }
}

impl ToSql for VersionToken {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(Value::Text(self.as_string())))
    }
}

impl FromSql for VersionToken {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        VersionToken::parse(text).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Result of a guarded write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// The row was rewritten and now carries the new version token.
    Applied,
    /// No row matched: the stored version differs from the expected one
    /// (or, without an expected version, the row is gone).
    Rejected,
}

/// Rewrites `columns` of row `id` in `table` and stamps it with `new_version`,
/// provided the stored version still equals `expected`.
///
/// With `expected == None` no version check is made and the write is
/// unconditional. `values` must line up with `columns`.
pub fn guarded_update(
    conn: &Connection,
    table: &str,
    id: &str,
    expected: Option<&VersionToken>,
    new_version: &VersionToken,
    columns: &[&str],
    values: &[Value],
) -> rusqlite::Result<GuardOutcome> {
    debug_assert_eq!(columns.len(), values.len());

    let mut assignments: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(index, column)| format!("{} = ?{}", column, index + 1))
        .collect();
    let mut next_param = columns.len() + 1;
    assignments.push(format!("updated_at = ?{}", next_param));
    next_param += 1;

    let mut sql = format!(
        "UPDATE {} SET {} WHERE id = ?{}",
        table,
        assignments.join(", "),
        next_param
    );
    next_param += 1;

    let mut params: Vec<Value> = values.to_vec();
    params.push(Value::Text(new_version.as_string()));
    params.push(Value::Text(id.to_string()));
    if let Some(expected) = expected {
        sql.push_str(&format!(" AND updated_at = ?{}", next_param));
        params.push(Value::Text(expected.as_string()));
    }

    let changed = conn.execute(&sql, params_from_iter(params.iter()))?;
    Ok(if changed == 1 {
        GuardOutcome::Applied
    } else {
        GuardOutcome::Rejected
    })
}
