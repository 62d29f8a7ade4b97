//! SQLite schema definitions for the catalog database.
//!
//! Every entity table has a text `id` primary key plus `created_at` and
//! `updated_at` version tokens stored as ISO-8601 text, which compare
//! correctly as strings.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema};

// =============================================================================
// Reference data
// =============================================================================

const ARTISTS_TABLE: Table = Table {
    name: "artists",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("sort_name", &SqlType::Text),
        sqlite_column!("description", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
        sqlite_column!("updated_at", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_artists_name", "name")],
    unique_constraints: &[&["name"]],
};

const CIRCLES_TABLE: Table = Table {
    name: "circles",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("website", &SqlType::Text),
        sqlite_column!("description", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
        sqlite_column!("updated_at", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_circles_name", "name")],
    unique_constraints: &[&["name"]],
};

const EVENTS_TABLE: Table = Table {
    name: "events",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("held_on", &SqlType::Text), // YYYY-MM-DD
        sqlite_column!("location", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
        sqlite_column!("updated_at", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_events_name", "name")],
    unique_constraints: &[&["name"]],
};

const PLATFORMS_TABLE: Table = Table {
    name: "platforms",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("url_template", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
        sqlite_column!("updated_at", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_platforms_name", "name")],
    unique_constraints: &[&["name"]],
};

const OFFICIAL_SONGS_TABLE: Table = Table {
    name: "official_songs",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("source_work", &SqlType::Text, non_null = true),
        sqlite_column!("composer", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
        sqlite_column!("updated_at", &SqlType::Text, non_null = true),
    ],
    indices: &[
        ("idx_official_songs_name", "name"),
        ("idx_official_songs_source_work", "source_work"),
    ],
    unique_constraints: &[&["source_work", "name"]],
};

// =============================================================================
// Releases and tracks
// =============================================================================

const RELEASES_TABLE: Table = Table {
    name: "releases",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!(
            "circle_id",
            &SqlType::Text,
            foreign_key = Some(&ForeignKey {
                foreign_table: "circles",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::SetNull,
            })
        ),
        sqlite_column!(
            "event_id",
            &SqlType::Text,
            foreign_key = Some(&ForeignKey {
                foreign_table: "events",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::SetNull,
            })
        ),
        sqlite_column!("release_date", &SqlType::Text), // YYYY-MM-DD
        sqlite_column!("catalog_number", &SqlType::Text), // NULLs never collide
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
        sqlite_column!("updated_at", &SqlType::Text, non_null = true),
    ],
    indices: &[
        ("idx_releases_title", "title"),
        ("idx_releases_circle", "circle_id"),
        ("idx_releases_event", "event_id"),
    ],
    unique_constraints: &[&["catalog_number"]],
};

const TRACKS_TABLE: Table = Table {
    name: "tracks",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true, non_null = true),
        sqlite_column!(
            "release_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "releases",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("disc_number", &SqlType::Integer, non_null = true),
        sqlite_column!("track_number", &SqlType::Integer, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("duration_ms", &SqlType::Integer),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
        sqlite_column!("updated_at", &SqlType::Text, non_null = true),
    ],
    indices: &[
        ("idx_tracks_release", "release_id"),
        ("idx_tracks_title", "title"),
    ],
    unique_constraints: &[&["release_id", "disc_number", "track_number"]],
};

/// Track <-> Artist credits, ordered by position within the track.
const TRACK_CREDITS_TABLE: Table = Table {
    name: "track_credits",
    columns: &[
        sqlite_column!(
            "track_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "tracks",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "artist_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "artists",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("role", &SqlType::Text, non_null = true), // see CreditRole
    ],
    indices: &[
        ("idx_track_credits_track", "track_id"),
        ("idx_track_credits_artist", "artist_id"),
    ],
    unique_constraints: &[&["track_id", "position"]],
};

// =============================================================================
// Versioned Schema Definition
// =============================================================================

pub const CATALOG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        ARTISTS_TABLE,
        CIRCLES_TABLE,
        EVENTS_TABLE,
        PLATFORMS_TABLE,
        OFFICIAL_SONGS_TABLE,
        RELEASES_TABLE,
        TRACKS_TABLE,
        TRACK_CREDITS_TABLE,
    ],
    migration: None,
}];

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn create_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        let schema = &CATALOG_VERSIONED_SCHEMAS[0];
        schema.create(&conn).unwrap();
        conn
    }

    #[test]
    fn test_schema_creates_successfully() {
        let conn = create_db();
        CATALOG_VERSIONED_SCHEMAS[0].validate(&conn).unwrap();
    }

    #[test]
    fn test_deleting_circle_detaches_releases() {
        let conn = create_db();
        conn.execute(
            "INSERT INTO circles (id, name, created_at, updated_at) VALUES ('ci_1', 'Circle', 't', 't')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO releases (id, title, circle_id, created_at, updated_at) VALUES ('re_1', 'Album', 'ci_1', 't', 't')",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM circles WHERE id = 'ci_1'", []).unwrap();

        let circle_id: Option<String> = conn
            .query_row("SELECT circle_id FROM releases WHERE id = 're_1'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(circle_id, None);
    }

    #[test]
    fn test_deleting_release_removes_tracks_and_credits() {
        let conn = create_db();
        conn.execute_batch(
            "INSERT INTO artists (id, name, created_at, updated_at) VALUES ('ar_1', 'Singer', 't', 't');
             INSERT INTO releases (id, title, created_at, updated_at) VALUES ('re_1', 'Album', 't', 't');
             INSERT INTO tracks (id, release_id, disc_number, track_number, title, created_at, updated_at)
                 VALUES ('tr_1', 're_1', 1, 1, 'Song', 't', 't');
             INSERT INTO track_credits (track_id, position, artist_id, role) VALUES ('tr_1', 0, 'ar_1', 'vocal');",
        )
        .unwrap();

        conn.execute("DELETE FROM releases WHERE id = 're_1'", []).unwrap();

        let tracks: i64 = conn
            .query_row("SELECT COUNT(*) FROM tracks", [], |r| r.get(0))
            .unwrap();
        let credits: i64 = conn
            .query_row("SELECT COUNT(*) FROM track_credits", [], |r| r.get(0))
            .unwrap();
        assert_eq!(tracks, 0);
        assert_eq!(credits, 0);
    }

    #[test]
    fn test_track_position_is_unique_per_release() {
        let conn = create_db();
        conn.execute_batch(
            "INSERT INTO releases (id, title, created_at, updated_at) VALUES ('re_1', 'Album', 't', 't');
             INSERT INTO tracks (id, release_id, disc_number, track_number, title, created_at, updated_at)
                 VALUES ('tr_1', 're_1', 1, 1, 'Song', 't', 't');",
        )
        .unwrap();

        let duplicate = conn.execute(
            "INSERT INTO tracks (id, release_id, disc_number, track_number, title, created_at, updated_at)
             VALUES ('tr_2', 're_1', 1, 1, 'Other Song', 't', 't')",
            [],
        );
        assert!(duplicate.is_err());
    }
}
