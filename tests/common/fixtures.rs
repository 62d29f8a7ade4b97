//! Test fixture creation
//!
//! Builds the temporary databases each test server runs on.

use super::constants::*;
use anyhow::Result;
use doujin_catalog_server::catalog_store::{
    ArtistDraft, CircleDraft, Credit, CreditRole, EventDraft, ReleaseDraft, SqliteCatalogStore,
    TrackDraft,
};
use doujin_catalog_server::catalog_store::{Artist, Circle, Event, Release, Track};
use doujin_catalog_server::user::{SqliteUserStore, UserManager, UserRole};
use std::path::Path;
use std::sync::Arc;

/// Seeds the catalog database at `path` with two artists, one circle, one
/// event, and a release with two tracks.
pub fn create_test_catalog(path: &Path) -> Result<SqliteCatalogStore> {
    let store = SqliteCatalogStore::new(path, 2)?;

    store.create::<Artist>(ArtistDraft {
        id: Some(ARTIST_1_ID.to_string()),
        name: ARTIST_1_NAME.to_string(),
        ..Default::default()
    })?;
    store.create::<Artist>(ArtistDraft {
        id: Some(ARTIST_2_ID.to_string()),
        name: ARTIST_2_NAME.to_string(),
        sort_name: Some("kaito".to_string()),
        ..Default::default()
    })?;
    store.create::<Circle>(CircleDraft {
        id: Some(CIRCLE_1_ID.to_string()),
        name: "Sound Holic".to_string(),
        website: Some("https://example.com/soundholic".to_string()),
        ..Default::default()
    })?;
    store.create::<Event>(EventDraft {
        id: Some(EVENT_1_ID.to_string()),
        name: "Reitaisai 20".to_string(),
        held_on: Some("2023-05-07".to_string()),
        ..Default::default()
    })?;
    store.create::<Release>(ReleaseDraft {
        id: Some(RELEASE_1_ID.to_string()),
        title: "First Press".to_string(),
        circle_id: Some(CIRCLE_1_ID.to_string()),
        event_id: Some(EVENT_1_ID.to_string()),
        release_date: Some("2023-05-07".to_string()),
        catalog_number: Some(RELEASE_1_CATALOG_NUMBER.to_string()),
    })?;
    store.create::<Track>(TrackDraft {
        id: Some(TRACK_1_ID.to_string()),
        release_id: RELEASE_1_ID.to_string(),
        track_number: 1,
        title: "Opening".to_string(),
        duration_ms: Some(215_000),
        credits: vec![Credit {
            artist_id: ARTIST_1_ID.to_string(),
            role: CreditRole::Vocal,
        }],
        ..Default::default()
    })?;
    store.create::<Track>(TrackDraft {
        id: Some(TRACK_2_ID.to_string()),
        release_id: RELEASE_1_ID.to_string(),
        track_number: 2,
        title: "Closing".to_string(),
        credits: vec![Credit {
            artist_id: ARTIST_2_ID.to_string(),
            role: CreditRole::Arrangement,
        }],
        ..Default::default()
    })?;

    Ok(store)
}

/// Creates the user database at `path` with an admin, two editors and a
/// viewer, all with passwords set.
pub fn create_test_users(path: &Path) -> Result<UserManager> {
    let user_store = SqliteUserStore::new(path)?;
    let user_manager = UserManager::new(Arc::new(user_store));

    let users = [
        (ADMIN_USER, ADMIN_PASS, UserRole::Admin),
        (EDITOR_USER, EDITOR_PASS, UserRole::Editor),
        (EDITOR_2_USER, EDITOR_2_PASS, UserRole::Editor),
        (VIEWER_USER, VIEWER_PASS, UserRole::Viewer),
    ];
    for (handle, password, role) in users {
        user_manager.add_user(handle, role)?;
        user_manager.set_password(handle, password)?;
    }

    Ok(user_manager)
}
