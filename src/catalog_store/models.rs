//! Catalog models.
//!
//! Each entity comes in three shapes: the stored record, a draft used to create
//! it, and a patch used to update it. Patches carry only the fields being
//! changed; nullable fields use `Option<Option<T>>` so that an explicit `null`
//! clears the value while an absent field leaves it alone.

use super::occ::VersionToken;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Distinguishes a field set to `null` (`Some(None)`) from a missing one (`None`).
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

// =============================================================================
// Entity kinds
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Artist,
    Circle,
    Event,
    Platform,
    OfficialSong,
    Release,
    Track,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Artist,
        EntityKind::Circle,
        EntityKind::Event,
        EntityKind::Platform,
        EntityKind::OfficialSong,
        EntityKind::Release,
        EntityKind::Track,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Artist => "artists",
            EntityKind::Circle => "circles",
            EntityKind::Event => "events",
            EntityKind::Platform => "platforms",
            EntityKind::OfficialSong => "official_songs",
            EntityKind::Release => "releases",
            EntityKind::Track => "tracks",
        }
    }

    /// Path segment used by the HTTP API.
    pub fn path(&self) -> &'static str {
        match self {
            EntityKind::OfficialSong => "official-songs",
            other => other.table(),
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        EntityKind::ALL.into_iter().find(|kind| kind.path() == path)
    }

    pub fn id_prefix(&self) -> &'static str {
        match self {
            EntityKind::Artist => "ar",
            EntityKind::Circle => "ci",
            EntityKind::Event => "ev",
            EntityKind::Platform => "pl",
            EntityKind::OfficialSong => "os",
            EntityKind::Release => "re",
            EntityKind::Track => "tr",
        }
    }

    /// Column searched and sorted on when browsing.
    pub fn display_column(&self) -> &'static str {
        match self {
            EntityKind::Release | EntityKind::Track => "title",
            _ => "name",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Artist => "artist",
            EntityKind::Circle => "circle",
            EntityKind::Event => "event",
            EntityKind::Platform => "platform",
            EntityKind::OfficialSong => "official song",
            EntityKind::Release => "release",
            EntityKind::Track => "track",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Artists
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub sort_name: Option<String>,
    pub description: Option<String>,
    pub created_at: VersionToken,
    pub updated_at: VersionToken,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArtistDraft {
    pub id: Option<String>,
    pub name: String,
    pub sort_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub sort_name: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
}

// =============================================================================
// Circles
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Circle {
    pub id: String,
    pub name: String,
    pub website: Option<String>,
    pub description: Option<String>,
    pub created_at: VersionToken,
    pub updated_at: VersionToken,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CircleDraft {
    pub id: Option<String>,
    pub name: String,
    pub website: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CirclePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub website: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
}

// =============================================================================
// Events
// =============================================================================

/// A convention or other event where releases debut.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub name: String,
    /// YYYY-MM-DD
    pub held_on: Option<String>,
    pub location: Option<String>,
    pub created_at: VersionToken,
    pub updated_at: VersionToken,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventDraft {
    pub id: Option<String>,
    pub name: String,
    pub held_on: Option<String>,
    pub location: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub held_on: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub location: Option<Option<String>>,
}

// =============================================================================
// Platforms
// =============================================================================

/// A distribution platform (store, streaming service, ...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Platform {
    pub id: String,
    pub name: String,
    pub url_template: Option<String>,
    pub created_at: VersionToken,
    pub updated_at: VersionToken,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlatformDraft {
    pub id: Option<String>,
    pub name: String,
    pub url_template: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub url_template: Option<Option<String>>,
}

// =============================================================================
// Official songs
// =============================================================================

/// An original song that arrangements are based on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficialSong {
    pub id: String,
    pub name: String,
    pub source_work: String,
    pub composer: Option<String>,
    pub created_at: VersionToken,
    pub updated_at: VersionToken,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OfficialSongDraft {
    pub id: Option<String>,
    pub name: String,
    pub source_work: String,
    pub composer: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficialSongPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_work: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub composer: Option<Option<String>>,
}

// =============================================================================
// Releases
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub id: String,
    pub title: String,
    pub circle_id: Option<String>,
    pub event_id: Option<String>,
    /// YYYY-MM-DD
    pub release_date: Option<String>,
    pub catalog_number: Option<String>,
    pub created_at: VersionToken,
    pub updated_at: VersionToken,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReleaseDraft {
    pub id: Option<String>,
    pub title: String,
    pub circle_id: Option<String>,
    pub event_id: Option<String>,
    pub release_date: Option<String>,
    pub catalog_number: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub circle_id: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub event_id: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub release_date: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub catalog_number: Option<Option<String>>,
}

// =============================================================================
// Tracks
// =============================================================================

/// What an artist did on a track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditRole {
    Vocal,
    Lyrics,
    Arrangement,
    Composition,
    Performance,
    Illustration,
    Other,
}

impl CreditRole {
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "vocal" => CreditRole::Vocal,
            "lyrics" => CreditRole::Lyrics,
            "arrangement" => CreditRole::Arrangement,
            "composition" => CreditRole::Composition,
            "performance" => CreditRole::Performance,
            "illustration" => CreditRole::Illustration,
            _ => CreditRole::Other,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            CreditRole::Vocal => "vocal",
            CreditRole::Lyrics => "lyrics",
            CreditRole::Arrangement => "arrangement",
            CreditRole::Composition => "composition",
            CreditRole::Performance => "performance",
            CreditRole::Illustration => "illustration",
            CreditRole::Other => "other",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credit {
    pub artist_id: String,
    pub role: CreditRole,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub release_id: String,
    pub disc_number: i64,
    pub track_number: i64,
    pub title: String,
    pub duration_ms: Option<i64>,
    pub credits: Vec<Credit>,
    pub created_at: VersionToken,
    pub updated_at: VersionToken,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackDraft {
    pub id: Option<String>,
    pub release_id: String,
    pub disc_number: i64,
    pub track_number: i64,
    pub title: String,
    pub duration_ms: Option<i64>,
    pub credits: Vec<Credit>,
}

impl Default for TrackDraft {
    fn default() -> Self {
        TrackDraft {
            id: None,
            release_id: String::new(),
            disc_number: 1,
            track_number: 0,
            title: String::new(),
            duration_ms: None,
            credits: vec![],
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disc_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration_ms: Option<Option<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits: Option<Vec<Credit>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_distinguishes_null_from_absent() {
        let patch: ReleasePatch =
            serde_json::from_str(r#"{"title": "New", "circleId": null}"#).unwrap();
        assert_eq!(patch.title.as_deref(), Some("New"));
        assert_eq!(patch.circle_id, Some(None));
        assert_eq!(patch.event_id, None);
        assert_eq!(patch.catalog_number, None);
    }

    #[test]
    fn test_patch_serializes_only_present_fields() {
        let patch = ArtistPatch {
            name: Some("B's Name".to_string()),
            sort_name: None,
            description: Some(None),
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "B's Name", "description": null})
        );
    }

    #[test]
    fn test_entity_json_is_camel_case() {
        let artist = Artist {
            id: "ar_001".to_string(),
            name: "Old Name".to_string(),
            sort_name: None,
            description: None,
            created_at: VersionToken::parse("2024-01-01T00:00:00.000Z").unwrap(),
            updated_at: VersionToken::parse("2024-01-01T00:00:00.000Z").unwrap(),
        };
        let json = serde_json::to_value(&artist).unwrap();
        assert_eq!(json["updatedAt"], "2024-01-01T00:00:00.000Z");
        assert_eq!(json["sortName"], serde_json::Value::Null);
    }

    #[test]
    fn test_credit_roles() {
        let credit: Credit =
            serde_json::from_str(r#"{"artistId": "ar_1", "role": "arrangement"}"#).unwrap();
        assert_eq!(credit.role, CreditRole::Arrangement);
        assert_eq!(CreditRole::from_db_str(credit.role.to_db_str()), credit.role);
        assert!(serde_json::from_str::<Credit>(r#"{"artistId": "ar_1", "role": "dj"}"#).is_err());
    }

    #[test]
    fn test_entity_kind_paths() {
        assert_eq!(
            EntityKind::from_path("official-songs"),
            Some(EntityKind::OfficialSong)
        );
        assert_eq!(EntityKind::OfficialSong.table(), "official_songs");
        assert_eq!(EntityKind::from_path("official_songs"), None);
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_path(kind.path()), Some(kind));
        }
    }
}
