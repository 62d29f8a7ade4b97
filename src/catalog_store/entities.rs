//! `CatalogEntity` implementations for the catalog kinds.

use super::models::*;
use super::occ::VersionToken;
use super::trait_def::{CatalogEntity, Reference, UniqueKey};
use super::validation::*;
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn opt_text(value: &Option<String>) -> Value {
    match value {
        Some(value) => Value::Text(value.clone()),
        None => Value::Null,
    }
}

fn opt_int(value: Option<i64>) -> Value {
    match value {
        Some(value) => Value::Integer(value),
        None => Value::Null,
    }
}

fn name_key(name: &str) -> UniqueKey {
    UniqueKey {
        columns: &["name"],
        values: vec![text(name)],
        description: format!("name '{}'", name),
    }
}

impl CatalogEntity for Artist {
    type Draft = ArtistDraft;
    type Patch = ArtistPatch;

    const KIND: EntityKind = EntityKind::Artist;
    const COLUMNS: &'static [&'static str] = &["name", "sort_name", "description"];

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> &VersionToken {
        &self.created_at
    }

    fn version(&self) -> &VersionToken {
        &self.updated_at
    }

    fn set_version(&mut self, version: VersionToken) {
        self.updated_at = version;
    }

    fn draft_id(draft: &ArtistDraft) -> Option<&str> {
        draft.id.as_deref()
    }

    fn from_draft(id: String, draft: ArtistDraft, version: VersionToken) -> Self {
        Artist {
            id,
            name: draft.name,
            sort_name: draft.sort_name,
            description: draft.description,
            created_at: version,
            updated_at: version,
        }
    }

    fn apply_patch(&mut self, patch: ArtistPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(sort_name) = patch.sort_name {
            self.sort_name = sort_name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
    }

    fn to_patch(&self) -> ArtistPatch {
        ArtistPatch {
            name: Some(self.name.clone()),
            sort_name: Some(self.sort_name.clone()),
            description: Some(self.description.clone()),
        }
    }

    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = vec![];
        require_non_empty(&mut errors, "name", &self.name);
        require_non_blank(&mut errors, "sortName", &self.sort_name);
        errors
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Artist {
            id: row.get("id")?,
            name: row.get("name")?,
            sort_name: row.get("sort_name")?,
            description: row.get("description")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn column_values(&self) -> Vec<Value> {
        vec![
            text(&self.name),
            opt_text(&self.sort_name),
            opt_text(&self.description),
        ]
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![name_key(&self.name)]
    }
}

impl CatalogEntity for Circle {
    type Draft = CircleDraft;
    type Patch = CirclePatch;

    const KIND: EntityKind = EntityKind::Circle;
    const COLUMNS: &'static [&'static str] = &["name", "website", "description"];

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> &VersionToken {
        &self.created_at
    }

    fn version(&self) -> &VersionToken {
        &self.updated_at
    }

    fn set_version(&mut self, version: VersionToken) {
        self.updated_at = version;
    }

    fn draft_id(draft: &CircleDraft) -> Option<&str> {
        draft.id.as_deref()
    }

    fn from_draft(id: String, draft: CircleDraft, version: VersionToken) -> Self {
        Circle {
            id,
            name: draft.name,
            website: draft.website,
            description: draft.description,
            created_at: version,
            updated_at: version,
        }
    }

    fn apply_patch(&mut self, patch: CirclePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(website) = patch.website {
            self.website = website;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
    }

    fn to_patch(&self) -> CirclePatch {
        CirclePatch {
            name: Some(self.name.clone()),
            website: Some(self.website.clone()),
            description: Some(self.description.clone()),
        }
    }

    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = vec![];
        require_non_empty(&mut errors, "name", &self.name);
        require_non_blank(&mut errors, "website", &self.website);
        errors
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Circle {
            id: row.get("id")?,
            name: row.get("name")?,
            website: row.get("website")?,
            description: row.get("description")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn column_values(&self) -> Vec<Value> {
        vec![
            text(&self.name),
            opt_text(&self.website),
            opt_text(&self.description),
        ]
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![name_key(&self.name)]
    }
}

impl CatalogEntity for Event {
    type Draft = EventDraft;
    type Patch = EventPatch;

    const KIND: EntityKind = EntityKind::Event;
    const COLUMNS: &'static [&'static str] = &["name", "held_on", "location"];

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> &VersionToken {
        &self.created_at
    }

    fn version(&self) -> &VersionToken {
        &self.updated_at
    }

    fn set_version(&mut self, version: VersionToken) {
        self.updated_at = version;
    }

    fn draft_id(draft: &EventDraft) -> Option<&str> {
        draft.id.as_deref()
    }

    fn from_draft(id: String, draft: EventDraft, version: VersionToken) -> Self {
        Event {
            id,
            name: draft.name,
            held_on: draft.held_on,
            location: draft.location,
            created_at: version,
            updated_at: version,
        }
    }

    fn apply_patch(&mut self, patch: EventPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(held_on) = patch.held_on {
            self.held_on = held_on;
        }
        if let Some(location) = patch.location {
            self.location = location;
        }
    }

    fn to_patch(&self) -> EventPatch {
        EventPatch {
            name: Some(self.name.clone()),
            held_on: Some(self.held_on.clone()),
            location: Some(self.location.clone()),
        }
    }

    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = vec![];
        require_non_empty(&mut errors, "name", &self.name);
        require_date(&mut errors, "heldOn", &self.held_on);
        errors
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Event {
            id: row.get("id")?,
            name: row.get("name")?,
            held_on: row.get("held_on")?,
            location: row.get("location")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn column_values(&self) -> Vec<Value> {
        vec![
            text(&self.name),
            opt_text(&self.held_on),
            opt_text(&self.location),
        ]
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![name_key(&self.name)]
    }
}

impl CatalogEntity for Platform {
    type Draft = PlatformDraft;
    type Patch = PlatformPatch;

    const KIND: EntityKind = EntityKind::Platform;
    const COLUMNS: &'static [&'static str] = &["name", "url_template"];

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> &VersionToken {
        &self.created_at
    }

    fn version(&self) -> &VersionToken {
        &self.updated_at
    }

    fn set_version(&mut self, version: VersionToken) {
        self.updated_at = version;
    }

    fn draft_id(draft: &PlatformDraft) -> Option<&str> {
        draft.id.as_deref()
    }

    fn from_draft(id: String, draft: PlatformDraft, version: VersionToken) -> Self {
        Platform {
            id,
            name: draft.name,
            url_template: draft.url_template,
            created_at: version,
            updated_at: version,
        }
    }

    fn apply_patch(&mut self, patch: PlatformPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(url_template) = patch.url_template {
            self.url_template = url_template;
        }
    }

    fn to_patch(&self) -> PlatformPatch {
        PlatformPatch {
            name: Some(self.name.clone()),
            url_template: Some(self.url_template.clone()),
        }
    }

    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = vec![];
        require_non_empty(&mut errors, "name", &self.name);
        require_non_blank(&mut errors, "urlTemplate", &self.url_template);
        errors
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Platform {
            id: row.get("id")?,
            name: row.get("name")?,
            url_template: row.get("url_template")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn column_values(&self) -> Vec<Value> {
        vec![text(&self.name), opt_text(&self.url_template)]
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![name_key(&self.name)]
    }
}

impl CatalogEntity for OfficialSong {
    type Draft = OfficialSongDraft;
    type Patch = OfficialSongPatch;

    const KIND: EntityKind = EntityKind::OfficialSong;
    const COLUMNS: &'static [&'static str] = &["name", "source_work", "composer"];

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> &VersionToken {
        &self.created_at
    }

    fn version(&self) -> &VersionToken {
        &self.updated_at
    }

    fn set_version(&mut self, version: VersionToken) {
        self.updated_at = version;
    }

    fn draft_id(draft: &OfficialSongDraft) -> Option<&str> {
        draft.id.as_deref()
    }

    fn from_draft(id: String, draft: OfficialSongDraft, version: VersionToken) -> Self {
        OfficialSong {
            id,
            name: draft.name,
            source_work: draft.source_work,
            composer: draft.composer,
            created_at: version,
            updated_at: version,
        }
    }

    fn apply_patch(&mut self, patch: OfficialSongPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(source_work) = patch.source_work {
            self.source_work = source_work;
        }
        if let Some(composer) = patch.composer {
            self.composer = composer;
        }
    }

    fn to_patch(&self) -> OfficialSongPatch {
        OfficialSongPatch {
            name: Some(self.name.clone()),
            source_work: Some(self.source_work.clone()),
            composer: Some(self.composer.clone()),
        }
    }

    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = vec![];
        require_non_empty(&mut errors, "name", &self.name);
        require_non_empty(&mut errors, "sourceWork", &self.source_work);
        require_non_blank(&mut errors, "composer", &self.composer);
        errors
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(OfficialSong {
            id: row.get("id")?,
            name: row.get("name")?,
            source_work: row.get("source_work")?,
            composer: row.get("composer")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn column_values(&self) -> Vec<Value> {
        vec![
            text(&self.name),
            text(&self.source_work),
            opt_text(&self.composer),
        ]
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey {
            columns: &["source_work", "name"],
            values: vec![text(&self.source_work), text(&self.name)],
            description: format!("name '{}' in '{}'", self.name, self.source_work),
        }]
    }
}

impl CatalogEntity for Release {
    type Draft = ReleaseDraft;
    type Patch = ReleasePatch;

    const KIND: EntityKind = EntityKind::Release;
    const COLUMNS: &'static [&'static str] = &[
        "title",
        "circle_id",
        "event_id",
        "release_date",
        "catalog_number",
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> &VersionToken {
        &self.created_at
    }

    fn version(&self) -> &VersionToken {
        &self.updated_at
    }

    fn set_version(&mut self, version: VersionToken) {
        self.updated_at = version;
    }

    fn draft_id(draft: &ReleaseDraft) -> Option<&str> {
        draft.id.as_deref()
    }

    fn from_draft(id: String, draft: ReleaseDraft, version: VersionToken) -> Self {
        Release {
            id,
            title: draft.title,
            circle_id: draft.circle_id,
            event_id: draft.event_id,
            release_date: draft.release_date,
            catalog_number: draft.catalog_number,
            created_at: version,
            updated_at: version,
        }
    }

    fn apply_patch(&mut self, patch: ReleasePatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(circle_id) = patch.circle_id {
            self.circle_id = circle_id;
        }
        if let Some(event_id) = patch.event_id {
            self.event_id = event_id;
        }
        if let Some(release_date) = patch.release_date {
            self.release_date = release_date;
        }
        if let Some(catalog_number) = patch.catalog_number {
            self.catalog_number = catalog_number;
        }
    }

    fn to_patch(&self) -> ReleasePatch {
        ReleasePatch {
            title: Some(self.title.clone()),
            circle_id: Some(self.circle_id.clone()),
            event_id: Some(self.event_id.clone()),
            release_date: Some(self.release_date.clone()),
            catalog_number: Some(self.catalog_number.clone()),
        }
    }

    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = vec![];
        require_non_empty(&mut errors, "title", &self.title);
        require_date(&mut errors, "releaseDate", &self.release_date);
        require_non_blank(&mut errors, "catalogNumber", &self.catalog_number);
        errors
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Release {
            id: row.get("id")?,
            title: row.get("title")?,
            circle_id: row.get("circle_id")?,
            event_id: row.get("event_id")?,
            release_date: row.get("release_date")?,
            catalog_number: row.get("catalog_number")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn column_values(&self) -> Vec<Value> {
        vec![
            text(&self.title),
            opt_text(&self.circle_id),
            opt_text(&self.event_id),
            opt_text(&self.release_date),
            opt_text(&self.catalog_number),
        ]
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        match &self.catalog_number {
            Some(catalog_number) => vec![UniqueKey {
                columns: &["catalog_number"],
                values: vec![text(catalog_number)],
                description: format!("catalog number '{}'", catalog_number),
            }],
            None => vec![],
        }
    }

    fn references(&self) -> Vec<Reference> {
        let mut references = vec![];
        if let Some(circle_id) = &self.circle_id {
            references.push(Reference {
                field: "circleId",
                kind: EntityKind::Circle,
                id: circle_id.clone(),
            });
        }
        if let Some(event_id) = &self.event_id {
            references.push(Reference {
                field: "eventId",
                kind: EntityKind::Event,
                id: event_id.clone(),
            });
        }
        references
    }
}

impl CatalogEntity for Track {
    type Draft = TrackDraft;
    type Patch = TrackPatch;

    const KIND: EntityKind = EntityKind::Track;
    const COLUMNS: &'static [&'static str] = &[
        "release_id",
        "disc_number",
        "track_number",
        "title",
        "duration_ms",
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> &VersionToken {
        &self.created_at
    }

    fn version(&self) -> &VersionToken {
        &self.updated_at
    }

    fn set_version(&mut self, version: VersionToken) {
        self.updated_at = version;
    }

    fn draft_id(draft: &TrackDraft) -> Option<&str> {
        draft.id.as_deref()
    }

    fn from_draft(id: String, draft: TrackDraft, version: VersionToken) -> Self {
        Track {
            id,
            release_id: draft.release_id,
            disc_number: draft.disc_number,
            track_number: draft.track_number,
            title: draft.title,
            duration_ms: draft.duration_ms,
            credits: draft.credits,
            created_at: version,
            updated_at: version,
        }
    }

    fn apply_patch(&mut self, patch: TrackPatch) {
        if let Some(release_id) = patch.release_id {
            self.release_id = release_id;
        }
        if let Some(disc_number) = patch.disc_number {
            self.disc_number = disc_number;
        }
        if let Some(track_number) = patch.track_number {
            self.track_number = track_number;
        }
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(duration_ms) = patch.duration_ms {
            self.duration_ms = duration_ms;
        }
        if let Some(credits) = patch.credits {
            self.credits = credits;
        }
    }

    fn to_patch(&self) -> TrackPatch {
        TrackPatch {
            release_id: Some(self.release_id.clone()),
            disc_number: Some(self.disc_number),
            track_number: Some(self.track_number),
            title: Some(self.title.clone()),
            duration_ms: Some(self.duration_ms),
            credits: Some(self.credits.clone()),
        }
    }

    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = vec![];
        require_non_empty(&mut errors, "releaseId", &self.release_id);
        require_positive(&mut errors, "discNumber", self.disc_number);
        require_positive(&mut errors, "trackNumber", self.track_number);
        require_non_empty(&mut errors, "title", &self.title);
        require_non_negative(&mut errors, "durationMs", self.duration_ms);
        for credit in &self.credits {
            require_non_empty(&mut errors, "credits", &credit.artist_id);
        }
        errors
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Track {
            id: row.get("id")?,
            release_id: row.get("release_id")?,
            disc_number: row.get("disc_number")?,
            track_number: row.get("track_number")?,
            title: row.get("title")?,
            duration_ms: row.get("duration_ms")?,
            credits: vec![],
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn column_values(&self) -> Vec<Value> {
        vec![
            text(&self.release_id),
            Value::Integer(self.disc_number),
            Value::Integer(self.track_number),
            text(&self.title),
            opt_int(self.duration_ms),
        ]
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey {
            columns: &["release_id", "disc_number", "track_number"],
            values: vec![
                text(&self.release_id),
                Value::Integer(self.disc_number),
                Value::Integer(self.track_number),
            ],
            description: format!(
                "disc {} track {} of release '{}'",
                self.disc_number, self.track_number, self.release_id
            ),
        }]
    }

    fn references(&self) -> Vec<Reference> {
        let mut references = vec![Reference {
            field: "releaseId",
            kind: EntityKind::Release,
            id: self.release_id.clone(),
        }];
        for credit in &self.credits {
            references.push(Reference {
                field: "credits",
                kind: EntityKind::Artist,
                id: credit.artist_id.clone(),
            });
        }
        references
    }

    fn load_children(&mut self, conn: &Connection) -> rusqlite::Result<()> {
        let mut stmt = conn.prepare_cached(
            "SELECT artist_id, role FROM track_credits WHERE track_id = ?1 ORDER BY position",
        )?;
        self.credits = stmt
            .query_map(params![self.id], |r| {
                Ok(Credit {
                    artist_id: r.get(0)?,
                    role: CreditRole::from_db_str(&r.get::<_, String>(1)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(())
    }

    fn store_children(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "DELETE FROM track_credits WHERE track_id = ?1",
            params![self.id],
        )?;
        let mut stmt = conn.prepare_cached(
            "INSERT INTO track_credits (track_id, position, artist_id, role) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (position, credit) in self.credits.iter().enumerate() {
            stmt.execute(params![
                self.id,
                position as i64,
                credit.artist_id,
                credit.role.to_db_str()
            ])?;
        }
        Ok(())
    }

    fn tsv_extra_headers() -> &'static [&'static str] {
        &["credits"]
    }

    /// Credits flattened as `artistId:role` pairs separated by commas.
    fn tsv_extra_values(&self) -> Vec<String> {
        let credits: Vec<String> = self
            .credits
            .iter()
            .map(|c| format!("{}:{}", c.artist_id, c.role.to_db_str()))
            .collect();
        vec![credits.join(",")]
    }
}
