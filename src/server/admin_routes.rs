//! Back-office editing routes.
//!
//! Every catalog kind gets the same create/read/update/delete/export routes,
//! all requiring the `EditCatalog` permission. Updates are version-checked:
//! the body carries the `updatedAt` the client last read, and a stale value
//! is answered with 409 and the record as currently stored.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use super::error::{blocking, ApiError};
use super::session::Session;
use super::state::{GuardedCatalogStore, ServerState};
use crate::catalog_store::{
    export, Artist, CatalogEntity, Circle, Event, ExportFormat, OfficialSong, Platform, Release,
    Track, UpdateOutcome, ValidationError, ValidationErrors, VersionToken,
};
use crate::user::Permission;

/// Body of `PUT /v1/admin/<kind>/<id>`: the changed fields plus the version
/// the edit started from.
#[derive(Debug, Deserialize)]
pub struct UpdateBody<P> {
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub changes: P,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
}

/// Parses the client's expected version. A missing token means the update is
/// unconditional, unless `required` is set.
pub fn expected_version(
    raw: Option<&str>,
    required: bool,
) -> Result<Option<VersionToken>, ApiError> {
    match raw {
        Some(raw) => VersionToken::parse(raw).map(Some).map_err(|_| {
            ApiError::Validation(ValidationErrors::single(
                ValidationError::InvalidVersionToken {
                    value: raw.to_string(),
                },
            ))
        }),
        None if required => Err(ApiError::Validation(ValidationErrors::single(
            ValidationError::MissingVersionToken,
        ))),
        None => Ok(None),
    }
}

async fn create_entity<E: CatalogEntity>(
    session: Session,
    State(store): State<GuardedCatalogStore>,
    payload: Result<Json<E::Draft>, JsonRejection>,
) -> Result<Response, ApiError> {
    session.require(Permission::EditCatalog)?;
    let Json(draft) = payload?;

    let entity = blocking(move || store.create::<E>(draft)).await?;
    info!(
        "User {} created {} {}",
        session.user_id,
        E::KIND,
        entity.id()
    );
    Ok((StatusCode::CREATED, Json(entity)).into_response())
}

async fn get_entity<E: CatalogEntity>(
    session: Session,
    State(store): State<GuardedCatalogStore>,
    Path(id): Path<String>,
) -> Result<Json<E>, ApiError> {
    session.require(Permission::EditCatalog)?;
    let lookup_id = id.clone();
    match blocking(move || store.get::<E>(&lookup_id)).await? {
        Some(entity) => Ok(Json(entity)),
        None => Err(ApiError::NotFound(format!("{} '{}' not found", E::KIND, id))),
    }
}

async fn update_entity<E: CatalogEntity>(
    session: Session,
    State(state): State<ServerState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateBody<E::Patch>>, JsonRejection>,
) -> Result<Json<E>, ApiError> {
    session.require(Permission::EditCatalog)?;
    let Json(body) = payload?;
    let store = state.catalog_store.clone();
    let expected = match expected_version(
        body.updated_at.as_deref(),
        state.config.require_version_token,
    ) {
        Ok(expected) => expected,
        Err(err) => {
            // A missing record outranks a bad token
            let lookup_store = store.clone();
            let lookup_id = id.clone();
            if blocking(move || lookup_store.get::<E>(&lookup_id))
                .await?
                .is_none()
            {
                return Err(ApiError::NotFound(format!("{} '{}' not found", E::KIND, id)));
            }
            return Err(err);
        }
    };

    let changes = body.changes;
    let outcome = blocking(move || store.update::<E>(&id, changes, expected.as_ref())).await?;
    match outcome {
        UpdateOutcome::Updated(entity) => {
            info!(
                "User {} updated {} {} to version {}",
                session.user_id,
                E::KIND,
                entity.id(),
                entity.version()
            );
            Ok(Json(entity))
        }
        UpdateOutcome::Conflict(current) => Err(ApiError::version_conflict(&current)),
    }
}

async fn delete_entity<E: CatalogEntity>(
    session: Session,
    State(store): State<GuardedCatalogStore>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    session.require(Permission::EditCatalog)?;
    let deleted_id = id.clone();
    blocking(move || store.delete::<E>(&deleted_id)).await?;
    info!("User {} deleted {} {}", session.user_id, E::KIND, id);
    Ok(StatusCode::NO_CONTENT)
}

async fn export_entities<E: CatalogEntity>(
    session: Session,
    State(store): State<GuardedCatalogStore>,
    query: Result<Query<ExportQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    session.require(Permission::EditCatalog)?;
    let Query(query) = query?;

    let entities = blocking(move || store.export_all::<E>()).await?;
    let body = export::render(&entities, query.format)?;
    let disposition = format!(
        "attachment; filename=\"{}.{}\"",
        E::KIND.path(),
        query.format.extension()
    );
    Ok((
        [
            (header::CONTENT_TYPE, query.format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

fn entity_routes<E: CatalogEntity>(router: Router<ServerState>) -> Router<ServerState> {
    let path = E::KIND.path();
    router
        .route(&format!("/{}", path), post(create_entity::<E>))
        .route(
            &format!("/{}/{{id}}", path),
            get(get_entity::<E>)
                .put(update_entity::<E>)
                .delete(delete_entity::<E>),
        )
        .route(&format!("/export/{}", path), get(export_entities::<E>))
}

pub fn admin_routes() -> Router<ServerState> {
    let mut router = Router::new();
    router = entity_routes::<Artist>(router);
    router = entity_routes::<Circle>(router);
    router = entity_routes::<Event>(router);
    router = entity_routes::<Platform>(router);
    router = entity_routes::<OfficialSong>(router);
    router = entity_routes::<Release>(router);
    router = entity_routes::<Track>(router);
    router
}
