//! Public browsing routes. No session needed.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::error::{blocking, ApiError};
use super::state::{GuardedCatalogStore, ServerState};
use crate::catalog_store::{
    Artist, CatalogEntity, Circle, Event, ListQuery, OfficialSong, Page, Platform, Release, Track,
    ValidationErrors,
};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl TryFrom<ListParams> for ListQuery {
    type Error = ApiError;

    fn try_from(params: ListParams) -> Result<Self, ApiError> {
        ListQuery::new(params.q, params.limit, params.offset)
            .map_err(|err| ApiError::Validation(ValidationErrors::single(err)))
    }
}

async fn list_entities<E: CatalogEntity>(
    State(store): State<GuardedCatalogStore>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Page<E>>, ApiError> {
    let Query(params) = params?;
    let query = ListQuery::try_from(params)?;
    Ok(Json(blocking(move || store.list::<E>(&query)).await?))
}

async fn get_entity<E: CatalogEntity>(
    State(store): State<GuardedCatalogStore>,
    Path(id): Path<String>,
) -> Result<Json<E>, ApiError> {
    let lookup_id = id.clone();
    match blocking(move || store.get::<E>(&lookup_id)).await? {
        Some(entity) => Ok(Json(entity)),
        None => Err(ApiError::NotFound(format!("{} '{}' not found", E::KIND, id))),
    }
}

async fn get_release_tracks(
    State(store): State<GuardedCatalogStore>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Track>>, ApiError> {
    Ok(Json(
        blocking(move || store.list_release_tracks(&id)).await?,
    ))
}

fn entity_routes<E: CatalogEntity>(router: Router<ServerState>) -> Router<ServerState> {
    let path = E::KIND.path();
    router
        .route(&format!("/{}", path), get(list_entities::<E>))
        .route(&format!("/{}/{{id}}", path), get(get_entity::<E>))
}

pub fn catalog_routes() -> Router<ServerState> {
    let mut router = Router::new();
    router = entity_routes::<Artist>(router);
    router = entity_routes::<Circle>(router);
    router = entity_routes::<Event>(router);
    router = entity_routes::<Platform>(router);
    router = entity_routes::<OfficialSong>(router);
    router = entity_routes::<Release>(router);
    router = entity_routes::<Track>(router);
    router.route("/releases/{id}/tracks", get(get_release_tracks))
}
