use anyhow::{Context, Result};
use std::time::Duration;

use tracing::{debug, info};

use axum_extra::extract::cookie::{Cookie, SameSite};
use tower_http::services::ServeDir;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::admin_routes::admin_routes;
use super::catalog_routes::catalog_routes;
use super::error::ApiError;
use super::session::{Session, COOKIE_SESSION_TOKEN_KEY};
use super::{http_cache, log_requests, state::*, ServerConfig};
use crate::user::auth::AuthTokenValue;
use crate::user::{Permission, UserRole};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct LoginBody {
    pub user_handle: String,
    pub password: String,
}

#[derive(Serialize)]
struct LoginSuccessResponse {
    token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionInfo {
    user_id: usize,
    handle: String,
    role: Option<UserRole>,
    permissions: Vec<Permission>,
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
    };
    Json(stats)
}

async fn login(
    State(user_manager): State<GuardedUserManager>,
    payload: Result<Json<LoginBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload?;
    debug!("login() called for {}", body.user_handle);

    let handle = body.user_handle.clone();
    let token = tokio::task::spawn_blocking(move || user_manager.login(&handle, &body.password))
        .await
        .map_err(|err| ApiError::Internal(err.into()))??;

    let Some(token) = token else {
        info!("Failed login attempt for {}", body.user_handle);
        return Ok(StatusCode::FORBIDDEN.into_response());
    };

    let cookie = Cookie::build((COOKIE_SESSION_TOKEN_KEY, token.value.0.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie.to_string())],
        Json(LoginSuccessResponse {
            token: token.value.0,
        }),
    )
        .into_response())
}

async fn logout(
    State(user_manager): State<GuardedUserManager>,
    session: Session,
) -> Result<Response, ApiError> {
    let user_id = session.user_id;
    tokio::task::spawn_blocking(move || {
        user_manager.delete_auth_token(user_id, &AuthTokenValue(session.token))
    })
    .await
    .map_err(|err| ApiError::Internal(err.into()))??;

    let cookie = Cookie::build((COOKIE_SESSION_TOKEN_KEY, ""))
        .path("/")
        .expires(time::OffsetDateTime::now_utc() - time::Duration::days(1))
        .same_site(SameSite::Lax)
        .build();
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]).into_response())
}

async fn get_session(
    State(user_manager): State<GuardedUserManager>,
    session: Session,
) -> Result<Json<SessionInfo>, ApiError> {
    let user_id = session.user_id;
    let (handle, role) = tokio::task::spawn_blocking(move || -> Result<_> {
        Ok((
            user_manager.get_user_handle(user_id)?,
            user_manager.get_user_role(user_id)?,
        ))
    })
    .await
    .map_err(|err| ApiError::Internal(err.into()))??;

    Ok(Json(SessionInfo {
        user_id,
        handle: handle.unwrap_or_default(),
        role,
        permissions: session.permissions,
    }))
}

pub async fn make_app(
    config: ServerConfig,
    catalog_store: GuardedCatalogStore,
    user_manager: GuardedUserManager,
) -> Result<Router> {
    let state = ServerState::new(config.clone(), catalog_store, user_manager);

    let auth_routes: Router<ServerState> = Router::new()
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/session", get(get_session));

    let catalog_routes = catalog_routes().layer(middleware::from_fn_with_state(
        config.content_cache_age_sec,
        http_cache,
    ));

    let home_router: Router<ServerState> = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new().route("/", get(home)),
    };

    let app: Router = home_router
        .nest("/v1/auth", auth_routes)
        .nest("/v1/admin", admin_routes())
        .nest("/v1/catalog", catalog_routes)
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .with_state(state);

    Ok(app)
}

pub async fn run_server(
    config: ServerConfig,
    catalog_store: GuardedCatalogStore,
    user_manager: GuardedUserManager,
) -> Result<()> {
    let port = config.port;
    let app = make_app(config, catalog_store, user_manager).await?;

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on port {}", port);

    Ok(axum::serve(listener, app).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::SqliteCatalogStore;
    use crate::server::RequestsLoggingLevel;
    use crate::user::{SqliteUserStore, UserManager};
    use axum::{body::Body, http::Request};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct TestApp {
        app: Router,
        user_manager: GuardedUserManager,
        _dir: TempDir,
    }

    impl TestApp {
        async fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let catalog_store =
                Arc::new(SqliteCatalogStore::new(dir.path().join("catalog.db"), 2).unwrap());
            let user_store = SqliteUserStore::new(dir.path().join("user.db")).unwrap();
            let user_manager = Arc::new(UserManager::new(Arc::new(user_store)));
            let config = ServerConfig {
                requests_logging_level: RequestsLoggingLevel::None,
                ..ServerConfig::default()
            };
            let app = make_app(config, catalog_store, user_manager.clone())
                .await
                .unwrap();
            TestApp {
                app,
                user_manager,
                _dir: dir,
            }
        }

        fn token_for(&self, handle: &str, role: UserRole) -> String {
            self.user_manager.add_user(handle, role).unwrap();
            self.user_manager.set_password(handle, "pw").unwrap();
            self.user_manager.login(handle, "pw").unwrap().unwrap().value.0
        }

        async fn send(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header("Authorization", token);
            }
            let request = match body {
                Some(body) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };
            let response = self.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, value)
        }
    }

    #[test]
    fn uptime_format() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0d 00:00:00");
        assert_eq!(format_uptime(Duration::from_secs(90_061)), "1d 01:01:01");
    }

    #[tokio::test]
    async fn home_reports_stats() {
        let test_app = TestApp::new().await;
        let (status, body) = test_app.send("GET", "/", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["uptime"].is_string());
        assert!(body["hash"].is_string());
    }

    #[tokio::test]
    async fn admin_routes_require_session() {
        let test_app = TestApp::new().await;
        let routes = [
            ("GET", "/v1/admin/artists/ar_1"),
            ("PUT", "/v1/admin/artists/ar_1"),
            ("DELETE", "/v1/admin/releases/re_1"),
            ("POST", "/v1/admin/tracks"),
            ("GET", "/v1/admin/export/circles"),
            ("GET", "/v1/auth/logout"),
            ("GET", "/v1/auth/session"),
        ];
        for (method, route) in routes {
            let (status, _) = test_app.send(method, route, None, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, route);
        }

        let (status, _) = test_app
            .send("GET", "/v1/admin/artists/ar_1", Some("not-a-token"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn viewers_cannot_edit() {
        let test_app = TestApp::new().await;
        let token = test_app.token_for("viewer", UserRole::Viewer);
        let (status, _) = test_app
            .send(
                "POST",
                "/v1/admin/artists",
                Some(&token),
                Some(json!({"name": "Foo"})),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn stale_update_gets_conflict_with_current_record() {
        let test_app = TestApp::new().await;
        let token = test_app.token_for("editor", UserRole::Editor);

        let (status, created) = test_app
            .send(
                "POST",
                "/v1/admin/artists",
                Some(&token),
                Some(json!({"id": "ar_001", "name": "Foo"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let v1 = created["updatedAt"].clone();

        let (status, updated) = test_app
            .send(
                "PUT",
                "/v1/admin/artists/ar_001",
                Some(&token),
                Some(json!({"name": "Bar", "updatedAt": v1})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_ne!(updated["updatedAt"], v1);

        let (status, conflict) = test_app
            .send(
                "PUT",
                "/v1/admin/artists/ar_001",
                Some(&token),
                Some(json!({"name": "Baz", "updatedAt": v1})),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(conflict["current"], updated);

        let (_, fresh) = test_app
            .send("GET", "/v1/admin/artists/ar_001", Some(&token), None)
            .await;
        assert_eq!(fresh, updated);
    }

    #[tokio::test]
    async fn bad_version_token_is_a_validation_error() {
        let test_app = TestApp::new().await;
        let token = test_app.token_for("editor", UserRole::Editor);
        test_app
            .send(
                "POST",
                "/v1/admin/circles",
                Some(&token),
                Some(json!({"id": "ci_1", "name": "Circle"})),
            )
            .await;

        let (status, body) = test_app
            .send(
                "PUT",
                "/v1/admin/circles/ci_1",
                Some(&token),
                Some(json!({"name": "Renamed", "updatedAt": "last tuesday"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"][0]["field"], "updatedAt");
    }

    #[tokio::test]
    async fn public_browsing_needs_no_session() {
        let test_app = TestApp::new().await;
        let (status, page) = test_app.send("GET", "/v1/catalog/artists", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 0);
        assert_eq!(page["limit"], 50);

        let (status, _) = test_app
            .send("GET", "/v1/catalog/releases/re_missing", None, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn session_describes_user() {
        let test_app = TestApp::new().await;
        let token = test_app.token_for("admin", UserRole::Admin);
        let (status, body) = test_app
            .send("GET", "/v1/auth/session", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["handle"], "admin");
        assert_eq!(body["role"], "Admin");
        assert_eq!(body["permissions"].as_array().unwrap().len(), 3);
    }
}
