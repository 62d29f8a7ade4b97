use super::error::ApiError;
use super::state::ServerState;
use crate::user::auth::AuthTokenValue;
use crate::user::Permission;

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct Session {
    pub user_id: usize,
    pub token: String,
    pub permissions: Vec<Permission>,
}

impl Session {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Fails with 403 unless the session's role grants `permission`.
    pub fn require(&self, permission: Permission) -> Result<(), ApiError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            debug!(
                "User {} lacks permission {:?}",
                self.user_id, permission
            );
            Err(ApiError::Unauthorized)
        }
    }
}

pub const COOKIE_SESSION_TOKEN_KEY: &str = "session_token";
pub const HEADER_SESSION_TOKEN_KEY: &str = "Authorization";

async fn extract_session_token_from_cookies(
    parts: &mut Parts,
    ctx: &ServerState,
) -> Option<String> {
    CookieJar::from_request_parts(parts, ctx)
        .await
        .ok()?
        .get(COOKIE_SESSION_TOKEN_KEY)
        .map(Cookie::value)
        .map(|s| s.to_string())
}

fn extract_session_token_from_headers(parts: &mut Parts) -> Option<String> {
    parts
        .headers
        .get(HEADER_SESSION_TOKEN_KEY)
        .map(|v| v.as_bytes().to_owned())
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .map(|s| s.trim_start_matches("Bearer ").to_string())
}

async fn extract_session_from_request_parts(
    parts: &mut Parts,
    ctx: &ServerState,
) -> Result<Option<Session>, ApiError> {
    let token = match extract_session_token_from_cookies(parts, ctx)
        .await
        .filter(|t| !t.is_empty())
        .or_else(|| extract_session_token_from_headers(parts))
    {
        None => {
            debug!("No token in cookies nor headers.");
            return Ok(None);
        }
        Some(x) => x,
    };

    let user_manager = ctx.user_manager.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<Option<Session>> {
        let auth_token_value = AuthTokenValue(token);
        let Some(auth_token) = user_manager.get_auth_token(&auth_token_value)? else {
            debug!("Auth token not found in database");
            return Ok(None);
        };

        if let Err(e) = user_manager.touch_auth_token(&auth_token_value) {
            warn!("Failed to update auth token last_used timestamp: {}", e);
        }

        let permissions = user_manager.get_user_permissions(auth_token.user_id)?;
        debug!(
            "Resolved permissions for user_id={}: {:?}",
            auth_token.user_id, permissions
        );

        Ok(Some(Session {
            user_id: auth_token.user_id,
            token: auth_token.value.0,
            permissions,
        }))
    })
    .await
    .map_err(|err| ApiError::Internal(err.into()))?
    .map_err(ApiError::Internal)
}

impl FromRequestParts<ServerState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        extract_session_from_request_parts(parts, ctx)
            .await?
            .ok_or(ApiError::Unauthenticated)
    }
}
