//! HTTP client for the admin catalog API.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::updater::{CatalogUpdater, FieldMessage, SubmitFailure};
use crate::catalog_store::{CatalogEntity, UpdateOutcome, VersionToken};

#[derive(Serialize)]
struct UpdateRequest<'a, P: Serialize> {
    #[serde(rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    updated_at: Option<String>,
    #[serde(flatten)]
    changes: &'a P,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    user_handle: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct ErrorBody<E> {
    #[serde(default)]
    error: String,
    #[serde(default)]
    details: Vec<FieldMessage>,
    #[serde(default = "Option::default")]
    current: Option<E>,
}

/// Talks to a running catalog server on behalf of an editor.
pub struct HttpCatalogClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpCatalogClient {
    pub fn new(base_url: &str, timeout_sec: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Uses an existing session token instead of logging in.
    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    pub async fn login(&mut self, user_handle: &str, password: &str) -> Result<()> {
        let url = format!("{}/v1/auth/login", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&LoginRequest {
                user_handle,
                password,
            })
            .send()
            .await
            .context("Failed to connect to catalog server")?;

        if response.status() != StatusCode::CREATED {
            bail!("Login failed with status: {}", response.status());
        }

        let body: LoginResponse = response
            .json()
            .await
            .context("Failed to parse login response")?;
        self.token = Some(body.token);
        Ok(())
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header("Authorization", token),
            None => request,
        }
    }

    /// Reads the current stored record, to start an edit session from.
    pub async fn fetch<E: CatalogEntity>(&self, id: &str) -> Result<E, SubmitFailure> {
        let url = format!("{}/v1/admin/{}/{}", self.base_url, E::KIND.path(), id);
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|err| SubmitFailure::Transport(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::OK {
            return response
                .json()
                .await
                .map_err(|err| SubmitFailure::Internal(err.to_string()));
        }
        let body = read_error_body::<E>(response).await;
        Err(failure_from_status(status, body))
    }
}

async fn read_error_body<E: CatalogEntity>(response: reqwest::Response) -> ErrorBody<E> {
    match response.json::<ErrorBody<E>>().await {
        Ok(body) => body,
        Err(err) => {
            debug!("Unreadable error body: {}", err);
            ErrorBody {
                error: String::new(),
                details: vec![],
                current: None,
            }
        }
    }
}

fn failure_from_status<E>(status: StatusCode, body: ErrorBody<E>) -> SubmitFailure {
    match status {
        StatusCode::NOT_FOUND => SubmitFailure::NotFound(body.error),
        StatusCode::BAD_REQUEST if body.details.is_empty() => {
            SubmitFailure::BadRequest(body.error)
        }
        StatusCode::BAD_REQUEST => SubmitFailure::Validation(body.details),
        StatusCode::CONFLICT => SubmitFailure::Uniqueness(body.error),
        StatusCode::UNAUTHORIZED => SubmitFailure::Unauthenticated,
        StatusCode::FORBIDDEN => SubmitFailure::Unauthorized,
        other => SubmitFailure::Internal(format!("status {}: {}", other, body.error)),
    }
}

#[async_trait]
impl<E: CatalogEntity> CatalogUpdater<E> for HttpCatalogClient {
    async fn submit_update(
        &self,
        id: &str,
        patch: E::Patch,
        expected: Option<VersionToken>,
    ) -> Result<UpdateOutcome<E>, SubmitFailure> {
        let url = format!("{}/v1/admin/{}/{}", self.base_url, E::KIND.path(), id);
        let request = UpdateRequest {
            updated_at: expected.map(|version| version.as_string()),
            changes: &patch,
        };
        let response = self
            .authorized(self.client.put(&url))
            .json(&request)
            .send()
            .await
            .map_err(|err| SubmitFailure::Transport(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::OK {
            let updated: E = response
                .json()
                .await
                .map_err(|err| SubmitFailure::Internal(err.to_string()))?;
            return Ok(UpdateOutcome::Updated(updated));
        }

        let mut body = read_error_body::<E>(response).await;
        if status == StatusCode::CONFLICT {
            if let Some(current) = body.current.take() {
                return Ok(UpdateOutcome::Conflict(current));
            }
        }
        Err(failure_from_status(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::{Artist, ArtistPatch};

    #[test]
    fn update_request_flattens_changes() {
        let patch = ArtistPatch {
            name: Some("Bar".to_string()),
            sort_name: None,
            description: Some(None),
        };
        let request = UpdateRequest {
            updated_at: Some("2024-01-01T00:00:00.000Z".to_string()),
            changes: &patch,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "updatedAt": "2024-01-01T00:00:00.000Z",
                "name": "Bar",
                "description": null
            })
        );
    }

    #[test]
    fn statuses_map_to_failures() {
        let body = || ErrorBody::<Artist> {
            error: "nope".to_string(),
            details: vec![FieldMessage {
                field: "name".to_string(),
                message: "name must not be empty".to_string(),
            }],
            current: None,
        };
        assert_eq!(
            failure_from_status(StatusCode::NOT_FOUND, body()),
            SubmitFailure::NotFound("nope".to_string())
        );
        assert!(matches!(
            failure_from_status(StatusCode::BAD_REQUEST, body()),
            SubmitFailure::Validation(fields) if fields.len() == 1
        ));
        assert_eq!(
            failure_from_status(StatusCode::CONFLICT, body()),
            SubmitFailure::Uniqueness("nope".to_string())
        );
        assert_eq!(
            failure_from_status(StatusCode::UNAUTHORIZED, body()),
            SubmitFailure::Unauthenticated
        );
        assert_eq!(
            failure_from_status(StatusCode::FORBIDDEN, body()),
            SubmitFailure::Unauthorized
        );
        assert!(matches!(
            failure_from_status(StatusCode::INTERNAL_SERVER_ERROR, body()),
            SubmitFailure::Internal(_)
        ));
    }

    #[test]
    fn bad_request_without_details_keeps_the_message() {
        let body: ErrorBody<Artist> = serde_json::from_str(
            r#"{"error": "Failed to deserialize the JSON body: discNumber: invalid type"}"#,
        )
        .unwrap();
        let failure = failure_from_status(StatusCode::BAD_REQUEST, body);
        assert_eq!(
            failure,
            SubmitFailure::BadRequest(
                "Failed to deserialize the JSON body: discNumber: invalid type".to_string()
            )
        );
        assert!(failure.to_string().contains("discNumber: invalid type"));
    }

    #[test]
    fn validation_failure_lists_field_messages() {
        let failure = SubmitFailure::Validation(vec![FieldMessage {
            field: "name".to_string(),
            message: "Field 'name' is required but was empty".to_string(),
        }]);
        assert_eq!(
            failure.to_string(),
            "Validation failed: Field 'name' is required but was empty"
        );
    }

    #[test]
    fn conflict_body_carries_current() {
        let body: ErrorBody<Artist> = serde_json::from_str(
            r#"{
                "error": "modified",
                "current": {
                    "id": "ar_001",
                    "name": "Bar",
                    "sortName": null,
                    "description": null,
                    "createdAt": "2024-01-01T00:00:00.000Z",
                    "updatedAt": "2024-01-01T00:00:05.000Z"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(body.current.unwrap().name, "Bar");
    }
}
