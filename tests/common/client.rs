//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per catalog-server endpoint.
//! When API routes or request formats change, update only this file.

#![allow(dead_code)]

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP test client with cookie-based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    /// Creates a new unauthenticated client
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true) // Automatically handle session cookies
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    async fn logged_in(base_url: String, handle: &str, password: &str) -> Self {
        let client = Self::new(base_url);

        let response = client.login(handle, password).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Authentication of {} failed: {:?}",
            handle,
            response.text().await
        );

        client
    }

    /// Creates a client logged in as an editor
    pub async fn authenticated_editor(base_url: String) -> Self {
        Self::logged_in(base_url, EDITOR_USER, EDITOR_PASS).await
    }

    /// Creates a client logged in as the second editor
    pub async fn authenticated_editor_2(base_url: String) -> Self {
        Self::logged_in(base_url, EDITOR_2_USER, EDITOR_2_PASS).await
    }

    /// Creates a client logged in as a read-only user
    pub async fn authenticated_viewer(base_url: String) -> Self {
        Self::logged_in(base_url, VIEWER_USER, VIEWER_PASS).await
    }

    /// Creates a client logged in as an admin
    pub async fn authenticated_admin(base_url: String) -> Self {
        Self::logged_in(base_url, ADMIN_USER, ADMIN_PASS).await
    }

    // ========================================================================
    // Authentication Endpoints
    // ========================================================================

    /// POST /v1/auth/login
    pub async fn login(&self, handle: &str, password: &str) -> Response {
        self.client
            .post(format!("{}/v1/auth/login", self.base_url))
            .json(&json!({
                "userHandle": handle,
                "password": password,
            }))
            .send()
            .await
            .expect("Login request failed")
    }

    /// GET /v1/auth/logout
    pub async fn logout(&self) -> Response {
        self.client
            .get(format!("{}/v1/auth/logout", self.base_url))
            .send()
            .await
            .expect("Logout request failed")
    }

    /// GET /v1/auth/session
    pub async fn get_session(&self) -> Response {
        self.client
            .get(format!("{}/v1/auth/session", self.base_url))
            .send()
            .await
            .expect("Session request failed")
    }

    /// GET /
    pub async fn get_home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    // ========================================================================
    // Admin Endpoints
    // ========================================================================

    /// GET /v1/admin/{kind}/{id}
    pub async fn get_entity(&self, kind: &str, id: &str) -> Response {
        self.client
            .get(format!("{}/v1/admin/{}/{}", self.base_url, kind, id))
            .send()
            .await
            .expect("Get entity request failed")
    }

    /// GET /v1/admin/{kind}/{id}, decoded, asserting it exists
    pub async fn get_entity_json(&self, kind: &str, id: &str) -> Value {
        let response = self.get_entity(kind, id).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.expect("Entity body is not JSON")
    }

    /// POST /v1/admin/{kind}
    pub async fn create_entity(&self, kind: &str, body: Value) -> Response {
        self.client
            .post(format!("{}/v1/admin/{}", self.base_url, kind))
            .json(&body)
            .send()
            .await
            .expect("Create entity request failed")
    }

    /// PUT /v1/admin/{kind}/{id}
    pub async fn update_entity(&self, kind: &str, id: &str, body: Value) -> Response {
        self.client
            .put(format!("{}/v1/admin/{}/{}", self.base_url, kind, id))
            .json(&body)
            .send()
            .await
            .expect("Update entity request failed")
    }

    /// PUT /v1/admin/{kind}/{id} with a raw, possibly malformed body
    pub async fn update_entity_raw(&self, kind: &str, id: &str, body: &str) -> Response {
        self.client
            .put(format!("{}/v1/admin/{}/{}", self.base_url, kind, id))
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("Update entity request failed")
    }

    /// DELETE /v1/admin/{kind}/{id}
    pub async fn delete_entity(&self, kind: &str, id: &str) -> Response {
        self.client
            .delete(format!("{}/v1/admin/{}/{}", self.base_url, kind, id))
            .send()
            .await
            .expect("Delete entity request failed")
    }

    /// GET /v1/admin/export/{kind}?format={format}
    pub async fn export(&self, kind: &str, format: &str) -> Response {
        self.client
            .get(format!(
                "{}/v1/admin/export/{}?format={}",
                self.base_url, kind, format
            ))
            .send()
            .await
            .expect("Export request failed")
    }

    // ========================================================================
    // Public Catalog Endpoints
    // ========================================================================

    /// GET /v1/catalog/{kind}?{query}
    pub async fn list_public(&self, kind: &str, query: &str) -> Response {
        self.client
            .get(format!("{}/v1/catalog/{}?{}", self.base_url, kind, query))
            .send()
            .await
            .expect("List request failed")
    }

    /// GET /v1/catalog/{kind}/{id}
    pub async fn get_public(&self, kind: &str, id: &str) -> Response {
        self.client
            .get(format!("{}/v1/catalog/{}/{}", self.base_url, kind, id))
            .send()
            .await
            .expect("Get request failed")
    }

    /// GET /v1/catalog/releases/{id}/tracks
    pub async fn get_release_tracks(&self, release_id: &str) -> Response {
        self.client
            .get(format!(
                "{}/v1/catalog/releases/{}/tracks",
                self.base_url, release_id
            ))
            .send()
            .await
            .expect("Release tracks request failed")
    }
}
