//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own catalog and user database.

use super::constants::*;
use super::fixtures::{create_test_catalog, create_test_users};
use doujin_catalog_server::catalog_store::SqliteCatalogStore;
use doujin_catalog_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use doujin_catalog_server::user::UserManager;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with isolated databases
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    #[allow(dead_code)]
    pub port: u16,

    /// Catalog store shared with the server, for direct access in tests
    #[allow(dead_code)]
    pub catalog_store: Arc<SqliteCatalogStore>,

    /// User manager shared with the server
    #[allow(dead_code)]
    pub user_manager: Arc<UserManager>,

    // Private fields - keep resources alive until drop
    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port, accepting admin updates
    /// without a version token.
    pub async fn spawn() -> Self {
        Self::spawn_with(false).await
    }

    /// Spawns a test server that rejects admin updates missing `updatedAt`.
    #[allow(dead_code)]
    pub async fn spawn_strict() -> Self {
        Self::spawn_with(true).await
    }

    async fn spawn_with(require_version_token: bool) -> Self {
        let temp_db_dir = TempDir::new().expect("Failed to create temp dir");

        let catalog_store = Arc::new(
            create_test_catalog(&temp_db_dir.path().join("catalog.db"))
                .expect("Failed to create test catalog"),
        );
        let user_manager = Arc::new(
            create_test_users(&temp_db_dir.path().join("user.db"))
                .expect("Failed to create test users"),
        );

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            content_cache_age_sec: 0, // Disable caching in tests
            frontend_dir_path: None,
            require_version_token,
        };

        let app = make_app(config, catalog_store.clone(), user_manager.clone())
            .await
            .expect("Failed to build app");

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            catalog_store,
            user_manager,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home route
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
