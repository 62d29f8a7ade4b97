use super::RequestsLoggingLevel;

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    /// Max age of the public browsing responses.
    pub content_cache_age_sec: usize,
    pub frontend_dir_path: Option<String>,
    /// If true, an update without `updatedAt` is rejected instead of being
    /// applied unconditionally.
    pub require_version_token: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3001,
            content_cache_age_sec: 60,
            frontend_dir_path: None,
            require_version_token: false,
        }
    }
}
