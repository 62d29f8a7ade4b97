use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use doujin_catalog_server::catalog_store::SqliteCatalogStore;
use doujin_catalog_server::config::{AppConfig, CliConfig, FileConfig};
use doujin_catalog_server::server::{run_server, RequestsLoggingLevel};
use doujin_catalog_server::user::{SqliteUserStore, UserManager};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Existing directory holding `catalog.db` and `user.db`.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to a TOML config file. Its values override the CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// The maximum age of public catalog responses in client caches, in seconds.
    #[clap(long, default_value_t = 60)]
    pub content_cache_age_sec: usize,

    /// Path to the back-office frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Number of read-only connections used for browsing.
    #[clap(long)]
    pub read_pool_size: Option<usize>,

    /// Reject admin updates that carry no `updatedAt` version token.
    #[clap(long)]
    pub require_version_token: bool,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_dir: self.db_dir.clone(),
            port: self.port,
            logging_level: self.logging_level.clone(),
            content_cache_age_sec: self.content_cache_age_sec,
            frontend_dir_path: self.frontend_dir_path.clone(),
            read_pool_size: self.read_pool_size,
            require_version_token: self.require_version_token,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!(
        "Opening SQLite catalog database at {:?}...",
        config.catalog_db_path()
    );
    let catalog_store = Arc::new(SqliteCatalogStore::new(
        config.catalog_db_path(),
        config.catalog.read_pool_size,
    )?);

    info!("Opening user database at {:?}...", config.user_db_path());
    let user_store = SqliteUserStore::new(config.user_db_path())?;
    let user_manager = Arc::new(UserManager::new(Arc::new(user_store)));

    if config.catalog.require_version_token {
        info!("Admin updates must carry a version token");
    }

    info!("Ready to serve at port {}!", config.port);
    run_server(config.server_config(), catalog_store, user_manager).await
}
