mod admin_routes;
mod catalog_routes;
pub mod config;
pub mod error;
mod http_layers;
pub mod server;
pub(self) mod session;
pub mod state;

pub use admin_routes::UpdateBody;
pub use config::ServerConfig;
pub use error::ApiError;
pub use http_layers::*;
pub use server::{make_app, run_server};
