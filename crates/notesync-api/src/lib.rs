//! # notesync-api
//!
//! The surface the HTTP router calls into: environment configuration,
//! tracing setup, the caller-identity seam, and one operation per route
//! returning a status-tagged result.
//!
//! ```rust,ignore
//! use notesync_api::{init_tracing, routes, AppState, ServerConfig, StaticCaller};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     let _guard = init_tracing(&config.telemetry)?;
//!     let state = AppState::from_config(config).await?;
//!     let dbs = routes::list_databases(&state, &StaticCaller::user("u1")).await?;
//!     assert_eq!(dbs.status, 200);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::ServerConfig;
pub use error::{status_for, ApiError, ApiResponse, ApiResult};
pub use identity::{require_caller, CallerIdentity, StaticCaller};
pub use state::AppState;
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
