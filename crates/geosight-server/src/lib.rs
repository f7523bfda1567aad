//! GeoSight Server
//!
//! HTTP front end for the terrain classifier. Loads one model at startup
//! and serves classification requests against it.

pub mod config;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::{ConfigOverrides, ListenerConfig, ServerConfig};
pub use routes::{create_router, AppError, ClassifyRequest};
pub use state::AppState;
pub use telemetry::{init_metrics, init_tracing, LogFormat};
