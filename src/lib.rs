//! ML gateway library: session-aware front door for the ML microservices.

pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod routing;
pub mod storage;

pub use config::schema::GatewayConfig;
pub use http::{build_router, AppState, HttpServer};
pub use lifecycle::Shutdown;
