//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID assigned / kept)
//!     → session guard (auth::session) on protected routes
//!     → ml.rs | media.rs | account.rs handlers
//!     → response.rs (JSON envelopes, binary payloads)
//!     → Send to client
//! ```

pub mod account;
pub mod media;
pub mod ml;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{build_router, AppState, HttpServer};
