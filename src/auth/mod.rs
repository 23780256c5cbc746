//! Session and identity subsystem.
//!
//! # Data Flow
//! ```text
//! /login, /signin
//!     → store.rs issues a login state
//!     → provider.rs builds the authorize URL
//! /callback
//!     → store.rs consumes the state
//!     → provider.rs exchanges the code
//!     → store.rs records the session; cookies set
//! guarded routes
//!     → session.rs reads the access cookie → store.rs lookup
//! ```
//!
//! # Design Decisions
//! - One TokenStore per process, constructed at startup and injected
//! - Tokens expire; a sweeper task purges them until shutdown

pub mod provider;
pub mod session;
pub mod store;

pub use provider::{AuthError, Claims, HttpIdentityProvider, IdentityProvider, TokenSet};
pub use session::{cookie_value, require_session, set_cookie, SessionGuard};
pub use store::{run_sweeper, LoginStates, TokenRecord, TokenStore};
