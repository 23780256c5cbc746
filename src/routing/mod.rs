//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     table.rs (MlRoute descriptors)
//!     + DownstreamConfig / TimeoutConfig
//!     → router.rs builds Transport per family, DispatchGate per route
//!     → Freeze as immutable MlRouter
//!
//! Per request:
//!     handler knows its MlRoute
//!     → MlRouter::gate / MlRouter::target
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Families share a connection pool; routes never reconfigure it

pub mod router;
pub mod table;

pub use router::{MlRouter, RoutingError};
pub use table::{Extraction, Family, MlRoute, TimeoutClass, OUTBOUND_FILE_FIELD};
