//! Outbound request proxy subsystem.
//!
//! # Data Flow
//! ```text
//! handler extracts parameters
//!     → OutboundSpec (types.rs)
//!     → gate.rs spawns the pipeline and starts the deadline
//!         → encoder.rs builds body + content type
//!         → transport.rs sends on the pooled client
//!         → pipeline.rs reads the full body
//!         → decoder.rs (optional) decodes it
//!     → gate.rs receives exactly one ProxyOutcome, or times out
//!     → handler shapes the HTTP response
//! ```
//!
//! # Design Decisions
//! - The serving task only waits on the outcome channel and a timer
//! - A timed-out or abandoned pipeline is cancelled, not left running
//! - Transport is the only shared mutable resource and synchronizes itself

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod gate;
pub mod pipeline;
pub mod transport;
pub mod types;

pub use decoder::{Decoder, TimeSeriesResult};
pub use error::ProxyError;
pub use gate::DispatchGate;
pub use pipeline::{CancelSignal, Pipeline};
pub use transport::{HyperTransport, Transport};
pub use types::{CancelReason, ContentKind, FilePart, OutboundSpec, Payload, ProxyOutcome};
