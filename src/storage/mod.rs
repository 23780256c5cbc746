//! Object storage subsystem.
//!
//! # Data Flow
//! ```text
//! media handlers (http/media.rs)
//!     → ObjectStore trait (list / presign / put / delete by key)
//!     → adapter (memory.rs)
//! ```
//!
//! # Design Decisions
//! - Handlers depend on the capability, never on a vendor SDK
//! - Keys are `<user>/<name>`; listing is by `<user>/` prefix
//! - Concurrent puts to one key: last writer wins
//! - `list` returns every match; adapters drain pagination themselves
//! - `delete` of a missing key succeeds, as in S3

pub mod memory;

use async_trait::async_trait;
use axum::body::Bytes;
use std::time::Duration;

pub use memory::InMemoryObjectStore;

/// Extensions listed by `GET /images`.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "tiff", "bmp"];

/// Extensions listed by `GET /tracks`.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "fb2", "midi"];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid object key '{0}'")]
    InvalidKey(String),

    #[error("object '{0}' not found")]
    NotFound(String),

    #[error("object store failure: {0}")]
    Backend(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Every key starting with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// A time-limited download URL for `key`.
    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, StoreError>;

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Join a user and object name into a key, rejecting path games.
pub fn object_key(user: &str, name: &str) -> Result<String, StoreError> {
    let valid = |part: &str| !part.is_empty() && part != "." && part != ".." && !part.contains('/');
    if valid(user) && valid(name) {
        Ok(format!("{user}/{name}"))
    } else {
        Err(StoreError::InvalidKey(format!("{user}/{name}")))
    }
}

/// True if the key's final extension is one of `extensions`.
pub fn has_extension(key: &str, extensions: &[&str]) -> bool {
    key.rsplit_once('.')
        .map(|(_, ext)| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}
