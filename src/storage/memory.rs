//! In-process object store.
//!
//! Backs development setups and tests. Presigned URLs point at the configured
//! public base and carry the expiry and a content-disposition hint.

use async_trait::async_trait;
use axum::body::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use url::Url;

use crate::config::StorageConfig;
use crate::storage::{ObjectStore, StoreError};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

#[derive(Clone)]
pub struct InMemoryObjectStore {
    objects: Arc<DashMap<String, StoredObject>>,
    bucket: String,
    public_base: String,
}

impl InMemoryObjectStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            objects: Arc::new(DashMap::new()),
            bucket: config.bucket.clone(),
            public_base: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.get(key).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self
            .objects
            .iter()
            .filter(|r| r.key().starts_with(prefix))
            .map(|r| r.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, StoreError> {
        if !self.objects.contains_key(key) {
            return Err(StoreError::NotFound(key.to_string()));
        }

        let expires = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .saturating_add(ttl)
            .as_secs();

        let mut url = Url::parse(&format!("{}/{}/", self.public_base, self.bucket))
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Backend("public base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(key.split('/'));
        url.query_pairs_mut()
            .append_pair("X-Expires", &expires.to_string())
            .append_pair(
                "response-content-disposition",
                &format!("attachment; filename=\"{key}\""),
            );
        Ok(url.to_string())
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StoreError> {
        self.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.objects.remove(key);
        Ok(())
    }
}
