//! KV trait and scoping
//!
//! Explicit operations, bounded sizes.

use async_trait::async_trait;
use bytes::Bytes;
use docket_core::{ActorId, ContextKV, Error, Result, ACTOR_KV_KEY_SIZE_BYTES_MAX};
use std::sync::Arc;

/// Per-actor KV store trait
#[async_trait]
pub trait ActorKV: Send + Sync {
    /// Get a value by key
    async fn get(&self, actor_id: &ActorId, key: &[u8]) -> Result<Option<Bytes>>;

    /// Set a key-value pair
    async fn set(&self, actor_id: &ActorId, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key
    async fn delete(&self, actor_id: &ActorId, key: &[u8]) -> Result<()>;

    /// Check if a key exists
    async fn exists(&self, actor_id: &ActorId, key: &[u8]) -> Result<bool> {
        Ok(self.get(actor_id, key).await?.is_some())
    }

    /// List keys with a prefix
    async fn list_keys(&self, actor_id: &ActorId, prefix: &[u8]) -> Result<Vec<Vec<u8>>>;
}

/// KV store bound to a single actor
///
/// Implements [`ContextKV`] so an actor context can read and write its own
/// keyspace without seeing the actor id plumbing.
pub struct ScopedKV {
    actor_id: ActorId,
    kv: Arc<dyn ActorKV>,
}

impl ScopedKV {
    /// Bind a KV store to an actor
    pub fn new(actor_id: ActorId, kv: Arc<dyn ActorKV>) -> Self {
        Self { actor_id, kv }
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::StorageWriteFailed {
                key: String::new(),
                reason: "key must not be empty".into(),
            });
        }
        if key.len() > ACTOR_KV_KEY_SIZE_BYTES_MAX {
            return Err(Error::StorageWriteFailed {
                key: String::from_utf8_lossy(key).into_owned(),
                reason: format!(
                    "key length {} exceeds limit {}",
                    key.len(),
                    ACTOR_KV_KEY_SIZE_BYTES_MAX
                ),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ContextKV for ScopedKV {
    async fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        self.check_key(key)?;
        self.kv.get(&self.actor_id, key).await
    }

    async fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key(key)?;
        self.kv.set(&self.actor_id, key, value).await
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        self.check_key(key)?;
        self.kv.delete(&self.actor_id, key).await
    }
}
