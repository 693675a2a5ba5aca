//! In-memory KV storage
//!
//! For testing and local runs.

use crate::kv::ActorKV;
use async_trait::async_trait;
use bytes::Bytes;
use docket_core::{ActorId, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Per-actor KV data: key -> value
type ActorData = HashMap<Vec<u8>, Vec<u8>>;

/// Storage data: actor_id -> actor data
type StorageData = HashMap<String, ActorData>;

/// In-memory KV store
#[derive(Clone, Default)]
pub struct MemoryKV {
    data: Arc<RwLock<StorageData>>,
}

impl MemoryKV {
    /// Create a new in-memory KV store
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn actor_key(actor_id: &ActorId) -> String {
        actor_id.qualified_name()
    }
}

#[async_trait]
impl ActorKV for MemoryKV {
    async fn get(&self, actor_id: &ActorId, key: &[u8]) -> Result<Option<Bytes>> {
        let data = self.data.read().await;
        Ok(data
            .get(&Self::actor_key(actor_id))
            .and_then(|actor_data| actor_data.get(key))
            .map(|v| Bytes::copy_from_slice(v)))
    }

    async fn set(&self, actor_id: &ActorId, key: &[u8], value: &[u8]) -> Result<()> {
        let mut data = self.data.write().await;
        data.entry(Self::actor_key(actor_id))
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, actor_id: &ActorId, key: &[u8]) -> Result<()> {
        let mut data = self.data.write().await;
        if let Some(actor_data) = data.get_mut(&Self::actor_key(actor_id)) {
            actor_data.remove(key);
        }
        Ok(())
    }

    async fn list_keys(&self, actor_id: &ActorId, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let data = self.data.read().await;
        Ok(data
            .get(&Self::actor_key(actor_id))
            .map(|actor_data| {
                actor_data
                    .keys()
                    .filter(|k| k.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
