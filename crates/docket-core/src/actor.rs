//! Actor abstractions for Docket
//!
//! Each conversation is owned by exactly one actor instance, and that
//! instance is the only writer of its state. The runtime guarantees at most
//! one in-flight invocation per actor, so actor implementations never need
//! internal locking.

use crate::constants::*;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

// =============================================================================
// ActorId
// =============================================================================

/// Unique identifier for an actor
///
/// Actor IDs consist of a namespace and an id, providing logical grouping
/// (e.g. `conversations:conv-01jabc...`) and unique identification.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ActorId {
    namespace: String,
    id: String,
}

impl ActorId {
    /// Create a new ActorId with validation
    ///
    /// # Errors
    /// Returns an error if namespace or id exceeds length limits or
    /// contains invalid characters.
    pub fn new(namespace: impl Into<String>, id: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        let id = id.into();

        debug_assert!(!namespace.is_empty(), "namespace must not be empty");
        debug_assert!(!id.is_empty(), "id must not be empty");

        if namespace.len() > ACTOR_NAMESPACE_LENGTH_BYTES_MAX {
            return Err(Error::InvalidActorId {
                id: format!("{}:{}", namespace, id),
                reason: format!(
                    "namespace length {} exceeds limit {}",
                    namespace.len(),
                    ACTOR_NAMESPACE_LENGTH_BYTES_MAX
                ),
            });
        }

        if id.len() > ACTOR_ID_LENGTH_BYTES_MAX {
            return Err(Error::InvalidActorId {
                id: format!("{}:{}", namespace, id),
                reason: format!(
                    "id length {} exceeds limit {}",
                    id.len(),
                    ACTOR_ID_LENGTH_BYTES_MAX
                ),
            });
        }

        let valid_chars = |s: &str| {
            s.chars()
                .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
        };

        if !valid_chars(&namespace) {
            return Err(Error::InvalidActorId {
                id: format!("{}:{}", namespace, id),
                reason: "namespace contains invalid characters".into(),
            });
        }

        if !valid_chars(&id) {
            return Err(Error::InvalidActorId {
                id: format!("{}:{}", namespace, id),
                reason: "id contains invalid characters".into(),
            });
        }

        Ok(Self { namespace, id })
    }

    /// Get the namespace
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Get the id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the full qualified name (namespace:id)
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.namespace, self.id)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.id)
    }
}

// =============================================================================
// ContextKV
// =============================================================================

/// Per-actor KV access exposed through the actor context
///
/// The store is already scoped to the owning actor; keys are local.
#[async_trait]
pub trait ContextKV: Send + Sync {
    /// Get a value by key
    async fn get(&self, key: &[u8]) -> Result<Option<Bytes>>;

    /// Set a key-value pair
    async fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key
    async fn delete(&self, key: &[u8]) -> Result<()>;
}

/// No-op KV for tests that don't exercise persistence
#[derive(Debug, Clone, Default)]
pub struct NoOpKV;

#[async_trait]
impl ContextKV for NoOpKV {
    async fn get(&self, _key: &[u8]) -> Result<Option<Bytes>> {
        Ok(None)
    }

    async fn set(&self, _key: &[u8], _value: &[u8]) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _key: &[u8]) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Actor Trait
// =============================================================================

/// Actor trait - implement to create actors
///
/// Execution is guaranteed single-threaded per actor instance: the runtime
/// never delivers concurrent invocations, so `invoke` may freely
/// read-then-write `ctx.state` without synchronization.
#[async_trait]
pub trait Actor: Send + Sync + 'static {
    /// The actor's state type
    ///
    /// Must be serializable for persistence and default-constructible
    /// for fresh actor activation.
    type State: Serialize + DeserializeOwned + Default + Send + Sync;

    /// Handle an invocation
    ///
    /// # Arguments
    /// * `ctx` - Actor context providing state access and KV operations
    /// * `operation` - The operation name
    /// * `payload` - The message payload as bytes
    async fn invoke(
        &self,
        ctx: &mut ActorContext<Self::State>,
        operation: &str,
        payload: Bytes,
    ) -> Result<Bytes>;

    /// Called when the actor is activated
    async fn on_activate(&self, _ctx: &mut ActorContext<Self::State>) -> Result<()> {
        Ok(())
    }

    /// Called before the actor is deactivated
    async fn on_deactivate(&self, _ctx: &mut ActorContext<Self::State>) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// ActorContext
// =============================================================================

/// Context provided to an actor during invocation
///
/// Provides the actor's in-memory state and its scoped KV store.
pub struct ActorContext<S> {
    /// The actor's unique identifier
    pub id: ActorId,

    /// The actor's in-memory state
    pub state: S,

    /// Scoped KV store for persistence
    kv: Box<dyn ContextKV>,
}

impl<S> ActorContext<S>
where
    S: Serialize + DeserializeOwned + Default + Send + Sync,
{
    /// Create a new ActorContext
    pub fn new(id: ActorId, state: S, kv: Box<dyn ContextKV>) -> Self {
        Self { id, state, kv }
    }

    /// Create a new ActorContext with default state
    pub fn with_default_state(id: ActorId, kv: Box<dyn ContextKV>) -> Self {
        Self {
            id,
            state: S::default(),
            kv,
        }
    }

    /// Get a value from the actor's KV store
    pub async fn kv_get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        self.kv.get(key).await
    }

    /// Set a value in the actor's KV store
    pub async fn kv_set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.kv.set(key, value).await
    }

    /// Delete a value from the actor's KV store
    pub async fn kv_delete(&self, key: &[u8]) -> Result<()> {
        self.kv.delete(key).await
    }
}
