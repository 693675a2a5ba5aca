//! Actor activation and lifecycle
//!
//! Explicit lifecycle states, single activation guarantee: the dispatcher
//! creates at most one `ActiveActor` per actor id, and that instance
//! processes envelopes strictly one at a time.

use crate::mailbox::Envelope;
use docket_core::{Actor, ActorContext, ActorId, Error, Result};
use docket_storage::{ActorKV, ScopedKV};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// State key for the actor's serialized state
const STATE_KEY: &[u8] = b"__state__";

/// Statistics for an active actor
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivationStats {
    /// Total invocations processed
    pub invocation_count: u64,
    /// Total invocation errors
    pub error_count: u64,
}

/// An active actor instance
///
/// Owns the actor implementation, its context, and its scoped storage.
/// Only the actor's owner task holds an `ActiveActor`, which is what makes
/// the state single-writer.
pub struct ActiveActor<A, S>
where
    A: Actor<State = S>,
    S: Serialize + DeserializeOwned + Default + Send + Sync,
{
    /// The actor's unique identifier
    pub id: ActorId,
    actor: A,
    context: ActorContext<S>,
    kv: ScopedKV,
    stats: ActivationStats,
}

impl<A, S> ActiveActor<A, S>
where
    A: Actor<State = S>,
    S: Serialize + DeserializeOwned + Default + Send + Sync,
{
    /// Activate an actor: load persisted state and run `on_activate`
    pub async fn activate(id: ActorId, actor: A, kv: Arc<dyn ActorKV>) -> Result<Self> {
        debug!(actor_id = %id, "activating actor");

        let scoped_kv = ScopedKV::new(id.clone(), kv.clone());
        let context_kv = ScopedKV::new(id.clone(), kv);

        let mut active = Self {
            id: id.clone(),
            actor,
            context: ActorContext::with_default_state(id.clone(), Box::new(context_kv)),
            kv: scoped_kv,
            stats: ActivationStats::default(),
        };

        active.load_state().await?;

        if let Err(e) = active.actor.on_activate(&mut active.context).await {
            error!(actor_id = %active.id, error = %e, "on_activate failed");
            return Err(e);
        }

        info!(actor_id = %active.id, "actor activated");
        Ok(active)
    }

    /// Load state from storage, falling back to default state
    async fn load_state(&mut self) -> Result<()> {
        use docket_core::ContextKV;

        match self.kv.get(STATE_KEY).await {
            Ok(Some(bytes)) => {
                let state: S = serde_json::from_slice(&bytes).map_err(Error::deserialization)?;
                self.context.state = state;
                debug!(actor_id = %self.id, "loaded state from storage");
            }
            Ok(None) => {
                debug!(actor_id = %self.id, "no existing state, using default");
            }
            Err(e) => {
                warn!(actor_id = %self.id, error = %e, "failed to load state, using default");
            }
        }
        Ok(())
    }

    /// Process one envelope and reply to the caller
    pub async fn process(&mut self, envelope: Envelope) {
        let result = self
            .actor
            .invoke(&mut self.context, &envelope.operation, envelope.payload)
            .await;

        self.stats.invocation_count = self.stats.invocation_count.wrapping_add(1);
        if result.is_err() {
            self.stats.error_count = self.stats.error_count.wrapping_add(1);
        }

        // Caller may have timed out and dropped the receiver.
        let _ = envelope.reply_tx.send(result);
    }

    /// Deactivate: run `on_deactivate` and persist state
    pub async fn deactivate(mut self) -> Result<()> {
        use docket_core::ContextKV;

        if let Err(e) = self.actor.on_deactivate(&mut self.context).await {
            warn!(actor_id = %self.id, error = %e, "on_deactivate failed");
        }

        let bytes = serde_json::to_vec(&self.context.state).map_err(Error::serialization)?;
        self.kv.set(STATE_KEY, &bytes).await?;

        info!(
            actor_id = %self.id,
            invocations = self.stats.invocation_count,
            errors = self.stats.error_count,
            "actor deactivated"
        );
        Ok(())
    }

    /// Invocation statistics
    pub fn stats(&self) -> ActivationStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use docket_storage::MemoryKV;
    use serde::Deserialize;
    use tokio::sync::oneshot;

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    struct CounterState {
        count: u64,
    }

    #[derive(Clone)]
    struct CounterActor;

    #[async_trait]
    impl Actor for CounterActor {
        type State = CounterState;

        async fn invoke(
            &self,
            ctx: &mut ActorContext<Self::State>,
            operation: &str,
            _payload: Bytes,
        ) -> Result<Bytes> {
            match operation {
                "incr" => {
                    ctx.state.count += 1;
                    Ok(Bytes::from(ctx.state.count.to_string()))
                }
                other => Err(Error::UnknownOperation {
                    operation: other.to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_activate_process_deactivate_persists_state() {
        let kv: Arc<dyn ActorKV> = Arc::new(MemoryKV::new());
        let id = ActorId::new("test", "counter-1").unwrap();

        let mut active = ActiveActor::activate(id.clone(), CounterActor, kv.clone())
            .await
            .unwrap();

        let (tx, rx) = oneshot::channel();
        active
            .process(Envelope::new("incr".into(), Bytes::new(), tx))
            .await;
        assert_eq!(rx.await.unwrap().unwrap(), Bytes::from("1"));

        active.deactivate().await.unwrap();

        // Re-activation reloads the persisted count.
        let mut active = ActiveActor::activate(id, CounterActor, kv).await.unwrap();
        let (tx, rx) = oneshot::channel();
        active
            .process(Envelope::new("incr".into(), Bytes::new(), tx))
            .await;
        assert_eq!(rx.await.unwrap().unwrap(), Bytes::from("2"));
    }

    #[tokio::test]
    async fn test_unknown_operation_counts_as_error() {
        let kv: Arc<dyn ActorKV> = Arc::new(MemoryKV::new());
        let id = ActorId::new("test", "counter-2").unwrap();
        let mut active = ActiveActor::activate(id, CounterActor, kv).await.unwrap();

        let (tx, rx) = oneshot::channel();
        active
            .process(Envelope::new("bogus".into(), Bytes::new(), tx))
            .await;
        assert!(matches!(
            rx.await.unwrap(),
            Err(Error::UnknownOperation { .. })
        ));
        assert_eq!(active.stats().error_count, 1);
    }
}
