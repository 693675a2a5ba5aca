//! Message dispatcher for the actor runtime
//!
//! The dispatcher binds one exclusive owner task per actor id. Each owner
//! task drains its own bounded channel, so invocations for a single
//! session are processed strictly in order while unrelated sessions run
//! concurrently — no global lock on the routing path.

use crate::activation::ActiveActor;
use crate::mailbox::Envelope;
use bytes::Bytes;
use docket_core::{
    Actor, ActorId, Error, Result, ACTOR_IDLE_TIMEOUT_MS_DEFAULT, INVOCATION_PENDING_COUNT_MAX,
    MAILBOX_DEPTH_MAX,
};
use docket_storage::ActorKV;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Configuration for the dispatcher
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum number of concurrently activated actors
    pub max_actors: usize,
    /// Maximum pending invocations per actor (backpressure at the handle)
    pub max_pending_per_actor: usize,
    /// Per-actor mailbox depth
    pub mailbox_depth: usize,
    /// Channel buffer size for dispatcher commands
    pub command_buffer_size: usize,
    /// Idle time before an actor is deactivated (milliseconds)
    pub idle_timeout_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_actors: 100_000,
            max_pending_per_actor: INVOCATION_PENDING_COUNT_MAX,
            mailbox_depth: MAILBOX_DEPTH_MAX,
            command_buffer_size: 1024,
            idle_timeout_ms: ACTOR_IDLE_TIMEOUT_MS_DEFAULT,
        }
    }
}

/// Commands sent to the dispatcher
#[derive(Debug)]
pub enum DispatcherCommand {
    /// Invoke an actor
    Invoke {
        actor_id: ActorId,
        operation: String,
        payload: Bytes,
        reply_tx: oneshot::Sender<Result<Bytes>>,
    },
    /// Deactivate an actor
    Deactivate { actor_id: ActorId },
    /// Shutdown the dispatcher
    Shutdown,
}

/// Guard that decrements a counter on drop
struct PendingGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Handle to send commands to the dispatcher
#[derive(Clone)]
pub struct DispatcherHandle {
    command_tx: mpsc::Sender<DispatcherCommand>,
    /// Pending invocation count per actor (for backpressure)
    pending_counts: Arc<Mutex<HashMap<String, Arc<AtomicUsize>>>>,
    /// Maximum pending invocations per actor
    max_pending_per_actor: usize,
}

impl DispatcherHandle {
    /// Invoke an actor
    ///
    /// Returns an error if the actor has too many pending invocations.
    pub async fn invoke(
        &self,
        actor_id: ActorId,
        operation: String,
        payload: Bytes,
    ) -> Result<Bytes> {
        let key = actor_id.qualified_name();

        let counter = {
            let mut counts = self
                .pending_counts
                .lock()
                .map_err(|_| Error::internal("pending counts lock poisoned"))?;
            counts
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AtomicUsize::new(0)))
                .clone()
        };

        let current = counter.fetch_add(1, Ordering::SeqCst);
        if current >= self.max_pending_per_actor {
            counter.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::ActorMailboxFull {
                id: key,
                depth: current,
                max: self.max_pending_per_actor,
            });
        }

        // Decrements on completion, success or failure.
        let _guard = PendingGuard {
            counter: counter.clone(),
        };

        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(DispatcherCommand::Invoke {
                actor_id,
                operation,
                payload,
                reply_tx,
            })
            .await
            .map_err(|_| Error::internal("dispatcher channel closed"))?;

        reply_rx
            .await
            .map_err(|_| Error::internal("reply channel closed"))?
    }

    /// Deactivate an actor
    pub async fn deactivate(&self, actor_id: ActorId) -> Result<()> {
        self.command_tx
            .send(DispatcherCommand::Deactivate { actor_id })
            .await
            .map_err(|_| Error::internal("dispatcher channel closed"))
    }

    /// Shutdown the dispatcher
    pub async fn shutdown(&self) -> Result<()> {
        self.command_tx
            .send(DispatcherCommand::Shutdown)
            .await
            .map_err(|_| Error::internal("dispatcher channel closed"))
    }
}

/// Factory for creating actors
pub trait ActorFactory<A>: Send + Sync + 'static
where
    A: Actor,
{
    /// Create a new actor instance
    fn create(&self, id: &ActorId) -> A;
}

/// Simple factory that clones a prototype actor
pub struct CloneFactory<A: Clone + Send + Sync + 'static> {
    prototype: A,
}

impl<A: Clone + Send + Sync + 'static> CloneFactory<A> {
    /// Create a new clone factory
    pub fn new(prototype: A) -> Self {
        Self { prototype }
    }
}

impl<A> ActorFactory<A> for CloneFactory<A>
where
    A: Actor + Clone,
{
    fn create(&self, _id: &ActorId) -> A {
        self.prototype.clone()
    }
}

/// One activated actor from the dispatcher's point of view
struct ActorEntry {
    mailbox_tx: mpsc::Sender<Envelope>,
    task: JoinHandle<()>,
}

/// Dispatcher for routing messages to actors
///
/// Manages actor lifecycle and message routing.
pub struct Dispatcher<A, S>
where
    A: Actor<State = S>,
    S: Serialize + DeserializeOwned + Default + Send + Sync,
{
    factory: Arc<dyn ActorFactory<A>>,
    kv: Arc<dyn ActorKV>,
    config: DispatcherConfig,
    actors: HashMap<String, ActorEntry>,
    command_rx: mpsc::Receiver<DispatcherCommand>,
    command_tx: mpsc::Sender<DispatcherCommand>,
    pending_counts: Arc<Mutex<HashMap<String, Arc<AtomicUsize>>>>,
}

impl<A, S> Dispatcher<A, S>
where
    A: Actor<State = S>,
    S: Serialize + DeserializeOwned + Default + Send + Sync + 'static,
{
    /// Create a new dispatcher
    pub fn new(
        factory: Arc<dyn ActorFactory<A>>,
        kv: Arc<dyn ActorKV>,
        config: DispatcherConfig,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer_size);

        Self {
            factory,
            kv,
            config,
            actors: HashMap::new(),
            command_rx,
            command_tx,
            pending_counts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get a handle to the dispatcher
    pub fn handle(&self) -> DispatcherHandle {
        DispatcherHandle {
            command_tx: self.command_tx.clone(),
            pending_counts: self.pending_counts.clone(),
            max_pending_per_actor: self.config.max_pending_per_actor,
        }
    }

    /// Run the dispatcher loop
    pub async fn run(&mut self) {
        info!("dispatcher starting");

        while let Some(command) = self.command_rx.recv().await {
            match command {
                DispatcherCommand::Invoke {
                    actor_id,
                    operation,
                    payload,
                    reply_tx,
                } => {
                    self.route_invoke(actor_id, operation, payload, reply_tx);
                }
                DispatcherCommand::Deactivate { actor_id } => {
                    self.handle_deactivate(&actor_id);
                }
                DispatcherCommand::Shutdown => {
                    info!("dispatcher shutting down");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("dispatcher stopped");
    }

    /// Route an invocation to the actor's owner task, spawning it on first
    /// use. Routing never awaits the actor, so one slow session cannot
    /// stall the dispatch loop.
    fn route_invoke(
        &mut self,
        actor_id: ActorId,
        operation: String,
        payload: Bytes,
        reply_tx: oneshot::Sender<Result<Bytes>>,
    ) {
        let key = actor_id.qualified_name();
        let mut envelope = Envelope::new(operation, payload, reply_tx);

        // One retry: the owner task may have exited after an idle timeout
        // the dispatcher hasn't processed yet, closing the channel.
        for attempt in 0..2 {
            if !self.actors.contains_key(&key) {
                if self.actors.len() >= self.config.max_actors {
                    envelope.reject(Error::internal(format!(
                        "active actor limit reached: {}",
                        self.config.max_actors
                    )));
                    return;
                }
                let entry = self.spawn_actor(&actor_id);
                self.actors.insert(key.clone(), entry);
            }

            // Bind the send result first so the map borrow ends before the
            // Closed arm mutates the map.
            let send_result = match self.actors.get(&key) {
                Some(entry) => entry.mailbox_tx.try_send(envelope),
                None => {
                    envelope.reject(Error::internal("actor entry missing after spawn"));
                    return;
                }
            };

            match send_result {
                Ok(()) => return,
                Err(mpsc::error::TrySendError::Full(returned)) => {
                    returned.reject(Error::ActorMailboxFull {
                        id: key,
                        depth: self.config.mailbox_depth,
                        max: self.config.mailbox_depth,
                    });
                    return;
                }
                Err(mpsc::error::TrySendError::Closed(returned)) => {
                    debug!(actor_id = %key, attempt, "owner task gone, respawning");
                    self.actors.remove(&key);
                    envelope = returned;
                }
            }
        }

        envelope.reject(Error::internal("actor owner task unavailable"));
    }

    /// Spawn the owner task for an actor
    fn spawn_actor(&self, actor_id: &ActorId) -> ActorEntry {
        let (mailbox_tx, mailbox_rx) = mpsc::channel(self.config.mailbox_depth);
        let actor = self.factory.create(actor_id);
        let task = tokio::spawn(run_actor(
            actor_id.clone(),
            actor,
            self.kv.clone(),
            mailbox_rx,
            self.config.idle_timeout_ms,
            self.command_tx.clone(),
        ));

        ActorEntry { mailbox_tx, task }
    }

    /// Drop an actor's mailbox sender; its owner task drains remaining
    /// envelopes, persists state, and exits.
    fn handle_deactivate(&mut self, actor_id: &ActorId) {
        if self.actors.remove(&actor_id.qualified_name()).is_some() {
            debug!(actor_id = %actor_id, "actor deactivation requested");
        }
    }

    async fn shutdown(&mut self) {
        let entries: Vec<ActorEntry> = self.actors.drain().map(|(_, entry)| entry).collect();
        for entry in entries {
            drop(entry.mailbox_tx);
            if let Err(e) = entry.task.await {
                warn!(error = %e, "actor task panicked during shutdown");
            }
        }
    }
}

/// Owner task: activates the actor, drains its mailbox one envelope at a
/// time, and deactivates (persisting state) once the mailbox closes.
async fn run_actor<A, S>(
    id: ActorId,
    actor: A,
    kv: Arc<dyn ActorKV>,
    mut mailbox_rx: mpsc::Receiver<Envelope>,
    idle_timeout_ms: u64,
    command_tx: mpsc::Sender<DispatcherCommand>,
) where
    A: Actor<State = S>,
    S: Serialize + DeserializeOwned + Default + Send + Sync + 'static,
{
    let mut active = match ActiveActor::activate(id.clone(), actor, kv).await {
        Ok(active) => active,
        Err(e) => {
            error!(actor_id = %id, error = %e, "actor activation failed");
            while let Some(envelope) = mailbox_rx.recv().await {
                envelope.reject(Error::internal(format!("actor activation failed: {}", e)));
            }
            let _ = command_tx
                .send(DispatcherCommand::Deactivate { actor_id: id })
                .await;
            return;
        }
    };

    let idle_timeout = Duration::from_millis(idle_timeout_ms.max(1));
    let mut idle_notified = false;

    loop {
        tokio::select! {
            maybe_envelope = mailbox_rx.recv() => match maybe_envelope {
                Some(envelope) => {
                    idle_notified = false;
                    active.process(envelope).await;
                }
                None => break,
            },
            _ = tokio::time::sleep(idle_timeout), if !idle_notified => {
                // Non-blocking: if the command channel is saturated, retry
                // on the next idle interval instead of wedging this task.
                idle_notified = command_tx
                    .try_send(DispatcherCommand::Deactivate { actor_id: id.clone() })
                    .is_ok();
            }
        }
    }

    if let Err(e) = active.deactivate().await {
        warn!(actor_id = %id, error = %e, "actor deactivation failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docket_core::ActorContext;
    use docket_storage::MemoryKV;
    use serde::Deserialize;

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
                "get" => Ok(Bytes::from(ctx.state.count.to_string())),
                other => Err(Error::UnknownOperation {
                    operation: other.to_string(),
                }),
            }
        }
    }

    fn spawn_dispatcher(config: DispatcherConfig) -> DispatcherHandle {
        let factory = Arc::new(CloneFactory::new(CounterActor));
        let kv: Arc<dyn ActorKV> = Arc::new(MemoryKV::new());
        let mut dispatcher = Dispatcher::new(factory, kv, config);
        let handle = dispatcher.handle();
        tokio::spawn(async move { dispatcher.run().await });
        handle
    }

    #[tokio::test]
    async fn test_invocations_are_ordered_per_actor() {
        let handle = spawn_dispatcher(DispatcherConfig::default());
        let actor_id = ActorId::new("test", "counter-1").unwrap();

        for expected in 1..=10u64 {
            let result = handle
                .invoke(actor_id.clone(), "incr".into(), Bytes::new())
                .await
                .unwrap();
            assert_eq!(result, Bytes::from(expected.to_string()));
        }
    }

    #[tokio::test]
    async fn test_actors_are_isolated() {
        let handle = spawn_dispatcher(DispatcherConfig::default());
        let a = ActorId::new("test", "counter-a").unwrap();
        let b = ActorId::new("test", "counter-b").unwrap();

        handle
            .invoke(a.clone(), "incr".into(), Bytes::new())
            .await
            .unwrap();
        let b_count = handle.invoke(b, "get".into(), Bytes::new()).await.unwrap();
        assert_eq!(b_count, Bytes::from("0"));
    }

    #[tokio::test]
    async fn test_state_survives_deactivation() {
        let handle = spawn_dispatcher(DispatcherConfig::default());
        let actor_id = ActorId::new("test", "counter-persist").unwrap();

        handle
            .invoke(actor_id.clone(), "incr".into(), Bytes::new())
            .await
            .unwrap();

        handle.deactivate(actor_id.clone()).await.unwrap();
        // Give the owner task a moment to persist and exit.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let result = handle
            .invoke(actor_id, "incr".into(), Bytes::new())
            .await
            .unwrap();
        assert_eq!(result, Bytes::from("2"));
    }

    #[tokio::test]
    async fn test_concurrent_invokes_serialize_per_actor() {
        let handle = spawn_dispatcher(DispatcherConfig::default());
        let actor_id = ActorId::new("test", "counter-race").unwrap();

        let mut join_set = tokio::task::JoinSet::new();
        for _ in 0..50 {
            let handle = handle.clone();
            let actor_id = actor_id.clone();
            join_set.spawn(async move {
                handle
                    .invoke(actor_id, "incr".into(), Bytes::new())
                    .await
                    .unwrap()
            });
        }
        while join_set.join_next().await.is_some() {}

        let result = handle
            .invoke(actor_id, "get".into(), Bytes::new())
            .await
            .unwrap();
        // Every increment applied exactly once despite concurrent callers.
        assert_eq!(result, Bytes::from("50"));
    }
}
