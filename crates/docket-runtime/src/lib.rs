//! Docket Runtime
//!
//! Hosts conversation actors with the single-writer guarantee: each actor
//! id is bound to exactly one owner task that drains a bounded mailbox, so
//! invocations for one session are strictly ordered and sessions never
//! contend on a shared lock.

pub mod activation;
pub mod dispatcher;
pub mod mailbox;

pub use activation::ActiveActor;
pub use dispatcher::{
    ActorFactory, CloneFactory, Dispatcher, DispatcherConfig, DispatcherHandle,
};
pub use mailbox::Envelope;
