//! Docket Storage
//!
//! Per-actor KV storage for conversation actors.
//!
//! # Overview
//!
//! Provides durable key-value storage scoped to each actor. The in-memory
//! backend serves tests and local runs; a production store plugs in behind
//! the same [`ActorKV`] trait.

pub mod kv;
pub mod memory;

pub use kv::{ActorKV, ScopedKV};
pub use memory::MemoryKV;
