//! Docket Sync
//!
//! Projects conversation actor state into a separately queryable search
//! index for admin use. One-way, eventually consistent: the actor is
//! always authoritative, the index is a read-optimized cache. Every
//! projection is gated on the actor's monotonic version, so at-least-once,
//! reordered event delivery converges to the newest state.

pub mod index;
pub mod processor;
pub mod sweeper;

pub use index::{
    AuditLog, AuditRow, IndexFilter, IndexPatch, IndexRow, MemoryAuditLog, MemoryIndex,
    SearchIndex,
};
pub use processor::SyncProcessor;
pub use sweeper::{ReconciliationSweeper, SweeperConfig, SyncStateSource};
