//! Docket Core
//!
//! Core types, errors, and constants for the Docket intake platform.
//!
//! # Overview
//!
//! Docket runs AI-driven legal client intake: one durable actor per
//! conversation, tool-protocol servers consulted by an external agent
//! orchestrator, and a version-gated projection into an admin search index.
//! This crate holds the kernel every other crate builds on:
//!
//! - Explicit limits with units in the name (e.g. `MAILBOX_DEPTH_MAX`)
//! - The [`Actor`] trait and its single-writer execution contract
//! - Sortable identifiers for sessions, users, messages, and goals
//! - The monotonic [`Version`] used to gate index projections

pub mod actor;
pub mod config;
pub mod constants;
pub mod error;
pub mod id;
pub mod io;
pub mod version;

pub use actor::{Actor, ActorContext, ActorId, ContextKV, NoOpKV};
pub use config::DocketConfig;
pub use constants::*;
pub use error::{Error, Result};
pub use io::{ManualClock, TimeProvider, WallClockTime};
pub use version::Version;
