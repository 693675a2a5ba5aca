//! Docket Server Library
//!
//! HTTP surface and wiring for the Docket intake platform: the
//! conversation sub-route API, the tool-protocol RPC endpoints, and the
//! admin API over the search index.

pub mod api;
pub mod models;
pub mod service;
pub mod state;

pub use service::ConversationService;
pub use state::AppState;
