//! Docket Conversation
//!
//! The per-session conversation actor: the single source of truth for a
//! client intake session's authentication, conflict status, and goal
//! progress, enforced as an explicit phase state machine.
//!
//! One actor instance owns one session. All writes go through
//! [`ConversationActor::invoke`]; every mutation bumps the state version by
//! exactly one and emits at most one [`SyncEvent`] carrying that version,
//! after the new state has been written through the actor's KV store.

pub mod actor;
pub mod events;
pub mod phase;
pub mod state;

pub use actor::{
    ops, AddGoalsRequest, AddMessageRequest, AddMessageResponse, AuthenticateRequest,
    AuthenticateResponse, CompleteGoalRequest, ContextResponse, ConversationActor, CreateRequest,
    CreateResponse, FullConversationRequest, GoalSpec, MarkDeletedRequest, MarkDeletedResponse,
    PhaseResponse, ResumeRequest, SetConflictRequest, SetConflictResponse, SyncState,
    UpdateIdentityRequest, UpdatePreLoginGoalsRequest,
};
pub use events::{ChannelEventSink, NoOpEventSink, SyncEvent, SyncEventSink, SyncEventType};
pub use phase::{ConversationStatus, Phase};
pub use state::{
    ConflictCheck, ConflictStatus, ConversationState, Goal, GoalPriority, GoalSource, Message,
    MessageRole, PreLoginGoals, UserIdentity,
};
