//! Docket Tools
//!
//! JSON-RPC 2.0 tool-protocol servers consumed by the external agent
//! orchestrator: goal assessment, conflict screening, and document-driven
//! goal enhancement. Servers are stateless across calls except the
//! per-connection handshake flag held by [`ToolSession`].

pub mod additional_goals;
pub mod conflict_checker;
pub mod goal_tracker;
pub mod protocol;
pub mod search;
pub mod server;

pub use additional_goals::{
    AdditionalGoalsServer, DocumentRequirement, GoalSuggestions, SuggestGoalsParams,
};
pub use conflict_checker::{
    AnalyzeResolutionParams, CheckConflictsParams, ConflictCheckResult, ConflictCheckerServer,
    ConflictMatch, ConflictRecommendation, ConflictResolution, MatchType, ResolutionStrategy,
};
pub use goal_tracker::{
    AgentAction, AssessGoalsParams, GoalAssessment, GoalCompletionClassifier, GoalSignal,
    GoalTrackerServer, HistoryMessage, KeywordClassifier, Recommendation, RecommendationParams,
};
pub use protocol::{codes, JsonRpcError, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION};
pub use search::{FixtureEntry, FixtureSearch, SearchHit, SearchQuery, SemanticSearch};
pub use server::{
    ResourceDescriptor, ServerInfo, ToolCallError, ToolDescriptor, ToolProvider, ToolSession,
};
