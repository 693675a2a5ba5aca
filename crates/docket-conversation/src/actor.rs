//! ConversationActor implementation
//!
//! One actor instance per intake session; the runtime guarantees
//! single-threaded execution, so every handler may read-then-write state
//! without locks. Each mutating operation bumps the version by exactly
//! one, persists the state through the actor's KV (write-ahead), and then
//! emits at most one sync event carrying the new version.

use crate::events::{SyncEvent, SyncEventSink, SyncEventType};
use crate::phase::{ConversationStatus, Phase};
use crate::state::{
    ConflictCheck, ConflictStatus, ConversationState, Goal, GoalPriority, GoalSource, Message,
    MessageRole, PreLoginGoals, UserIdentity,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use docket_core::{
    id, Actor, ActorContext, Error, Result, Version, CONVERSATION_GOALS_COUNT_MAX,
    CONVERSATION_MESSAGES_COUNT_MAX, MESSAGE_CONTENT_LENGTH_BYTES_MAX,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;

/// State key for the serialized conversation state
///
/// Must match the runtime's activation key so a deactivated actor reloads
/// the same row it wrote during invocations.
const STATE_KEY: &[u8] = b"__state__";

/// Messages included in the orchestrator context window
const CONTEXT_RECENT_MESSAGES_COUNT: usize = 20;

/// The per-session conversation actor
#[derive(Clone)]
pub struct ConversationActor {
    events: Arc<dyn SyncEventSink>,
}

impl ConversationActor {
    /// Create an actor prototype wired to an event sink
    pub fn new(events: Arc<dyn SyncEventSink>) -> Self {
        Self { events }
    }

    fn emit(&self, state: &ConversationState, event_type: SyncEventType, data: serde_json::Value) {
        self.events.emit(SyncEvent::new(
            event_type,
            state.session_id.clone(),
            state.firm_id.clone(),
            state.version,
            data,
        ));
    }

    async fn persist(&self, ctx: &ActorContext<ConversationState>) -> Result<()> {
        let bytes = serde_json::to_vec(&ctx.state).map_err(Error::serialization)?;
        ctx.kv_set(STATE_KEY, &bytes).await
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    async fn handle_create(
        &self,
        ctx: &mut ActorContext<ConversationState>,
        request: CreateRequest,
    ) -> Result<CreateResponse> {
        if ctx.state.is_initialized() {
            return Err(Error::internal(format!(
                "session already created: {}",
                ctx.state.session_id
            )));
        }

        let firm_id = request.firm_id.unwrap_or_default();
        if firm_id.is_empty() {
            return Err(Error::missing_field("firm_id"));
        }

        // The actor id is authoritative for the session id; the service
        // minted it (or honored the caller's) before routing here.
        let session_id = ctx.id.id().to_string();
        let mut state = ConversationState::initialize(firm_id, session_id, Utc::now());
        state.bump_version();
        ctx.state = state;

        self.persist(ctx).await?;
        self.emit(
            &ctx.state,
            SyncEventType::Created,
            serde_json::json!({
                "phase": ctx.state.phase,
                "user_id": ctx.state.user_id,
            }),
        );

        Ok(CreateResponse {
            session_id: ctx.state.session_id.clone(),
            user_id: ctx.state.user_id.clone(),
            resume_token: ctx.state.resume_token.clone(),
            resume_url: format!("/v1/conversations/resume/{}", ctx.state.resume_token),
            phase: ctx.state.phase,
            pre_login_goals: ctx.state.pre_login_goals,
        })
    }

    async fn handle_resume(
        &self,
        ctx: &mut ActorContext<ConversationState>,
        request: ResumeRequest,
    ) -> Result<ConversationState> {
        if request.resume_token != ctx.state.resume_token {
            return Err(Error::InvalidResumeToken {
                session_id: ctx.state.session_id.clone(),
            });
        }

        if ctx.state.is_secured {
            let subject = request.auth0_user_id.as_deref().unwrap_or_default();
            let allowed = ctx
                .state
                .allowed_auth0_users
                .iter()
                .any(|u| u == subject && !subject.is_empty());
            if !allowed {
                return Err(Error::UnauthorizedAccess {
                    session_id: ctx.state.session_id.clone(),
                    reason: "auth0 subject not in session allow-list".into(),
                });
            }
        }

        ctx.state.last_activity = Some(Utc::now());
        ctx.state.bump_version();
        self.persist(ctx).await?;

        Ok(ctx.state.clone())
    }

    async fn handle_add_message(
        &self,
        ctx: &mut ActorContext<ConversationState>,
        request: AddMessageRequest,
    ) -> Result<AddMessageResponse> {
        let role = request.role.ok_or_else(|| Error::missing_field("role"))?;
        let content = request
            .content
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::missing_field("content"))?;

        if content.len() > MESSAGE_CONTENT_LENGTH_BYTES_MAX {
            return Err(Error::internal(format!(
                "message content length {} exceeds limit {}",
                content.len(),
                MESSAGE_CONTENT_LENGTH_BYTES_MAX
            )));
        }
        if ctx.state.messages.len() >= CONVERSATION_MESSAGES_COUNT_MAX {
            return Err(Error::internal(format!(
                "message limit reached: {}",
                CONVERSATION_MESSAGES_COUNT_MAX
            )));
        }

        let message = Message {
            id: id::new_message_id(),
            role,
            content,
            timestamp: Utc::now(),
            metadata: request.metadata,
        };
        let message_id = message.id.clone();
        let timestamp = message.timestamp;

        ctx.state.messages.push(message);
        ctx.state.last_activity = Some(timestamp);
        ctx.state.bump_version();
        self.persist(ctx).await?;

        let message_count = ctx.state.messages.len();
        self.emit(
            &ctx.state,
            SyncEventType::MessageAdded,
            serde_json::json!({
                "message_count": message_count,
                "last_message_at": timestamp,
            }),
        );

        Ok(AddMessageResponse {
            message_id,
            timestamp,
            message_count,
        })
    }

    async fn handle_update_identity(
        &self,
        ctx: &mut ActorContext<ConversationState>,
        request: UpdateIdentityRequest,
    ) -> Result<UserIdentity> {
        ctx.state.user_identity.merge(request.identity);

        if ctx.state.user_identity.is_identified() {
            ctx.state.pre_login_goals.user_identification = true;
        }

        ctx.state.last_activity = Some(Utc::now());
        ctx.state.bump_version();
        self.persist(ctx).await?;

        // Only a merge that yields actual contact data is worth projecting.
        if ctx.state.user_identity.has_core_contact() {
            self.emit(
                &ctx.state,
                SyncEventType::UserIdentified,
                serde_json::json!({
                    "client_name": ctx.state.user_identity.primary_name(),
                    "client_email": ctx.state.user_identity.email,
                    "client_phone": ctx.state.user_identity.phone,
                }),
            );
        }

        Ok(ctx.state.user_identity.clone())
    }

    async fn handle_update_pre_login_goals(
        &self,
        ctx: &mut ActorContext<ConversationState>,
        request: UpdatePreLoginGoalsRequest,
    ) -> Result<PreLoginGoals> {
        // Flags are monotonic: assessments can only mark progress, never
        // take it back.
        if request.user_identification == Some(true) {
            ctx.state.pre_login_goals.user_identification = true;
        }
        if request.conflict_check == Some(true) {
            ctx.state.pre_login_goals.conflict_check = true;
        }
        if request.legal_needs_assessment == Some(true) {
            ctx.state.pre_login_goals.legal_needs_assessment = true;
        }

        ctx.state.bump_version();
        self.persist(ctx).await?;
        self.emit(
            &ctx.state,
            SyncEventType::GoalsUpdated,
            serde_json::json!({
                "pre_login_goals": ctx.state.pre_login_goals,
                "goals_total": ctx.state.goals_total(),
                "goals_completed": ctx.state.completed_goals.len(),
            }),
        );

        Ok(ctx.state.pre_login_goals)
    }

    async fn handle_suggest_login(
        &self,
        ctx: &mut ActorContext<ConversationState>,
    ) -> Result<PhaseResponse> {
        ctx.state.transition_to(Phase::LoginSuggested)?;
        ctx.state.bump_version();
        self.persist(ctx).await?;
        self.emit(
            &ctx.state,
            SyncEventType::StatusChanged,
            serde_json::json!({
                "phase": ctx.state.phase,
                "status": ctx.state.phase.status(),
            }),
        );

        Ok(PhaseResponse {
            phase: ctx.state.phase,
        })
    }

    async fn handle_authenticate(
        &self,
        ctx: &mut ActorContext<ConversationState>,
        request: AuthenticateRequest,
    ) -> Result<AuthenticateResponse> {
        let subject = request.auth0_user_id;
        if subject.is_empty() {
            return Err(Error::missing_field("auth0_user_id"));
        }

        if ctx.state.is_secured {
            // One-way: a session cannot be re-bound to a different subject.
            if ctx.state.allowed_auth0_users.iter().any(|u| u == &subject) {
                return Ok(AuthenticateResponse {
                    authenticated: true,
                    secured: true,
                    phase: ctx.state.phase,
                });
            }
            return Err(Error::UnauthorizedAccess {
                session_id: ctx.state.session_id.clone(),
                reason: "session already secured by another subject".into(),
            });
        }

        ctx.state.transition_to(Phase::Secured)?;
        ctx.state.is_authenticated = true;
        ctx.state.is_secured = true;
        ctx.state.allowed_auth0_users = vec![subject];
        ctx.state.last_activity = Some(Utc::now());
        ctx.state.bump_version();
        self.persist(ctx).await?;
        self.emit(
            &ctx.state,
            SyncEventType::StatusChanged,
            serde_json::json!({
                "phase": ctx.state.phase,
                "status": ctx.state.phase.status(),
            }),
        );

        Ok(AuthenticateResponse {
            authenticated: true,
            secured: true,
            phase: ctx.state.phase,
        })
    }

    async fn handle_set_conflict_result(
        &self,
        ctx: &mut ActorContext<ConversationState>,
        request: SetConflictRequest,
    ) -> Result<SetConflictResponse> {
        ctx.state.conflict_check = ConflictCheck {
            status: request.status,
            checked_at: Some(Utc::now()),
            details: request.details,
            checked_identity: request.checked_identity,
        };

        if request.status != ConflictStatus::Pending {
            ctx.state.pre_login_goals.conflict_check = true;
        }

        match request.status {
            ConflictStatus::ConflictDetected => {
                // A detected conflict overrides whatever phase the
                // conversation is in; only absorbing phases stay put.
                if !ctx.state.phase.is_terminal() {
                    ctx.state.phase = Phase::Terminated;
                }
            }
            ConflictStatus::Clear => {
                if ctx.state.phase == Phase::Secured {
                    ctx.state.transition_to(Phase::ConflictCheckComplete)?;
                }
            }
            ConflictStatus::Pending => {}
        }

        ctx.state.bump_version();
        self.persist(ctx).await?;
        self.emit(
            &ctx.state,
            SyncEventType::ConflictChecked,
            serde_json::json!({
                "conflict_status": ctx.state.conflict_check.status,
                "phase": ctx.state.phase,
                "status": ctx.state.phase.status(),
                "checked_identity": ctx.state.conflict_check.checked_identity,
            }),
        );

        Ok(SetConflictResponse {
            conflict_status: ctx.state.conflict_check.status,
            phase: ctx.state.phase,
        })
    }

    async fn handle_add_goals(
        &self,
        ctx: &mut ActorContext<ConversationState>,
        request: AddGoalsRequest,
    ) -> Result<Vec<Goal>> {
        if request.goals.is_empty() {
            return Err(Error::missing_field("goals"));
        }
        if ctx.state.goals_total() + request.goals.len() > CONVERSATION_GOALS_COUNT_MAX {
            return Err(Error::internal(format!(
                "goal limit reached: {}",
                CONVERSATION_GOALS_COUNT_MAX
            )));
        }

        let mut created = Vec::with_capacity(request.goals.len());
        for spec in request.goals {
            let goal = Goal {
                id: id::new_goal_id(),
                description: spec.description,
                priority: spec.priority,
                category: spec.category,
                completed: false,
                completion_data: None,
                source: spec.source,
                related_conflict_id: spec.related_conflict_id,
            };
            ctx.state.data_goals.push(goal.clone());
            created.push(goal);
        }

        // New data goals mark the start of the gathering phase once the
        // conflict gate has been passed.
        if ctx.state.phase == Phase::ConflictCheckComplete {
            ctx.state.transition_to(Phase::DataGathering)?;
        }

        ctx.state.bump_version();
        self.persist(ctx).await?;
        self.emit(
            &ctx.state,
            SyncEventType::GoalsUpdated,
            serde_json::json!({
                "goals_total": ctx.state.goals_total(),
                "goals_completed": ctx.state.completed_goals.len(),
                "phase": ctx.state.phase,
            }),
        );

        Ok(created)
    }

    async fn handle_complete_goal(
        &self,
        ctx: &mut ActorContext<ConversationState>,
        request: CompleteGoalRequest,
    ) -> Result<Goal> {
        if !ctx
            .state
            .complete_goal(&request.goal_id, request.completion_data)
        {
            return Err(Error::GoalNotFound {
                goal_id: request.goal_id,
            });
        }

        ctx.state.bump_version();
        self.persist(ctx).await?;
        self.emit(
            &ctx.state,
            SyncEventType::GoalsUpdated,
            serde_json::json!({
                "goals_total": ctx.state.goals_total(),
                "goals_completed": ctx.state.completed_goals.len(),
            }),
        );

        let goal = ctx
            .state
            .completed_goals
            .last()
            .cloned()
            .ok_or_else(|| Error::internal("completed goal missing after flip"))?;
        Ok(goal)
    }

    async fn handle_complete(
        &self,
        ctx: &mut ActorContext<ConversationState>,
    ) -> Result<PhaseResponse> {
        ctx.state.transition_to(Phase::Completed)?;
        ctx.state.bump_version();
        self.persist(ctx).await?;
        self.emit(
            &ctx.state,
            SyncEventType::StatusChanged,
            serde_json::json!({
                "phase": ctx.state.phase,
                "status": ctx.state.phase.status(),
            }),
        );

        Ok(PhaseResponse {
            phase: ctx.state.phase,
        })
    }

    fn handle_get_context(&self, ctx: &ActorContext<ConversationState>) -> ContextResponse {
        let state = &ctx.state;
        let recent_start = state
            .messages
            .len()
            .saturating_sub(CONTEXT_RECENT_MESSAGES_COUNT);

        ContextResponse {
            session_id: state.session_id.clone(),
            firm_id: state.firm_id.clone(),
            phase: state.phase,
            status: state.phase.status(),
            is_authenticated: state.is_authenticated,
            is_secured: state.is_secured,
            pre_login_goals: state.pre_login_goals,
            conflict_status: state.conflict_check.status,
            user_identity: state.user_identity.clone(),
            open_goals: state.data_goals.clone(),
            completed_goal_count: state.completed_goals.len(),
            recent_messages: state.messages[recent_start..].to_vec(),
            message_count: state.messages.len(),
        }
    }

    async fn handle_mark_deleted(
        &self,
        ctx: &mut ActorContext<ConversationState>,
        request: MarkDeletedRequest,
    ) -> Result<MarkDeletedResponse> {
        if !request.admin {
            return Err(Error::AdminRequired {
                operation: ops::MARK_DELETED.into(),
            });
        }
        if request.deleted_by.is_empty() {
            return Err(Error::missing_field("deleted_by"));
        }

        ctx.state.is_deleted = true;
        ctx.state.deleted_by = Some(request.deleted_by);
        ctx.state.deleted_at = Some(Utc::now());
        ctx.state.bump_version();
        self.persist(ctx).await?;
        self.emit(
            &ctx.state,
            SyncEventType::StatusChanged,
            serde_json::json!({
                "phase": ctx.state.phase,
                "status": ctx.state.phase.status(),
                "is_deleted": true,
            }),
        );

        Ok(MarkDeletedResponse { deleted: true })
    }

    fn handle_get_sync_state(&self, ctx: &ActorContext<ConversationState>) -> SyncState {
        let state = &ctx.state;
        SyncState {
            do_version: state.version,
            phase: state.phase,
            status: state.phase.status(),
            conflict_status: state.conflict_check.status,
            message_count: state.messages.len(),
            goals_total: state.goals_total(),
            goals_completed: state.completed_goals.len(),
            client_name: state.user_identity.primary_name().map(str::to_string),
            client_email: state.user_identity.email.clone(),
            last_message_at: state.last_message_at(),
            is_deleted: state.is_deleted,
        }
    }
}

/// Operation names accepted by [`ConversationActor::invoke`]
pub mod ops {
    pub const CREATE: &str = "create";
    pub const RESUME: &str = "resume";
    pub const ADD_MESSAGE: &str = "add_message";
    pub const UPDATE_IDENTITY: &str = "update_identity";
    pub const UPDATE_PRE_LOGIN_GOALS: &str = "update_pre_login_goals";
    pub const SUGGEST_LOGIN: &str = "suggest_login";
    pub const AUTHENTICATE: &str = "authenticate";
    pub const SET_CONFLICT_RESULT: &str = "set_conflict_result";
    pub const ADD_GOALS: &str = "add_goals";
    pub const COMPLETE_GOAL: &str = "complete_goal";
    pub const COMPLETE: &str = "complete";
    pub const GET_CONTEXT: &str = "get_context";
    pub const GET_FULL_CONVERSATION: &str = "get_full_conversation";
    pub const MARK_DELETED: &str = "mark_deleted";
    pub const GET_SYNC_STATE: &str = "get_sync_state";
}

fn decode<T: DeserializeOwned>(payload: &Bytes) -> Result<T> {
    serde_json::from_slice(payload).map_err(Error::deserialization)
}

fn encode<T: Serialize>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(Error::serialization)
}

#[async_trait]
impl Actor for ConversationActor {
    type State = ConversationState;

    async fn invoke(
        &self,
        ctx: &mut ActorContext<Self::State>,
        operation: &str,
        payload: Bytes,
    ) -> Result<Bytes> {
        // Everything except create requires an initialized session.
        if operation != ops::CREATE && !ctx.state.is_initialized() {
            return Err(Error::session_not_found(ctx.id.id()));
        }

        // A soft-deleted session stays addressable for audit reads but
        // rejects every mutation.
        if ctx.state.is_deleted
            && !matches!(
                operation,
                ops::GET_CONTEXT | ops::GET_FULL_CONVERSATION | ops::GET_SYNC_STATE
            )
        {
            return Err(Error::SessionDeleted {
                session_id: ctx.state.session_id.clone(),
            });
        }

        match operation {
            ops::CREATE => {
                let request: CreateRequest = decode(&payload)?;
                encode(&self.handle_create(ctx, request).await?)
            }
            ops::RESUME => {
                let request: ResumeRequest = decode(&payload)?;
                encode(&self.handle_resume(ctx, request).await?)
            }
            ops::ADD_MESSAGE => {
                let request: AddMessageRequest = decode(&payload)?;
                encode(&self.handle_add_message(ctx, request).await?)
            }
            ops::UPDATE_IDENTITY => {
                let request: UpdateIdentityRequest = decode(&payload)?;
                encode(&self.handle_update_identity(ctx, request).await?)
            }
            ops::UPDATE_PRE_LOGIN_GOALS => {
                let request: UpdatePreLoginGoalsRequest = decode(&payload)?;
                encode(&self.handle_update_pre_login_goals(ctx, request).await?)
            }
            ops::SUGGEST_LOGIN => encode(&self.handle_suggest_login(ctx).await?),
            ops::AUTHENTICATE => {
                let request: AuthenticateRequest = decode(&payload)?;
                encode(&self.handle_authenticate(ctx, request).await?)
            }
            ops::SET_CONFLICT_RESULT => {
                let request: SetConflictRequest = decode(&payload)?;
                encode(&self.handle_set_conflict_result(ctx, request).await?)
            }
            ops::ADD_GOALS => {
                let request: AddGoalsRequest = decode(&payload)?;
                encode(&self.handle_add_goals(ctx, request).await?)
            }
            ops::COMPLETE_GOAL => {
                let request: CompleteGoalRequest = decode(&payload)?;
                encode(&self.handle_complete_goal(ctx, request).await?)
            }
            ops::COMPLETE => encode(&self.handle_complete(ctx).await?),
            ops::GET_CONTEXT => encode(&self.handle_get_context(ctx)),
            ops::GET_FULL_CONVERSATION => {
                let request: FullConversationRequest = decode(&payload)?;
                if !request.admin {
                    return Err(Error::AdminRequired {
                        operation: ops::GET_FULL_CONVERSATION.into(),
                    });
                }
                encode(&ctx.state)
            }
            ops::MARK_DELETED => {
                let request: MarkDeletedRequest = decode(&payload)?;
                encode(&self.handle_mark_deleted(ctx, request).await?)
            }
            ops::GET_SYNC_STATE => encode(&self.handle_get_sync_state(ctx)),
            other => Err(Error::UnknownOperation {
                operation: other.to_string(),
            }),
        }
    }
}

// =============================================================================
// Request / response types
// =============================================================================

/// Create a new conversation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRequest {
    pub firm_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Response to `create`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResponse {
    pub session_id: String,
    pub user_id: String,
    pub resume_token: String,
    pub resume_url: String,
    pub phase: Phase,
    pub pre_login_goals: PreLoginGoals,
}

/// Resume an existing conversation by token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeRequest {
    pub resume_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth0_user_id: Option<String>,
}

/// Append a message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddMessageRequest {
    pub role: Option<MessageRole>,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Response to `add_message`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMessageResponse {
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    pub message_count: usize,
}

/// Merge partial identity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateIdentityRequest {
    pub identity: UserIdentity,
}

/// Mark pre-login goal progress (flags are monotonic)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePreLoginGoalsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_identification: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_check: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_needs_assessment: Option<bool>,
}

/// Bind an Auth0 subject to the session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticateRequest {
    pub auth0_user_id: String,
}

/// Response to `authenticate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticateResponse {
    pub authenticated: bool,
    pub secured: bool,
    pub phase: Phase,
}

/// Record the outcome of conflict screening
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetConflictRequest {
    pub status: ConflictStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default)]
    pub checked_identity: Vec<String>,
}

/// Response to `set_conflict_result`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetConflictResponse {
    pub conflict_status: ConflictStatus,
    pub phase: Phase,
}

/// Goal to attach, id assigned by the actor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalSpec {
    pub description: String,
    pub priority: GoalPriority,
    pub category: String,
    #[serde(default = "default_goal_source")]
    pub source: GoalSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_conflict_id: Option<String>,
}

fn default_goal_source() -> GoalSource {
    GoalSource::Additional
}

/// Attach data goals
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddGoalsRequest {
    #[serde(default)]
    pub goals: Vec<GoalSpec>,
}

/// Flip a goal to completed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteGoalRequest {
    pub goal_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_data: Option<serde_json::Value>,
}

/// Phase-only response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResponse {
    pub phase: Phase,
}

/// Orchestrator-facing context summary (no admin-only material)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextResponse {
    pub session_id: String,
    pub firm_id: String,
    pub phase: Phase,
    pub status: ConversationStatus,
    pub is_authenticated: bool,
    pub is_secured: bool,
    pub pre_login_goals: PreLoginGoals,
    pub conflict_status: ConflictStatus,
    pub user_identity: UserIdentity,
    pub open_goals: Vec<Goal>,
    pub completed_goal_count: usize,
    pub recent_messages: Vec<Message>,
    pub message_count: usize,
}

/// Admin-gated full state read
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FullConversationRequest {
    #[serde(default)]
    pub admin: bool,
}

/// Admin-gated soft delete
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkDeletedRequest {
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub deleted_by: String,
}

/// Response to `mark_deleted`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkDeletedResponse {
    pub deleted: bool,
}

/// Minimal projection for reconciliation pulls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    pub do_version: Version,
    pub phase: Phase,
    pub status: ConversationStatus,
    pub conflict_status: ConflictStatus,
    pub message_count: usize,
    pub goals_total: usize,
    pub goals_completed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoOpEventSink;
    use docket_core::{ActorId, NoOpKV};

    fn test_context() -> ActorContext<ConversationState> {
        let actor_id = ActorId::new("conversations", id::new_conversation_id()).unwrap();
        ActorContext::with_default_state(actor_id, Box::new(NoOpKV))
    }

    fn actor() -> ConversationActor {
        ConversationActor::new(Arc::new(NoOpEventSink))
    }

    async fn create(
        actor: &ConversationActor,
        ctx: &mut ActorContext<ConversationState>,
    ) -> CreateResponse {
        let payload = serde_json::to_vec(&CreateRequest {
            firm_id: Some("firm_1".into()),
            session_id: None,
        })
        .unwrap();
        let response = actor
            .invoke(ctx, ops::CREATE, Bytes::from(payload))
            .await
            .unwrap();
        serde_json::from_slice(&response).unwrap()
    }

    async fn invoke_json<T: DeserializeOwned>(
        actor: &ConversationActor,
        ctx: &mut ActorContext<ConversationState>,
        operation: &str,
        request: &impl Serialize,
    ) -> Result<T> {
        let payload = Bytes::from(serde_json::to_vec(request).unwrap());
        let response = actor.invoke(ctx, operation, payload).await?;
        Ok(serde_json::from_slice(&response).unwrap())
    }

    #[tokio::test]
    async fn test_create_initializes_session() {
        let actor = actor();
        let mut ctx = test_context();

        let created = create(&actor, &mut ctx).await;
        assert_eq!(created.phase, Phase::PreLogin);
        assert!(!created.pre_login_goals.user_identification);
        assert!(!created.pre_login_goals.conflict_check);
        assert!(!created.pre_login_goals.legal_needs_assessment);
        assert!(created.resume_url.contains(&created.resume_token));
        assert_eq!(ctx.state.version, Version::new(1));
    }

    #[tokio::test]
    async fn test_create_requires_firm_id() {
        let actor = actor();
        let mut ctx = test_context();

        let result: Result<CreateResponse> =
            invoke_json(&actor, &mut ctx, ops::CREATE, &CreateRequest::default()).await;
        assert!(matches!(
            result,
            Err(Error::MissingRequiredField { .. })
        ));
    }

    #[tokio::test]
    async fn test_operations_before_create_fail_session_not_found() {
        let actor = actor();
        let mut ctx = test_context();

        let result: Result<ContextResponse> =
            invoke_json(&actor, &mut ctx, ops::GET_CONTEXT, &serde_json::json!({})).await;
        assert!(matches!(result, Err(Error::SessionNotFound { .. })));
    }

    #[tokio::test]
    async fn test_version_increments_by_one_per_mutation() {
        let actor = actor();
        let mut ctx = test_context();
        create(&actor, &mut ctx).await;
        assert_eq!(ctx.state.version.value(), 1);

        let _: AddMessageResponse = invoke_json(
            &actor,
            &mut ctx,
            ops::ADD_MESSAGE,
            &AddMessageRequest {
                role: Some(MessageRole::User),
                content: Some("hello".into()),
                metadata: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(ctx.state.version.value(), 2);

        let _: UserIdentity = invoke_json(
            &actor,
            &mut ctx,
            ops::UPDATE_IDENTITY,
            &UpdateIdentityRequest {
                identity: UserIdentity {
                    names: vec!["John Doe".into()],
                    ..Default::default()
                },
            },
        )
        .await
        .unwrap();
        assert_eq!(ctx.state.version.value(), 3);

        // Reads never bump the version.
        let _: ContextResponse =
            invoke_json(&actor, &mut ctx, ops::GET_CONTEXT, &serde_json::json!({}))
                .await
                .unwrap();
        assert_eq!(ctx.state.version.value(), 3);
    }

    #[tokio::test]
    async fn test_add_message_requires_role_and_content() {
        let actor = actor();
        let mut ctx = test_context();
        create(&actor, &mut ctx).await;

        let result: Result<AddMessageResponse> = invoke_json(
            &actor,
            &mut ctx,
            ops::ADD_MESSAGE,
            &AddMessageRequest {
                role: Some(MessageRole::User),
                content: None,
                metadata: None,
            },
        )
        .await;
        assert!(matches!(result, Err(Error::MissingRequiredField { .. })));
    }

    #[tokio::test]
    async fn test_resume_with_wrong_token_fails_without_mutation() {
        let actor = actor();
        let mut ctx = test_context();
        create(&actor, &mut ctx).await;
        let version_before = ctx.state.version;

        let result: Result<ConversationState> = invoke_json(
            &actor,
            &mut ctx,
            ops::RESUME,
            &ResumeRequest {
                resume_token: "conv-bogus.nope".into(),
                auth0_user_id: None,
            },
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidResumeToken { .. })));
        assert_eq!(ctx.state.version, version_before);
    }

    #[tokio::test]
    async fn test_resume_unsecured_succeeds_for_any_caller() {
        let actor = actor();
        let mut ctx = test_context();
        let created = create(&actor, &mut ctx).await;

        let snapshot: ConversationState = invoke_json(
            &actor,
            &mut ctx,
            ops::RESUME,
            &ResumeRequest {
                resume_token: created.resume_token,
                auth0_user_id: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(snapshot.session_id, created.session_id);
    }

    #[tokio::test]
    async fn test_resume_secured_requires_listed_subject() {
        let actor = actor();
        let mut ctx = test_context();
        let created = create(&actor, &mut ctx).await;

        let _: AuthenticateResponse = invoke_json(
            &actor,
            &mut ctx,
            ops::AUTHENTICATE,
            &AuthenticateRequest {
                auth0_user_id: "auth0|alice".into(),
            },
        )
        .await
        .unwrap();

        // Unknown subject is rejected.
        let result: Result<ConversationState> = invoke_json(
            &actor,
            &mut ctx,
            ops::RESUME,
            &ResumeRequest {
                resume_token: created.resume_token.clone(),
                auth0_user_id: Some("auth0|mallory".into()),
            },
        )
        .await;
        assert!(matches!(result, Err(Error::UnauthorizedAccess { .. })));

        // Anonymous resume of a secured session is rejected too.
        let result: Result<ConversationState> = invoke_json(
            &actor,
            &mut ctx,
            ops::RESUME,
            &ResumeRequest {
                resume_token: created.resume_token.clone(),
                auth0_user_id: None,
            },
        )
        .await;
        assert!(matches!(result, Err(Error::UnauthorizedAccess { .. })));

        // The bound subject gets through.
        let snapshot: ConversationState = invoke_json(
            &actor,
            &mut ctx,
            ops::RESUME,
            &ResumeRequest {
                resume_token: created.resume_token,
                auth0_user_id: Some("auth0|alice".into()),
            },
        )
        .await
        .unwrap();
        assert!(snapshot.is_secured);
    }

    #[tokio::test]
    async fn test_authenticate_is_one_way() {
        let actor = actor();
        let mut ctx = test_context();
        create(&actor, &mut ctx).await;

        let response: AuthenticateResponse = invoke_json(
            &actor,
            &mut ctx,
            ops::AUTHENTICATE,
            &AuthenticateRequest {
                auth0_user_id: "auth0|alice".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(response.phase, Phase::Secured);

        // Same subject re-authenticating is an idempotent success.
        let again: AuthenticateResponse = invoke_json(
            &actor,
            &mut ctx,
            ops::AUTHENTICATE,
            &AuthenticateRequest {
                auth0_user_id: "auth0|alice".into(),
            },
        )
        .await
        .unwrap();
        assert!(again.secured);

        // A different subject cannot take over the session.
        let result: Result<AuthenticateResponse> = invoke_json(
            &actor,
            &mut ctx,
            ops::AUTHENTICATE,
            &AuthenticateRequest {
                auth0_user_id: "auth0|mallory".into(),
            },
        )
        .await;
        assert!(matches!(result, Err(Error::UnauthorizedAccess { .. })));
    }

    #[tokio::test]
    async fn test_conflict_detected_terminates_from_any_phase() {
        for setup_phase in [Phase::PreLogin, Phase::Secured, Phase::DataGathering] {
            let actor = actor();
            let mut ctx = test_context();
            create(&actor, &mut ctx).await;

            if matches!(setup_phase, Phase::Secured | Phase::DataGathering) {
                let _: AuthenticateResponse = invoke_json(
                    &actor,
                    &mut ctx,
                    ops::AUTHENTICATE,
                    &AuthenticateRequest {
                        auth0_user_id: "auth0|alice".into(),
                    },
                )
                .await
                .unwrap();
            }
            if setup_phase == Phase::DataGathering {
                let _: SetConflictResponse = invoke_json(
                    &actor,
                    &mut ctx,
                    ops::SET_CONFLICT_RESULT,
                    &SetConflictRequest {
                        status: ConflictStatus::Clear,
                        details: None,
                        checked_identity: vec![],
                    },
                )
                .await
                .unwrap();
                let _: Vec<Goal> = invoke_json(
                    &actor,
                    &mut ctx,
                    ops::ADD_GOALS,
                    &AddGoalsRequest {
                        goals: vec![GoalSpec {
                            description: "Describe the dispute".into(),
                            priority: GoalPriority::Required,
                            category: "case_details".into(),
                            source: GoalSource::Base,
                            related_conflict_id: None,
                        }],
                    },
                )
                .await
                .unwrap();
                assert_eq!(ctx.state.phase, Phase::DataGathering);
            }

            let response: SetConflictResponse = invoke_json(
                &actor,
                &mut ctx,
                ops::SET_CONFLICT_RESULT,
                &SetConflictRequest {
                    status: ConflictStatus::ConflictDetected,
                    details: Some("adverse party already represented".into()),
                    checked_identity: vec!["Jane Roe".into()],
                },
            )
            .await
            .unwrap();
            assert_eq!(response.phase, Phase::Terminated);
        }
    }

    #[tokio::test]
    async fn test_conflict_clear_advances_secured_session() {
        let actor = actor();
        let mut ctx = test_context();
        create(&actor, &mut ctx).await;

        let _: AuthenticateResponse = invoke_json(
            &actor,
            &mut ctx,
            ops::AUTHENTICATE,
            &AuthenticateRequest {
                auth0_user_id: "auth0|alice".into(),
            },
        )
        .await
        .unwrap();

        let response: SetConflictResponse = invoke_json(
            &actor,
            &mut ctx,
            ops::SET_CONFLICT_RESULT,
            &SetConflictRequest {
                status: ConflictStatus::Clear,
                details: None,
                checked_identity: vec!["Alice Smith".into()],
            },
        )
        .await
        .unwrap();
        assert_eq!(response.phase, Phase::ConflictCheckComplete);
        assert!(ctx.state.pre_login_goals.conflict_check);
    }

    #[tokio::test]
    async fn test_identity_update_flags_identification() {
        let actor = actor();
        let mut ctx = test_context();
        create(&actor, &mut ctx).await;

        let merged: UserIdentity = invoke_json(
            &actor,
            &mut ctx,
            ops::UPDATE_IDENTITY,
            &UpdateIdentityRequest {
                identity: UserIdentity {
                    names: vec!["John Doe".into()],
                    email: Some("john@x.com".into()),
                    ..Default::default()
                },
            },
        )
        .await
        .unwrap();
        assert_eq!(merged.email.as_deref(), Some("john@x.com"));
        assert!(ctx.state.pre_login_goals.user_identification);
    }

    #[tokio::test]
    async fn test_soft_deleted_session_rejects_mutations() {
        let actor = actor();
        let mut ctx = test_context();
        create(&actor, &mut ctx).await;

        let _: MarkDeletedResponse = invoke_json(
            &actor,
            &mut ctx,
            ops::MARK_DELETED,
            &MarkDeletedRequest {
                admin: true,
                deleted_by: "admin@firm.example".into(),
            },
        )
        .await
        .unwrap();

        let result: Result<AddMessageResponse> = invoke_json(
            &actor,
            &mut ctx,
            ops::ADD_MESSAGE,
            &AddMessageRequest {
                role: Some(MessageRole::User),
                content: Some("anyone there?".into()),
                metadata: None,
            },
        )
        .await;
        assert!(matches!(result, Err(Error::SessionDeleted { .. })));

        // Audit reads remain available.
        let state: ConversationState = invoke_json(
            &actor,
            &mut ctx,
            ops::GET_FULL_CONVERSATION,
            &FullConversationRequest { admin: true },
        )
        .await
        .unwrap();
        assert!(state.is_deleted);
        assert_eq!(state.deleted_by.as_deref(), Some("admin@firm.example"));
    }

    #[tokio::test]
    async fn test_full_conversation_requires_admin_marker() {
        let actor = actor();
        let mut ctx = test_context();
        create(&actor, &mut ctx).await;

        let result: Result<ConversationState> = invoke_json(
            &actor,
            &mut ctx,
            ops::GET_FULL_CONVERSATION,
            &FullConversationRequest { admin: false },
        )
        .await;
        assert!(matches!(result, Err(Error::AdminRequired { .. })));
    }

    #[tokio::test]
    async fn test_sync_state_projection() {
        let actor = actor();
        let mut ctx = test_context();
        create(&actor, &mut ctx).await;

        let _: AddMessageResponse = invoke_json(
            &actor,
            &mut ctx,
            ops::ADD_MESSAGE,
            &AddMessageRequest {
                role: Some(MessageRole::User),
                content: Some("My name is John Doe, john@x.com".into()),
                metadata: None,
            },
        )
        .await
        .unwrap();

        let sync: SyncState =
            invoke_json(&actor, &mut ctx, ops::GET_SYNC_STATE, &serde_json::json!({}))
                .await
                .unwrap();
        assert_eq!(sync.do_version.value(), 2);
        assert_eq!(sync.message_count, 1);
        assert_eq!(sync.status, ConversationStatus::Active);
        assert!(sync.last_message_at.is_some());
    }

    #[tokio::test]
    async fn test_events_carry_the_new_version() {
        use std::sync::Mutex;

        #[derive(Default)]
        struct RecordingSink(Mutex<Vec<SyncEvent>>);
        impl SyncEventSink for RecordingSink {
            fn emit(&self, event: SyncEvent) {
                self.0.lock().unwrap().push(event);
            }
        }

        let sink = Arc::new(RecordingSink::default());
        let actor = ConversationActor::new(sink.clone());
        let mut ctx = test_context();
        create(&actor, &mut ctx).await;

        let _: AddMessageResponse = invoke_json(
            &actor,
            &mut ctx,
            ops::ADD_MESSAGE,
            &AddMessageRequest {
                role: Some(MessageRole::Agent),
                content: Some("How can we help?".into()),
                metadata: None,
            },
        )
        .await
        .unwrap();

        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, SyncEventType::Created);
        assert_eq!(events[0].do_version.value(), 1);
        assert_eq!(events[1].event_type, SyncEventType::MessageAdded);
        assert_eq!(events[1].do_version.value(), 2);
    }
}
