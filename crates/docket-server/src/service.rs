//! Conversation service
//!
//! Typed facade over the dispatcher: serializes requests, routes them to
//! the owning actor, and deserializes responses. This is the only place
//! that knows how session ids map to actor ids and how resume tokens are
//! routed.

use async_trait::async_trait;
use bytes::Bytes;
use docket_conversation::{
    ops, AddGoalsRequest, AddMessageRequest, AddMessageResponse, AuthenticateRequest,
    AuthenticateResponse, CompleteGoalRequest, ContextResponse, ConversationState, CreateRequest,
    CreateResponse, FullConversationRequest, Goal, GoalSpec, MarkDeletedRequest,
    MarkDeletedResponse, PhaseResponse, ResumeRequest, SetConflictRequest, SetConflictResponse,
    SyncState, UpdateIdentityRequest, UpdatePreLoginGoalsRequest, UserIdentity,
};
use docket_core::{id, ActorId, Error, Result};
use docket_runtime::DispatcherHandle;
use docket_sync::SyncStateSource;
use serde::{de::DeserializeOwned, Serialize};

/// Namespace all conversation actors live under
const CONVERSATION_NAMESPACE: &str = "conversations";

/// Typed facade over the conversation actor dispatcher
#[derive(Clone)]
pub struct ConversationService {
    dispatcher: DispatcherHandle,
}

impl ConversationService {
    /// Build a service over a dispatcher handle
    pub fn new(dispatcher: DispatcherHandle) -> Self {
        Self { dispatcher }
    }

    fn actor_id(session_id: &str) -> Result<ActorId> {
        ActorId::new(CONVERSATION_NAMESPACE, session_id)
    }

    async fn invoke<Req, Resp>(&self, session_id: &str, operation: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request).map_err(Error::serialization)?;
        let response = self
            .dispatcher
            .invoke(
                Self::actor_id(session_id)?,
                operation.to_string(),
                Bytes::from(payload),
            )
            .await?;
        serde_json::from_slice(&response).map_err(Error::deserialization)
    }

    /// Create a new conversation, minting the session id unless provided
    pub async fn create(
        &self,
        firm_id: String,
        session_id: Option<String>,
    ) -> Result<CreateResponse> {
        if firm_id.is_empty() {
            return Err(Error::missing_field("firm_id"));
        }
        let session_id = session_id.unwrap_or_else(id::new_conversation_id);
        self.invoke(
            &session_id,
            ops::CREATE,
            &CreateRequest {
                firm_id: Some(firm_id),
                session_id: Some(session_id.clone()),
            },
        )
        .await
    }

    /// Resume by token; the token embeds the session id for routing
    pub async fn resume(
        &self,
        resume_token: &str,
        auth0_user_id: Option<String>,
    ) -> Result<ConversationState> {
        let session_id = id::conversation_id_from_token(resume_token).ok_or_else(|| {
            Error::InvalidResumeToken {
                session_id: String::from("unknown"),
            }
        })?;
        self.invoke(
            session_id,
            ops::RESUME,
            &ResumeRequest {
                resume_token: resume_token.to_string(),
                auth0_user_id,
            },
        )
        .await
    }

    /// Append a message
    pub async fn add_message(
        &self,
        session_id: &str,
        request: AddMessageRequest,
    ) -> Result<AddMessageResponse> {
        self.invoke(session_id, ops::ADD_MESSAGE, &request).await
    }

    /// Merge partial identity
    pub async fn update_identity(
        &self,
        session_id: &str,
        identity: UserIdentity,
    ) -> Result<UserIdentity> {
        self.invoke(
            session_id,
            ops::UPDATE_IDENTITY,
            &UpdateIdentityRequest { identity },
        )
        .await
    }

    /// Record pre-login goal progress
    pub async fn update_pre_login_goals(
        &self,
        session_id: &str,
        request: UpdatePreLoginGoalsRequest,
    ) -> Result<docket_conversation::PreLoginGoals> {
        self.invoke(session_id, ops::UPDATE_PRE_LOGIN_GOALS, &request)
            .await
    }

    /// Record that the agent suggested logging in
    pub async fn suggest_login(&self, session_id: &str) -> Result<PhaseResponse> {
        self.invoke(session_id, ops::SUGGEST_LOGIN, &serde_json::json!({}))
            .await
    }

    /// Bind an Auth0 subject, securing the session
    pub async fn authenticate(
        &self,
        session_id: &str,
        auth0_user_id: String,
    ) -> Result<AuthenticateResponse> {
        self.invoke(
            session_id,
            ops::AUTHENTICATE,
            &AuthenticateRequest { auth0_user_id },
        )
        .await
    }

    /// Record a conflict screening outcome
    pub async fn set_conflict_result(
        &self,
        session_id: &str,
        request: SetConflictRequest,
    ) -> Result<SetConflictResponse> {
        self.invoke(session_id, ops::SET_CONFLICT_RESULT, &request)
            .await
    }

    /// Attach data goals
    pub async fn add_goals(&self, session_id: &str, goals: Vec<GoalSpec>) -> Result<Vec<Goal>> {
        self.invoke(session_id, ops::ADD_GOALS, &AddGoalsRequest { goals })
            .await
    }

    /// Flip a goal to completed
    pub async fn complete_goal(
        &self,
        session_id: &str,
        request: CompleteGoalRequest,
    ) -> Result<Goal> {
        self.invoke(session_id, ops::COMPLETE_GOAL, &request).await
    }

    /// Finish the intake
    pub async fn complete(&self, session_id: &str) -> Result<PhaseResponse> {
        self.invoke(session_id, ops::COMPLETE, &serde_json::json!({}))
            .await
    }

    /// Orchestrator context summary
    pub async fn context(&self, session_id: &str) -> Result<ContextResponse> {
        self.invoke(session_id, ops::GET_CONTEXT, &serde_json::json!({}))
            .await
    }

    /// Full state for the admin API; callers must have verified the admin
    /// credential before invoking
    pub async fn full_conversation(&self, session_id: &str) -> Result<ConversationState> {
        self.invoke(
            session_id,
            ops::GET_FULL_CONVERSATION,
            &FullConversationRequest { admin: true },
        )
        .await
    }

    /// Soft-delete; callers must have verified the admin credential
    pub async fn mark_deleted(
        &self,
        session_id: &str,
        deleted_by: String,
    ) -> Result<MarkDeletedResponse> {
        self.invoke(
            session_id,
            ops::MARK_DELETED,
            &MarkDeletedRequest {
                admin: true,
                deleted_by,
            },
        )
        .await
    }

    /// Minimal projection for reconciliation
    pub async fn get_sync_state(&self, session_id: &str) -> Result<SyncState> {
        self.invoke(session_id, ops::GET_SYNC_STATE, &serde_json::json!({}))
            .await
    }
}

#[async_trait]
impl SyncStateSource for ConversationService {
    async fn sync_state(&self, conversation_id: &str) -> Result<SyncState> {
        self.get_sync_state(conversation_id).await
    }
}
