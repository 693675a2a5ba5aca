//! Conversation state models
//!
//! `ConversationState` is owned exclusively by one actor instance; nothing
//! else writes it. All wire enums use snake_case names.

use crate::phase::Phase;
use chrono::{DateTime, Utc};
use docket_core::{id, Version};
use serde::{Deserialize, Serialize};

// =============================================================================
// Messages
// =============================================================================

/// Role of a conversation message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Agent,
}

/// One conversation message, append-only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

// =============================================================================
// Goals
// =============================================================================

/// Goal priority; critical and required goals gate phase transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalPriority {
    Critical,
    Required,
    Important,
    Optional,
}

impl GoalPriority {
    /// Numeric weight for ranking (lower is more urgent)
    pub fn weight(&self) -> u8 {
        match self {
            GoalPriority::Critical => 1,
            GoalPriority::Required => 2,
            GoalPriority::Important => 3,
            GoalPriority::Optional => 4,
        }
    }

    /// Whether this goal must be complete before phase advancement
    pub fn is_blocking(&self) -> bool {
        matches!(self, GoalPriority::Critical | GoalPriority::Required)
    }
}

/// Where a goal came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalSource {
    Base,
    Additional,
    ConflictChecker,
    Manual,
}

/// A unit of information the intake must collect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub description: String,
    pub priority: GoalPriority,
    pub category: String,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_data: Option<serde_json::Value>,
    pub source: GoalSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_conflict_id: Option<String>,
}

/// Fixed pre-login goal flags, all false at creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreLoginGoals {
    pub user_identification: bool,
    pub conflict_check: bool,
    pub legal_needs_assessment: bool,
}

impl PreLoginGoals {
    /// All three pre-login goals complete
    pub fn all_complete(&self) -> bool {
        self.user_identification && self.conflict_check && self.legal_needs_assessment
    }
}

// =============================================================================
// Identity
// =============================================================================

/// Partial client identity, merged (never replaced) on update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub companies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
}

impl UserIdentity {
    /// Shallow-merge another partial identity into this one.
    ///
    /// Scalar fields are replaced when the incoming value is present; list
    /// fields are unioned, preserving first-seen order.
    pub fn merge(&mut self, incoming: UserIdentity) {
        merge_list(&mut self.names, incoming.names);
        merge_list(&mut self.companies, incoming.companies);
        merge_list(&mut self.addresses, incoming.addresses);
        if incoming.email.is_some() {
            self.email = incoming.email;
        }
        if incoming.phone.is_some() {
            self.phone = incoming.phone;
        }
        if incoming.employer.is_some() {
            self.employer = incoming.employer;
        }
        if incoming.date_of_birth.is_some() {
            self.date_of_birth = incoming.date_of_birth;
        }
    }

    /// Whether any of name/email/phone is known
    pub fn has_core_contact(&self) -> bool {
        !self.names.is_empty() || self.email.is_some() || self.phone.is_some()
    }

    /// Whether the identity is sufficient to mark user identification done:
    /// a name plus at least one contact channel
    pub fn is_identified(&self) -> bool {
        !self.names.is_empty() && (self.email.is_some() || self.phone.is_some())
    }

    /// Primary display name, if any
    pub fn primary_name(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }
}

fn merge_list(target: &mut Vec<String>, incoming: Vec<String>) {
    for item in incoming {
        if !target.iter().any(|existing| existing == &item) {
            target.push(item);
        }
    }
}

// =============================================================================
// Conflict check
// =============================================================================

/// Result status of conflict screening
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    #[default]
    Pending,
    Clear,
    ConflictDetected,
}

/// Conflict screening record on the conversation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConflictCheck {
    pub status: ConflictStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checked_identity: Vec<String>,
}

// =============================================================================
// Conversation state
// =============================================================================

/// Full state of one intake conversation
///
/// The identity triple is immutable after creation; `version` increments by
/// exactly one on every mutating operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    pub session_id: String,
    pub user_id: String,
    pub firm_id: String,

    pub phase: Phase,
    pub is_authenticated: bool,
    pub is_secured: bool,
    pub resume_token: String,

    pub pre_login_goals: PreLoginGoals,
    pub user_identity: UserIdentity,
    pub conflict_check: ConflictCheck,

    #[serde(default)]
    pub data_goals: Vec<Goal>,
    #[serde(default)]
    pub completed_goals: Vec<Goal>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub allowed_auth0_users: Vec<String>,

    pub version: Version,

    pub is_deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
}

impl ConversationState {
    /// Initialize state for a new session
    pub fn initialize(firm_id: String, session_id: String, now: DateTime<Utc>) -> Self {
        let resume_token = id::new_resume_token(&session_id);
        Self {
            user_id: id::new_user_id(),
            session_id,
            firm_id,
            phase: Phase::PreLogin,
            resume_token,
            created_at: Some(now),
            last_activity: Some(now),
            ..Default::default()
        }
    }

    /// Whether `create` has run for this actor
    pub fn is_initialized(&self) -> bool {
        !self.session_id.is_empty()
    }

    /// Bump the state version by exactly one
    pub fn bump_version(&mut self) -> Version {
        self.version = self.version.increment();
        self.version
    }

    /// Attempt a phase transition, enforcing the transition table
    pub fn transition_to(&mut self, next: Phase) -> docket_core::Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(docket_core::Error::InvalidPhaseTransition {
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }
        self.phase = next;
        Ok(())
    }

    /// Total goals ever attached (open plus completed)
    pub fn goals_total(&self) -> usize {
        self.data_goals.len() + self.completed_goals.len()
    }

    /// Timestamp of the newest message
    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.messages.last().map(|m| m.timestamp)
    }

    /// Flip a goal to completed, moving it to the completed list.
    ///
    /// Returns false if no open goal has the id.
    pub fn complete_goal(
        &mut self,
        goal_id: &str,
        completion_data: Option<serde_json::Value>,
    ) -> bool {
        let Some(index) = self.data_goals.iter().position(|g| g.id == goal_id) else {
            return false;
        };
        let mut goal = self.data_goals.remove(index);
        goal.completed = true;
        goal.completion_data = completion_data;
        self.completed_goals.push(goal);
        true
    }
}
