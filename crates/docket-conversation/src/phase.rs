//! Intake phase state machine
//!
//! Explicit transition table; no transition happens outside it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Conversation phase
///
/// Phases advance monotonically through the intake funnel. `Terminated` is
/// reachable from any non-terminal phase (a detected conflict forces it);
/// `Completed` and `Terminated` are absorbing.
///
/// ```text
/// pre_login -> login_suggested -> secured -> conflict_check_complete
///     |               |              |                |
///     |               |              |                v
///     |               |              |          data_gathering -> completed
///     |               |              |                |
///     +---------------+--------------+----------------+--> terminated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Anonymous visitor, identity and conflict status unknown
    #[default]
    PreLogin,
    /// Enough pre-login progress that the agent suggested logging in
    LoginSuggested,
    /// An Auth0 subject has been bound to the session
    Secured,
    /// Conflict screening came back clear for the bound identity
    ConflictCheckComplete,
    /// Collecting matter details against the goal list
    DataGathering,
    /// Intake finished, handed to firm staff
    Completed,
    /// Conversation stopped, normally by conflict detection
    Terminated,
}

impl Phase {
    /// Check if a transition is allowed by the state machine
    pub fn can_transition_to(&self, next: Phase) -> bool {
        match (self, next) {
            // Forward edges, one funnel step at a time
            (Phase::PreLogin, Phase::LoginSuggested) => true,
            // Authentication may arrive without a prior suggestion
            (Phase::PreLogin, Phase::Secured) => true,
            (Phase::LoginSuggested, Phase::Secured) => true,
            (Phase::Secured, Phase::ConflictCheckComplete) => true,
            (Phase::ConflictCheckComplete, Phase::DataGathering) => true,
            (Phase::DataGathering, Phase::Completed) => true,
            // A detected conflict terminates from any non-terminal phase
            (from, Phase::Terminated) => !from.is_terminal(),
            // Same phase is allowed (no change)
            _ if *self == next => true,
            _ => false,
        }
    }

    /// Whether this phase accepts no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Terminated)
    }

    /// Coarse status for the admin index, derived from the phase
    pub fn status(&self) -> ConversationStatus {
        match self {
            Phase::Completed => ConversationStatus::Completed,
            Phase::Terminated => ConversationStatus::Terminated,
            _ => ConversationStatus::Active,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::PreLogin => "pre_login",
            Phase::LoginSuggested => "login_suggested",
            Phase::Secured => "secured",
            Phase::ConflictCheckComplete => "conflict_check_complete",
            Phase::DataGathering => "data_gathering",
            Phase::Completed => "completed",
            Phase::Terminated => "terminated",
        };
        write!(f, "{}", s)
    }
}

/// Coarse conversation status derived from the phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Completed,
    Terminated,
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Completed => "completed",
            ConversationStatus::Terminated => "terminated",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_PHASES: [Phase; 7] = [
        Phase::PreLogin,
        Phase::LoginSuggested,
        Phase::Secured,
        Phase::ConflictCheckComplete,
        Phase::DataGathering,
        Phase::Completed,
        Phase::Terminated,
    ];

    #[test]
    fn test_forward_edges() {
        assert!(Phase::PreLogin.can_transition_to(Phase::LoginSuggested));
        assert!(Phase::LoginSuggested.can_transition_to(Phase::Secured));
        assert!(Phase::Secured.can_transition_to(Phase::ConflictCheckComplete));
        assert!(Phase::ConflictCheckComplete.can_transition_to(Phase::DataGathering));
        assert!(Phase::DataGathering.can_transition_to(Phase::Completed));
    }

    #[test]
    fn test_no_skipping_conflict_check() {
        // secured cannot reach data_gathering without passing through
        // conflict_check_complete
        assert!(!Phase::Secured.can_transition_to(Phase::DataGathering));
        assert!(!Phase::Secured.can_transition_to(Phase::Completed));
        assert!(!Phase::PreLogin.can_transition_to(Phase::DataGathering));
    }

    #[test]
    fn test_no_backward_edges() {
        assert!(!Phase::Secured.can_transition_to(Phase::PreLogin));
        assert!(!Phase::DataGathering.can_transition_to(Phase::Secured));
    }

    #[test]
    fn test_terminated_reachable_from_any_non_terminal() {
        for phase in ALL_PHASES {
            if phase.is_terminal() {
                continue;
            }
            assert!(
                phase.can_transition_to(Phase::Terminated),
                "{} should reach terminated",
                phase
            );
        }
    }

    #[test]
    fn test_terminal_phases_are_absorbing() {
        for next in ALL_PHASES {
            if next == Phase::Completed {
                continue;
            }
            assert!(!Phase::Completed.can_transition_to(next) || next == Phase::Completed);
        }
        assert!(!Phase::Terminated.can_transition_to(Phase::PreLogin));
        assert!(!Phase::Completed.can_transition_to(Phase::Terminated));
        assert!(!Phase::Terminated.can_transition_to(Phase::Completed));
    }

    #[test]
    fn test_status_derivation() {
        assert_eq!(Phase::PreLogin.status(), ConversationStatus::Active);
        assert_eq!(Phase::DataGathering.status(), ConversationStatus::Active);
        assert_eq!(Phase::Completed.status(), ConversationStatus::Completed);
        assert_eq!(Phase::Terminated.status(), ConversationStatus::Terminated);
    }

    #[test]
    fn test_serde_wire_names() {
        assert_eq!(
            serde_json::to_string(&Phase::ConflictCheckComplete).unwrap(),
            "\"conflict_check_complete\""
        );
        let parsed: Phase = serde_json::from_str("\"pre_login\"").unwrap();
        assert_eq!(parsed, Phase::PreLogin);
    }
}
