//! Goal tracker server
//!
//! Assesses goal completeness from the transcript plus structured identity,
//! and turns the assessment into a next-action recommendation for the
//! agent orchestrator. The classifier is heuristic keyword matching behind
//! [`GoalCompletionClassifier`], swappable without touching the state
//! machine or the protocol layer.

use crate::server::{ResourceDescriptor, ServerInfo, ToolCallError, ToolDescriptor, ToolProvider};
use async_trait::async_trait;
use docket_conversation::{ConflictStatus, Goal, Phase, UserIdentity};
use docket_core::TRANSCRIPT_LENGTH_BYTES_MAX;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Transcript length at which depth no longer limits confidence
const TRANSCRIPT_DEPTH_TARGET_BYTES: usize = 500;

/// Minimum transcript length before legal-needs goals can complete
const LEGAL_NEEDS_TRANSCRIPT_LENGTH_BYTES_MIN: usize = 80;

/// Weight of goal completion in the confidence blend
const CONFIDENCE_COMPLETION_WEIGHT: f64 = 0.7;

/// Weight of transcript depth in the confidence blend
const CONFIDENCE_DEPTH_WEIGHT: f64 = 0.3;

/// Follow-up questions returned per recommendation
const SUGGESTED_QUESTIONS_COUNT_MAX: usize = 3;

/// Priority goals returned per recommendation
const PRIORITY_GOALS_COUNT_MAX: usize = 3;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}").unwrap());

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?\d[\d\s().\-]{6,}\d").unwrap());

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(my name is|i am|i'm|this is)\s+[a-z]+").unwrap());

static OTHER_PARTY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(against|versus|vs\.?|other party|opposing|defendant|plaintiff|my (employer|landlord|ex[\- ]?(husband|wife|partner)))\b")
        .unwrap()
});

static LOCATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(county|city of|state of|district of)\b").unwrap());

/// Legal-area keywords for the needs-assessment heuristic
const LEGAL_AREA_KEYWORDS: &[&str] = &[
    "divorce",
    "custody",
    "contract",
    "lawsuit",
    "sue",
    "sued",
    "injury",
    "accident",
    "employment",
    "fired",
    "landlord",
    "tenant",
    "eviction",
    "estate",
    "will",
    "probate",
    "bankruptcy",
    "immigration",
    "visa",
    "criminal",
    "dui",
    "discrimination",
    "harassment",
    "breach",
    "negligence",
];

/// Per-goal verdict from a classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalSignal {
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocker: Option<String>,
}

/// Classifier seam; the default is keyword matching, not a learned model
pub trait GoalCompletionClassifier: Send + Sync {
    /// Judge one goal against the lowercase transcript and structured
    /// identity. Must be deterministic for identical inputs.
    fn classify(&self, goal: &Goal, transcript: &str, identity: &UserIdentity) -> GoalSignal;
}

/// Default heuristic classifier
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    fn classify_identification(&self, transcript: &str, identity: &UserIdentity) -> GoalSignal {
        if identity.is_identified() {
            return GoalSignal {
                completed: true,
                blocker: None,
            };
        }
        let has_name = !identity.names.is_empty() || NAME_RE.is_match(transcript);
        let has_contact = identity.email.is_some()
            || identity.phone.is_some()
            || EMAIL_RE.is_match(transcript)
            || PHONE_RE.is_match(transcript);
        if has_name && has_contact {
            return GoalSignal {
                completed: true,
                blocker: None,
            };
        }
        GoalSignal {
            completed: false,
            blocker: Some(if has_name {
                "no contact channel (email or phone) provided".into()
            } else {
                "client name not provided".into()
            }),
        }
    }

    fn classify_legal_needs(&self, transcript: &str) -> GoalSignal {
        let has_area = LEGAL_AREA_KEYWORDS
            .iter()
            .any(|keyword| transcript.contains(keyword));
        if has_area && transcript.len() >= LEGAL_NEEDS_TRANSCRIPT_LENGTH_BYTES_MIN {
            return GoalSignal {
                completed: true,
                blocker: None,
            };
        }
        GoalSignal {
            completed: false,
            blocker: Some(if has_area {
                "matter description too brief to assess".into()
            } else {
                "no legal area mentioned yet".into()
            }),
        }
    }

    fn classify_conflict_readiness(
        &self,
        transcript: &str,
        identity: &UserIdentity,
    ) -> GoalSignal {
        let has_party = OTHER_PARTY_RE.is_match(transcript) || !identity.companies.is_empty();
        let has_location = LOCATION_RE.is_match(transcript) || !identity.addresses.is_empty();
        if has_party || has_location {
            return GoalSignal {
                completed: true,
                blocker: None,
            };
        }
        GoalSignal {
            completed: false,
            blocker: Some("no opposing party or location named yet".into()),
        }
    }

    fn classify_generic(&self, goal: &Goal, transcript: &str) -> GoalSignal {
        // Fall back to description keywords: completed when at least two
        // significant words from the goal show up in the transcript.
        let matched = goal
            .description
            .to_lowercase()
            .split_whitespace()
            .filter(|word| word.len() > 3)
            .filter(|word| transcript.contains(word))
            .count();
        GoalSignal {
            completed: matched >= 2,
            blocker: None,
        }
    }
}

impl GoalCompletionClassifier for KeywordClassifier {
    fn classify(&self, goal: &Goal, transcript: &str, identity: &UserIdentity) -> GoalSignal {
        match goal.category.as_str() {
            "user_identification" | "identification" | "contact_info" => {
                self.classify_identification(transcript, identity)
            }
            "legal_needs_assessment" | "legal_needs" | "case_details" => {
                self.classify_legal_needs(transcript)
            }
            "conflict_check" | "conflict_readiness" | "other_parties" => {
                self.classify_conflict_readiness(transcript, identity)
            }
            _ => self.classify_generic(goal, transcript),
        }
    }
}

// =============================================================================
// Tool payloads
// =============================================================================

/// One transcript entry as the orchestrator sends it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    #[serde(default)]
    pub role: Option<String>,
    pub content: String,
}

/// Parameters for `assess_goals`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessGoalsParams {
    #[serde(default)]
    pub conversation_history: Vec<HistoryMessage>,
    #[serde(default)]
    pub current_goals: Vec<Goal>,
    #[serde(default)]
    pub user_identity: UserIdentity,
}

/// Result of `assess_goals`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalAssessment {
    pub completed_goals: Vec<String>,
    pub incomplete_goals: Vec<String>,
    pub blockers: Vec<String>,
    pub ready_for_next_phase: bool,
    pub confidence: f64,
    pub reasoning: String,
}

/// Parameters for `get_agent_recommendations`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationParams {
    pub current_phase: Phase,
    #[serde(default)]
    pub ready_for_next_phase: bool,
    #[serde(default)]
    pub incomplete_goals: Vec<Goal>,
    #[serde(default)]
    pub conflict_status: ConflictStatus,
}

/// Next action for the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentAction {
    CompleteConversation,
    SuggestLogin,
    SearchAdditionalGoals,
    ContinueGathering,
}

/// Result of `get_agent_recommendations`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: AgentAction,
    pub reasoning: String,
    pub priority_goals: Vec<Goal>,
    pub suggested_questions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_phase: Option<Phase>,
}

// =============================================================================
// Assessment
// =============================================================================

/// Join, lowercase, and bound the transcript
fn build_transcript(history: &[HistoryMessage]) -> String {
    let mut transcript = history
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase();
    if transcript.len() > TRANSCRIPT_LENGTH_BYTES_MAX {
        // Back off to a character boundary before cutting.
        let mut cut = TRANSCRIPT_LENGTH_BYTES_MAX;
        while !transcript.is_char_boundary(cut) {
            cut -= 1;
        }
        transcript.truncate(cut);
    }
    transcript
}

/// Assess every goal against the transcript and identity.
///
/// Deterministic: identical inputs always yield identical output.
pub fn assess_goals(
    params: &AssessGoalsParams,
    classifier: &dyn GoalCompletionClassifier,
) -> GoalAssessment {
    let transcript = build_transcript(&params.conversation_history);

    let mut completed_goals = Vec::new();
    let mut incomplete_goals = Vec::new();
    let mut blockers = Vec::new();
    let mut blocking_incomplete = 0usize;

    for goal in &params.current_goals {
        let signal = if goal.completed {
            GoalSignal {
                completed: true,
                blocker: None,
            }
        } else {
            classifier.classify(goal, &transcript, &params.user_identity)
        };

        if signal.completed {
            completed_goals.push(goal.id.clone());
        } else {
            if goal.priority.is_blocking() {
                blocking_incomplete += 1;
            }
            if let Some(blocker) = signal.blocker {
                blockers.push(format!("{}: {}", goal.id, blocker));
            }
            incomplete_goals.push(goal.id.clone());
        }
    }

    let total = params.current_goals.len();
    let completion_ratio = if total == 0 {
        1.0
    } else {
        completed_goals.len() as f64 / total as f64
    };
    let depth_ratio = (transcript.len() as f64 / TRANSCRIPT_DEPTH_TARGET_BYTES as f64).min(1.0);
    let confidence =
        CONFIDENCE_COMPLETION_WEIGHT * completion_ratio + CONFIDENCE_DEPTH_WEIGHT * depth_ratio;

    let ready_for_next_phase = blocking_incomplete == 0;
    let reasoning = format!(
        "{} of {} goals complete; {} blocking goals outstanding; transcript depth {:.0}%",
        completed_goals.len(),
        total,
        blocking_incomplete,
        depth_ratio * 100.0
    );

    GoalAssessment {
        completed_goals,
        incomplete_goals,
        blockers,
        ready_for_next_phase,
        confidence,
        reasoning,
    }
}

/// Templated follow-up question for a goal category
fn question_for(goal: &Goal) -> String {
    match goal.category.as_str() {
        "user_identification" | "identification" | "contact_info" => {
            "Could you share your full name and the best way to reach you?".into()
        }
        "legal_needs_assessment" | "legal_needs" | "case_details" => {
            "Can you describe what happened and when?".into()
        }
        "conflict_check" | "conflict_readiness" | "other_parties" => {
            "Who else is involved in this matter?".into()
        }
        "documents" => "Do you have any documents related to this matter?".into(),
        "conflict_resolution" => goal.description.clone(),
        _ => format!("Can you tell us more about {}?", goal.description.to_lowercase()),
    }
}

/// Ordered decision table over phase, goal readiness, and conflict status
pub fn get_agent_recommendations(params: &RecommendationParams) -> Recommendation {
    if params.conflict_status == ConflictStatus::ConflictDetected {
        return Recommendation {
            action: AgentAction::CompleteConversation,
            reasoning: "conflict detected; the conversation must stop".into(),
            priority_goals: vec![],
            suggested_questions: vec![],
            next_phase: None,
        };
    }

    if params.ready_for_next_phase && params.current_phase == Phase::PreLogin {
        return Recommendation {
            action: AgentAction::SuggestLogin,
            reasoning: "pre-login goals complete; invite the client to log in".into(),
            priority_goals: vec![],
            suggested_questions: vec![],
            next_phase: Some(Phase::LoginSuggested),
        };
    }

    if params.ready_for_next_phase && params.current_phase == Phase::Secured {
        return Recommendation {
            action: AgentAction::SearchAdditionalGoals,
            reasoning: "secured session with goals complete; look for supplementary goals".into(),
            priority_goals: vec![],
            suggested_questions: vec![],
            next_phase: None,
        };
    }

    let mut priority_goals = params.incomplete_goals.clone();
    priority_goals.sort_by_key(|goal| goal.priority.weight());
    priority_goals.truncate(PRIORITY_GOALS_COUNT_MAX);

    let suggested_questions = priority_goals
        .iter()
        .map(question_for)
        .take(SUGGESTED_QUESTIONS_COUNT_MAX)
        .collect();

    Recommendation {
        action: AgentAction::ContinueGathering,
        reasoning: format!(
            "{} goals incomplete; keep gathering information",
            params.incomplete_goals.len()
        ),
        priority_goals,
        suggested_questions,
        next_phase: None,
    }
}

// =============================================================================
// Server
// =============================================================================

/// Goal tracker tool server
pub struct GoalTrackerServer {
    classifier: Arc<dyn GoalCompletionClassifier>,
}

impl GoalTrackerServer {
    /// Server with the default keyword classifier
    pub fn new() -> Self {
        Self {
            classifier: Arc::new(KeywordClassifier),
        }
    }

    /// Server with a custom classifier
    pub fn with_classifier(classifier: Arc<dyn GoalCompletionClassifier>) -> Self {
        Self { classifier }
    }
}

impl Default for GoalTrackerServer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolProvider for GoalTrackerServer {
    fn info(&self) -> ServerInfo {
        ServerInfo {
            name: "docket-goal-tracker".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor {
                name: "assess_goals".into(),
                description: "Assess which intake goals the conversation has completed".into(),
                input_schema: json!({
                    "type": "object",
                    "required": ["current_goals"],
                    "properties": {
                        "conversation_history": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["content"],
                                "properties": {
                                    "role": {"type": "string"},
                                    "content": {"type": "string"}
                                }
                            }
                        },
                        "current_goals": {"type": "array"},
                        "user_identity": {"type": "object"}
                    }
                }),
            },
            ToolDescriptor {
                name: "get_agent_recommendations".into(),
                description: "Recommend the orchestrator's next action for this conversation"
                    .into(),
                input_schema: json!({
                    "type": "object",
                    "required": ["current_phase"],
                    "properties": {
                        "current_phase": {"type": "string"},
                        "ready_for_next_phase": {"type": "boolean"},
                        "incomplete_goals": {"type": "array"},
                        "conflict_status": {"type": "string"}
                    }
                }),
            },
        ]
    }

    fn resources(&self) -> Vec<ResourceDescriptor> {
        vec![ResourceDescriptor {
            uri: "docket://goal-tracker/categories".into(),
            name: "goal-categories".into(),
            description: "Goal categories the classifier understands".into(),
            mime_type: "application/json".into(),
        }]
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolCallError> {
        match name {
            "assess_goals" => {
                let params: AssessGoalsParams = serde_json::from_value(arguments).map_err(
                    |err| ToolCallError::InvalidArguments {
                        tool: name.to_string(),
                        reason: err.to_string(),
                    },
                )?;
                let assessment = assess_goals(&params, self.classifier.as_ref());
                serde_json::to_value(assessment).map_err(|err| ToolCallError::Internal {
                    tool: name.to_string(),
                    reason: err.to_string(),
                })
            }
            "get_agent_recommendations" => {
                let params: RecommendationParams = serde_json::from_value(arguments).map_err(
                    |err| ToolCallError::InvalidArguments {
                        tool: name.to_string(),
                        reason: err.to_string(),
                    },
                )?;
                let recommendation = get_agent_recommendations(&params);
                serde_json::to_value(recommendation).map_err(|err| ToolCallError::Internal {
                    tool: name.to_string(),
                    reason: err.to_string(),
                })
            }
            other => Err(ToolCallError::NotFound {
                name: other.to_string(),
            }),
        }
    }

    fn read_resource(&self, uri: &str) -> Option<Value> {
        (uri == "docket://goal-tracker/categories").then(|| {
            json!({
                "categories": [
                    "user_identification",
                    "legal_needs_assessment",
                    "conflict_check",
                    "case_details",
                    "other_parties",
                    "documents",
                    "conflict_resolution"
                ]
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_conversation::{GoalPriority, GoalSource};

    fn goal(id: &str, category: &str, priority: GoalPriority) -> Goal {
        Goal {
            id: id.into(),
            description: format!("Collect {}", category),
            priority,
            category: category.into(),
            completed: false,
            completion_data: None,
            source: GoalSource::Base,
            related_conflict_id: None,
        }
    }

    fn history(lines: &[&str]) -> Vec<HistoryMessage> {
        lines
            .iter()
            .map(|line| HistoryMessage {
                role: Some("user".into()),
                content: line.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_identification_goal_completes_from_transcript() {
        let params = AssessGoalsParams {
            conversation_history: history(&["My name is John Doe, john@x.com"]),
            current_goals: vec![goal("goal-ident", "user_identification", GoalPriority::Critical)],
            user_identity: UserIdentity::default(),
        };
        let assessment = assess_goals(&params, &KeywordClassifier);

        assert_eq!(assessment.completed_goals, vec!["goal-ident"]);
        assert!(assessment.ready_for_next_phase);
    }

    #[test]
    fn test_identification_goal_blocked_without_contact() {
        let params = AssessGoalsParams {
            conversation_history: history(&["My name is John Doe"]),
            current_goals: vec![goal("goal-ident", "user_identification", GoalPriority::Critical)],
            user_identity: UserIdentity::default(),
        };
        let assessment = assess_goals(&params, &KeywordClassifier);

        assert!(assessment.completed_goals.is_empty());
        assert!(!assessment.ready_for_next_phase);
        assert_eq!(assessment.blockers.len(), 1);
        assert!(assessment.blockers[0].contains("contact"));
    }

    #[test]
    fn test_legal_needs_requires_area_and_depth() {
        let too_brief = AssessGoalsParams {
            conversation_history: history(&["divorce"]),
            current_goals: vec![goal("goal-legal", "legal_needs_assessment", GoalPriority::Required)],
            user_identity: UserIdentity::default(),
        };
        let assessment = assess_goals(&too_brief, &KeywordClassifier);
        assert!(assessment.completed_goals.is_empty());

        let detailed = AssessGoalsParams {
            conversation_history: history(&[
                "I need help with a divorce. My spouse and I separated last March and \
                 we disagree about custody of our two children and the house.",
            ]),
            current_goals: vec![goal("goal-legal", "legal_needs_assessment", GoalPriority::Required)],
            user_identity: UserIdentity::default(),
        };
        let assessment = assess_goals(&detailed, &KeywordClassifier);
        assert_eq!(assessment.completed_goals, vec!["goal-legal"]);
    }

    #[test]
    fn test_conflict_readiness_detects_other_party() {
        let params = AssessGoalsParams {
            conversation_history: history(&["I want to file against my employer, Initech Inc."]),
            current_goals: vec![goal("goal-conflict", "conflict_check", GoalPriority::Required)],
            user_identity: UserIdentity::default(),
        };
        let assessment = assess_goals(&params, &KeywordClassifier);
        assert_eq!(assessment.completed_goals, vec!["goal-conflict"]);
    }

    #[test]
    fn test_assessment_is_deterministic() {
        let params = AssessGoalsParams {
            conversation_history: history(&["My name is Jane Roe, jane@roe.example, suing Acme"]),
            current_goals: vec![
                goal("goal-ident", "user_identification", GoalPriority::Critical),
                goal("goal-legal", "legal_needs_assessment", GoalPriority::Required),
            ],
            user_identity: UserIdentity::default(),
        };

        let first = assess_goals(&params, &KeywordClassifier);
        let second = assess_goals(&params, &KeywordClassifier);
        assert_eq!(first.completed_goals, second.completed_goals);
        assert_eq!(first.incomplete_goals, second.incomplete_goals);
        assert_eq!(first.confidence, second.confidence);
    }

    #[test]
    fn test_confidence_blend() {
        // No goals and an empty transcript: completion ratio 1.0, depth 0.
        let params = AssessGoalsParams {
            conversation_history: vec![],
            current_goals: vec![],
            user_identity: UserIdentity::default(),
        };
        let assessment = assess_goals(&params, &KeywordClassifier);
        assert!((assessment.confidence - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ready_ignores_non_blocking_goals() {
        let params = AssessGoalsParams {
            conversation_history: history(&["My name is Jane Roe, jane@roe.example"]),
            current_goals: vec![
                goal("goal-ident", "user_identification", GoalPriority::Critical),
                goal("goal-extra", "documents", GoalPriority::Optional),
            ],
            user_identity: UserIdentity::default(),
        };
        let assessment = assess_goals(&params, &KeywordClassifier);
        assert!(assessment.ready_for_next_phase);
        assert_eq!(assessment.incomplete_goals, vec!["goal-extra"]);
    }

    #[test]
    fn test_recommendation_conflict_overrides_everything() {
        let recommendation = get_agent_recommendations(&RecommendationParams {
            current_phase: Phase::Secured,
            ready_for_next_phase: true,
            incomplete_goals: vec![],
            conflict_status: ConflictStatus::ConflictDetected,
        });
        assert_eq!(recommendation.action, AgentAction::CompleteConversation);
    }

    #[test]
    fn test_recommendation_suggest_login_from_pre_login() {
        let recommendation = get_agent_recommendations(&RecommendationParams {
            current_phase: Phase::PreLogin,
            ready_for_next_phase: true,
            incomplete_goals: vec![],
            conflict_status: ConflictStatus::Pending,
        });
        assert_eq!(recommendation.action, AgentAction::SuggestLogin);
        assert_eq!(recommendation.next_phase, Some(Phase::LoginSuggested));
    }

    #[test]
    fn test_recommendation_search_additional_when_secured_and_ready() {
        let recommendation = get_agent_recommendations(&RecommendationParams {
            current_phase: Phase::Secured,
            ready_for_next_phase: true,
            incomplete_goals: vec![],
            conflict_status: ConflictStatus::Clear,
        });
        assert_eq!(recommendation.action, AgentAction::SearchAdditionalGoals);
    }

    #[test]
    fn test_recommendation_continue_gathering_picks_top_three() {
        let recommendation = get_agent_recommendations(&RecommendationParams {
            current_phase: Phase::PreLogin,
            ready_for_next_phase: false,
            incomplete_goals: vec![
                goal("goal-opt", "documents", GoalPriority::Optional),
                goal("goal-crit", "user_identification", GoalPriority::Critical),
                goal("goal-imp", "other_parties", GoalPriority::Important),
                goal("goal-req", "case_details", GoalPriority::Required),
            ],
            conflict_status: ConflictStatus::Pending,
        });

        assert_eq!(recommendation.action, AgentAction::ContinueGathering);
        let ids: Vec<&str> = recommendation
            .priority_goals
            .iter()
            .map(|g| g.id.as_str())
            .collect();
        assert_eq!(ids, vec!["goal-crit", "goal-req", "goal-imp"]);
        assert_eq!(recommendation.suggested_questions.len(), 3);
    }
}
