//! Conflict checker server
//!
//! Screens a prospective client's identity against the firm's existing
//! matters through parallel semantic-search queries. Absence of matches is
//! a confident "clear"; a strong match stops the conversation; anything in
//! between stays `pending` and drives further questions rather than an
//! error.

use crate::search::{SearchHit, SearchQuery, SemanticSearch};
use crate::server::{ResourceDescriptor, ServerInfo, ToolCallError, ToolDescriptor, ToolProvider};
use async_trait::async_trait;
use docket_conversation::{ConflictStatus, GoalPriority, GoalSource, GoalSpec, UserIdentity};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Matches below this score are discarded
const CONFLICT_SCORE_FLOOR: f64 = 0.7;

/// A match above this confidence means a conflict is detected
const CONFLICT_DETECTED_THRESHOLD: f64 = 0.8;

/// Score above which a match counts as exact
const MATCH_EXACT_THRESHOLD: f64 = 0.9;

/// Score above which a match counts as fuzzy (else semantic)
const MATCH_FUZZY_THRESHOLD: f64 = 0.8;

/// Results requested per field query
const CONFLICT_SEARCH_TOP_K: usize = 5;

/// How a conflict entry matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Fuzzy,
    Semantic,
}

impl MatchType {
    fn from_score(score: f64) -> Self {
        if score > MATCH_EXACT_THRESHOLD {
            MatchType::Exact
        } else if score > MATCH_FUZZY_THRESHOLD {
            MatchType::Fuzzy
        } else {
            MatchType::Semantic
        }
    }
}

/// One matched conflict entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictMatch {
    pub conflict_entry_id: String,
    pub matched_fields: Vec<String>,
    pub match_type: MatchType,
    pub confidence: f64,
    pub conflict_details: String,
    pub suggested_goals: Vec<GoalSpec>,
}

/// Next step after screening
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictRecommendation {
    AttorneyHandoff,
    GatherMoreInfo,
    Proceed,
}

/// Full screening result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckResult {
    pub status: ConflictStatus,
    pub matches: Vec<ConflictMatch>,
    /// Confidence that no conflict exists: `1 - max(match confidence)`
    pub confidence: f64,
    pub stop_conversation: bool,
    pub recommendation: ConflictRecommendation,
    /// True when a search query failed and absence of matches is untrusted
    pub degraded: bool,
    pub checked_identity: Vec<String>,
}

/// Parameters for `check_conflicts`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConflictsParams {
    pub firm_id: String,
    #[serde(default)]
    pub user_identity: UserIdentity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_context: Option<String>,
}

/// Parameters for `analyze_conflict_resolution`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResolutionParams {
    pub user_response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_conflict_id: Option<String>,
}

/// Resolution strategy after a disambiguation answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    ImmediateStop,
    ProceedWithCaution,
}

/// Result of `analyze_conflict_resolution`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub strategy: ResolutionStrategy,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_conflict_id: Option<String>,
}

/// Affirmation keywords for the resolution classifier
const AFFIRMATION_KEYWORDS: &[&str] = &[
    "yes", "yeah", "yep", "same", "involved", "correct", "that's me", "i am", "i was",
];

struct FieldQuery {
    field: &'static str,
    query: SearchQuery,
}

fn build_queries(params: &CheckConflictsParams) -> Vec<FieldQuery> {
    let mut queries = Vec::new();
    let scoped = |text: &str| {
        SearchQuery::new(text, CONFLICT_SEARCH_TOP_K).with_filter("firm_id", &params.firm_id)
    };

    for name in &params.user_identity.names {
        queries.push(FieldQuery {
            field: "name",
            query: scoped(name).with_filter("field", "name"),
        });
    }
    if let Some(email) = &params.user_identity.email {
        queries.push(FieldQuery {
            field: "email",
            query: scoped(email).with_filter("field", "email"),
        });
    }
    for company in &params.user_identity.companies {
        queries.push(FieldQuery {
            field: "company",
            query: scoped(company).with_filter("field", "company"),
        });
    }
    if let Some(context) = &params.conversation_context {
        if !context.is_empty() {
            queries.push(FieldQuery {
                field: "other_party",
                query: scoped(context).with_filter("field", "other_party"),
            });
            queries.push(FieldQuery {
                field: "case_description",
                query: scoped(context).with_filter("field", "case_description"),
            });
        }
    }

    queries
}

fn details_from(hit: &SearchHit) -> String {
    hit.metadata
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("matched existing matter entry {}", hit.id))
}

/// Templated disambiguation goals for the given matches
pub fn generate_disambiguation_goals(matches: &[ConflictMatch]) -> Vec<GoalSpec> {
    let mut goals = Vec::new();
    for conflict_match in matches {
        for field in &conflict_match.matched_fields {
            let description = match field.as_str() {
                "name" => "Confirm whether you are the person named in our existing records"
                    .to_string(),
                "company" => {
                    "Clarify your relationship to the company that appears in our records"
                        .to_string()
                }
                "location" | "address" => {
                    "Confirm whether you are connected to the location in our records".to_string()
                }
                other => format!(
                    "Clarify the {} detail that matches one of our existing matters",
                    other
                ),
            };
            goals.push(GoalSpec {
                description,
                priority: GoalPriority::Critical,
                category: "conflict_resolution".into(),
                source: GoalSource::ConflictChecker,
                related_conflict_id: Some(conflict_match.conflict_entry_id.clone()),
            });
        }
    }
    goals
}

/// Classify a disambiguation answer into a resolution strategy
pub fn analyze_conflict_resolution(params: &AnalyzeResolutionParams) -> ConflictResolution {
    let response = params.user_response.to_lowercase();
    let affirmed = AFFIRMATION_KEYWORDS
        .iter()
        .any(|keyword| response.contains(keyword));

    if affirmed {
        ConflictResolution {
            strategy: ResolutionStrategy::ImmediateStop,
            reasoning: "client confirmed involvement with the matched matter".into(),
            related_conflict_id: params.related_conflict_id.clone(),
        }
    } else {
        ConflictResolution {
            strategy: ResolutionStrategy::ProceedWithCaution,
            reasoning: "client did not confirm involvement; continue with attorney awareness"
                .into(),
            related_conflict_id: params.related_conflict_id.clone(),
        }
    }
}

/// Run the conflict screen: parallel field queries, thresholded matches,
/// status derivation. Search failures degrade to `pending`, never error.
pub async fn check_conflicts(
    search: &dyn SemanticSearch,
    params: &CheckConflictsParams,
) -> ConflictCheckResult {
    let checked_identity: Vec<String> = params
        .user_identity
        .names
        .iter()
        .chain(params.user_identity.email.iter())
        .chain(params.user_identity.companies.iter())
        .cloned()
        .collect();

    let queries = build_queries(params);
    let results = join_all(
        queries
            .iter()
            .map(|field_query| search.search(&field_query.query)),
    )
    .await;

    let mut degraded = false;
    // entry id -> (best score, matched fields, details)
    let mut by_entry: HashMap<String, (f64, Vec<String>, String)> = HashMap::new();

    for (field_query, result) in queries.iter().zip(results) {
        let hits = match result {
            Ok(hits) => hits,
            Err(err) => {
                warn!(field = field_query.field, error = %err, "conflict search degraded");
                degraded = true;
                continue;
            }
        };

        for hit in hits {
            if hit.score <= CONFLICT_SCORE_FLOOR {
                continue;
            }
            let entry = by_entry
                .entry(hit.id.clone())
                .or_insert_with(|| (hit.score, Vec::new(), details_from(&hit)));
            entry.0 = entry.0.max(hit.score);
            if !entry.1.iter().any(|f| f == field_query.field) {
                entry.1.push(field_query.field.to_string());
            }
        }
    }

    let mut matches: Vec<ConflictMatch> = by_entry
        .into_iter()
        .map(|(id, (score, fields, details))| ConflictMatch {
            conflict_entry_id: id,
            matched_fields: fields,
            match_type: MatchType::from_score(score),
            confidence: score,
            conflict_details: details,
            suggested_goals: Vec::new(),
        })
        .collect();
    matches.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for conflict_match in &mut matches {
        let goals = generate_disambiguation_goals(std::slice::from_ref(conflict_match));
        conflict_match.suggested_goals = goals;
    }

    let max_confidence = matches.first().map(|m| m.confidence).unwrap_or(0.0);

    let status = if max_confidence > CONFLICT_DETECTED_THRESHOLD {
        ConflictStatus::ConflictDetected
    } else if matches.is_empty() && !degraded {
        ConflictStatus::Clear
    } else {
        ConflictStatus::Pending
    };

    // No matches means maximal confidence that no conflict exists.
    let confidence = if matches.is_empty() {
        1.0
    } else {
        1.0 - max_confidence
    };

    let stop_conversation =
        status == ConflictStatus::ConflictDetected && max_confidence > CONFLICT_DETECTED_THRESHOLD;

    let recommendation = match status {
        ConflictStatus::ConflictDetected => ConflictRecommendation::AttorneyHandoff,
        ConflictStatus::Pending => ConflictRecommendation::GatherMoreInfo,
        ConflictStatus::Clear => ConflictRecommendation::Proceed,
    };

    ConflictCheckResult {
        status,
        matches,
        confidence,
        stop_conversation,
        recommendation,
        degraded,
        checked_identity,
    }
}

// =============================================================================
// Server
// =============================================================================

/// Conflict checker tool server
pub struct ConflictCheckerServer {
    search: Arc<dyn SemanticSearch>,
}

impl ConflictCheckerServer {
    /// Server over a semantic-search collaborator
    pub fn new(search: Arc<dyn SemanticSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl ToolProvider for ConflictCheckerServer {
    fn info(&self) -> ServerInfo {
        ServerInfo {
            name: "docket-conflict-checker".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor {
                name: "check_conflicts".into(),
                description: "Screen the client identity against the firm's existing matters"
                    .into(),
                input_schema: json!({
                    "type": "object",
                    "required": ["firm_id"],
                    "properties": {
                        "firm_id": {"type": "string"},
                        "user_identity": {"type": "object"},
                        "conversation_context": {"type": "string"}
                    }
                }),
            },
            ToolDescriptor {
                name: "generate_disambiguation_goals".into(),
                description: "Build clarification goals for ambiguous conflict matches".into(),
                input_schema: json!({
                    "type": "object",
                    "required": ["matches"],
                    "properties": {
                        "matches": {"type": "array"}
                    }
                }),
            },
            ToolDescriptor {
                name: "analyze_conflict_resolution".into(),
                description: "Classify the client's answer to a disambiguation question".into(),
                input_schema: json!({
                    "type": "object",
                    "required": ["user_response"],
                    "properties": {
                        "user_response": {"type": "string"},
                        "related_conflict_id": {"type": "string"}
                    }
                }),
            },
        ]
    }

    fn resources(&self) -> Vec<ResourceDescriptor> {
        vec![ResourceDescriptor {
            uri: "docket://conflict-checker/thresholds".into(),
            name: "thresholds".into(),
            description: "Score thresholds driving match classification".into(),
            mime_type: "application/json".into(),
        }]
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolCallError> {
        let invalid = |reason: String| ToolCallError::InvalidArguments {
            tool: name.to_string(),
            reason,
        };
        let internal = |reason: String| ToolCallError::Internal {
            tool: name.to_string(),
            reason,
        };

        match name {
            "check_conflicts" => {
                let params: CheckConflictsParams =
                    serde_json::from_value(arguments).map_err(|e| invalid(e.to_string()))?;
                if params.firm_id.is_empty() {
                    return Err(invalid("firm_id must not be empty".into()));
                }
                let result = check_conflicts(self.search.as_ref(), &params).await;
                serde_json::to_value(result).map_err(|e| internal(e.to_string()))
            }
            "generate_disambiguation_goals" => {
                #[derive(Deserialize)]
                struct Params {
                    matches: Vec<ConflictMatch>,
                }
                let params: Params =
                    serde_json::from_value(arguments).map_err(|e| invalid(e.to_string()))?;
                let goals = generate_disambiguation_goals(&params.matches);
                serde_json::to_value(json!({ "goals": goals }))
                    .map_err(|e| internal(e.to_string()))
            }
            "analyze_conflict_resolution" => {
                let params: AnalyzeResolutionParams =
                    serde_json::from_value(arguments).map_err(|e| invalid(e.to_string()))?;
                let resolution = analyze_conflict_resolution(&params);
                serde_json::to_value(resolution).map_err(|e| internal(e.to_string()))
            }
            other => Err(ToolCallError::NotFound {
                name: other.to_string(),
            }),
        }
    }

    fn read_resource(&self, uri: &str) -> Option<Value> {
        (uri == "docket://conflict-checker/thresholds").then(|| {
            json!({
                "score_floor": CONFLICT_SCORE_FLOOR,
                "detected_threshold": CONFLICT_DETECTED_THRESHOLD,
                "exact_threshold": MATCH_EXACT_THRESHOLD,
                "fuzzy_threshold": MATCH_FUZZY_THRESHOLD
            })
        })
    }
}
