//! Additional goals server
//!
//! Proposes supplementary intake goals and document requirements from a
//! playbook document index keyed by legal area and case type. The ranking
//! logic mirrors the conflict checker's: thresholded semantic hits over a
//! firm-agnostic index.

use crate::search::{SearchQuery, SemanticSearch};
use crate::server::{ResourceDescriptor, ServerInfo, ToolCallError, ToolDescriptor, ToolProvider};
use async_trait::async_trait;
use docket_conversation::{GoalPriority, GoalSource, GoalSpec};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

/// Playbook hits below this score are discarded
const PLAYBOOK_SCORE_FLOOR: f64 = 0.7;

/// Playbook documents requested per query
const PLAYBOOK_SEARCH_TOP_K: usize = 5;

/// Parameters for `suggest_goals`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestGoalsParams {
    pub legal_area: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_type: Option<String>,
    /// Categories already covered; suggestions in these are skipped
    #[serde(default)]
    pub existing_goal_categories: Vec<String>,
}

/// A supporting document the playbook calls for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRequirement {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

/// Result of `suggest_goals`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalSuggestions {
    pub suggested_goals: Vec<GoalSpec>,
    pub document_requirements: Vec<DocumentRequirement>,
    pub confidence: f64,
    /// True when the playbook index was unreachable
    pub degraded: bool,
}

#[derive(Debug, Deserialize)]
struct PlaybookGoal {
    description: String,
    #[serde(default = "default_playbook_priority")]
    priority: GoalPriority,
    category: String,
}

fn default_playbook_priority() -> GoalPriority {
    GoalPriority::Important
}

#[derive(Debug, Deserialize)]
struct PlaybookDocument {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    required: bool,
}

/// Query the playbook index and map hits to goal/document suggestions
pub async fn suggest_goals(
    search: &dyn SemanticSearch,
    params: &SuggestGoalsParams,
) -> GoalSuggestions {
    let mut text = params.legal_area.clone();
    if let Some(case_type) = &params.case_type {
        text.push(' ');
        text.push_str(case_type);
    }

    let query = SearchQuery::new(text, PLAYBOOK_SEARCH_TOP_K)
        .with_filter("kind", "playbook")
        .with_filter("legal_area", &params.legal_area);

    let (hits, degraded) = match search.search(&query).await {
        Ok(hits) => (hits, false),
        Err(err) => {
            warn!(legal_area = %params.legal_area, error = %err, "playbook search degraded");
            (Vec::new(), true)
        }
    };

    let mut suggested_goals = Vec::new();
    let mut document_requirements = Vec::new();
    let mut best_score = 0.0f64;

    for hit in hits {
        if hit.score <= PLAYBOOK_SCORE_FLOOR {
            continue;
        }
        best_score = best_score.max(hit.score);

        if let Some(goals) = hit.metadata.get("goals").and_then(Value::as_array) {
            for goal_value in goals {
                let Ok(goal) = serde_json::from_value::<PlaybookGoal>(goal_value.clone()) else {
                    continue;
                };
                if params
                    .existing_goal_categories
                    .iter()
                    .any(|c| c == &goal.category)
                {
                    continue;
                }
                suggested_goals.push(GoalSpec {
                    description: goal.description,
                    priority: goal.priority,
                    category: goal.category,
                    source: GoalSource::Additional,
                    related_conflict_id: None,
                });
            }
        }

        if let Some(documents) = hit.metadata.get("documents").and_then(Value::as_array) {
            for document_value in documents {
                let Ok(document) =
                    serde_json::from_value::<PlaybookDocument>(document_value.clone())
                else {
                    continue;
                };
                document_requirements.push(DocumentRequirement {
                    name: document.name,
                    description: document.description,
                    required: document.required,
                });
            }
        }
    }

    GoalSuggestions {
        suggested_goals,
        document_requirements,
        confidence: best_score,
        degraded,
    }
}

/// Additional goals tool server
pub struct AdditionalGoalsServer {
    search: Arc<dyn SemanticSearch>,
}

impl AdditionalGoalsServer {
    /// Server over the playbook document index
    pub fn new(search: Arc<dyn SemanticSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl ToolProvider for AdditionalGoalsServer {
    fn info(&self) -> ServerInfo {
        ServerInfo {
            name: "docket-additional-goals".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![ToolDescriptor {
            name: "suggest_goals".into(),
            description: "Propose supplementary goals and documents for a legal area".into(),
            input_schema: json!({
                "type": "object",
                "required": ["legal_area"],
                "properties": {
                    "legal_area": {"type": "string"},
                    "case_type": {"type": "string"},
                    "existing_goal_categories": {
                        "type": "array",
                        "items": {"type": "string"}
                    }
                }
            }),
        }]
    }

    fn resources(&self) -> Vec<ResourceDescriptor> {
        vec![ResourceDescriptor {
            uri: "docket://additional-goals/legal-areas".into(),
            name: "legal-areas".into(),
            description: "Legal areas the playbook index covers".into(),
            mime_type: "application/json".into(),
        }]
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolCallError> {
        match name {
            "suggest_goals" => {
                let params: SuggestGoalsParams = serde_json::from_value(arguments).map_err(
                    |err| ToolCallError::InvalidArguments {
                        tool: name.to_string(),
                        reason: err.to_string(),
                    },
                )?;
                if params.legal_area.is_empty() {
                    return Err(ToolCallError::InvalidArguments {
                        tool: name.to_string(),
                        reason: "legal_area must not be empty".into(),
                    });
                }
                let suggestions = suggest_goals(self.search.as_ref(), &params).await;
                serde_json::to_value(suggestions).map_err(|err| ToolCallError::Internal {
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
        (uri == "docket://additional-goals/legal-areas").then(|| {
            json!({
                "legal_areas": [
                    "family_law",
                    "employment",
                    "personal_injury",
                    "real_estate",
                    "estate_planning",
                    "business",
                    "immigration",
                    "criminal_defense"
                ]
            })
        })
    }
}
