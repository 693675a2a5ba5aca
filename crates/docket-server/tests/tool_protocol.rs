//! Tool-protocol integration
//!
//! Drives the three domain servers through real JSON-RPC sessions:
//! handshake rules, the goal-assessment worked example, the conflict
//! screening worked example, and per-client handshake isolation.

use docket_tools::{
    codes, AdditionalGoalsServer, ConflictCheckerServer, FixtureSearch, GoalTrackerServer,
    JsonRpcRequest, JsonRpcResponse, SearchHit, ToolProvider, ToolSession, PROTOCOL_VERSION,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

fn request(id: u64, method: &str, params: Value) -> JsonRpcRequest {
    serde_json::from_value(json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    }))
    .unwrap()
}

async fn initialized(provider: Arc<dyn ToolProvider>) -> ToolSession {
    let mut session = ToolSession::new(provider);
    let response = session
        .handle(request(
            1,
            "initialize",
            json!({"protocolVersion": PROTOCOL_VERSION, "clientInfo": {"name": "orchestrator"}}),
        ))
        .await
        .unwrap();
    assert!(response.error.is_none(), "handshake failed: {:?}", response.error);
    session
}

fn structured(response: &JsonRpcResponse) -> Value {
    response
        .result
        .as_ref()
        .expect("expected a result")
        .get("structuredContent")
        .cloned()
        .expect("expected structuredContent")
}

fn conflict_fixture() -> FixtureSearch {
    FixtureSearch::new().with_entry(docket_tools::search::FixtureEntry {
        terms: vec!["jane roe".into()],
        filter: HashMap::from([
            ("firm_id".to_string(), "firm_1".to_string()),
            ("field".to_string(), "name".to_string()),
        ]),
        hit: SearchHit {
            id: "matter-818".into(),
            score: 0.95,
            metadata: json!({"description": "opposing party in an open matter"}),
        },
    })
}

#[tokio::test]
async fn test_goal_tracker_assess_goals_worked_example() {
    let mut session = initialized(Arc::new(GoalTrackerServer::new())).await;

    // Session created for firm_1, one user message, identification goal
    // present: the goal must come back completed.
    let response = session
        .handle(request(
            2,
            "tools/call",
            json!({
                "name": "assess_goals",
                "arguments": {
                    "conversation_history": [
                        {"role": "user", "content": "My name is John Doe, john@x.com"}
                    ],
                    "current_goals": [{
                        "id": "goal-ident",
                        "description": "Identify the prospective client",
                        "priority": "critical",
                        "category": "user_identification",
                        "completed": false,
                        "source": "base"
                    }],
                    "user_identity": {}
                }
            }),
        ))
        .await
        .unwrap();

    let assessment = structured(&response);
    let completed: Vec<String> =
        serde_json::from_value(assessment["completed_goals"].clone()).unwrap();
    assert_eq!(completed, vec!["goal-ident"]);
    assert_eq!(assessment["ready_for_next_phase"], true);

    // Determinism: the identical call yields the identical assessment.
    let again = session
        .handle(request(
            3,
            "tools/call",
            json!({
                "name": "assess_goals",
                "arguments": {
                    "conversation_history": [
                        {"role": "user", "content": "My name is John Doe, john@x.com"}
                    ],
                    "current_goals": [{
                        "id": "goal-ident",
                        "description": "Identify the prospective client",
                        "priority": "critical",
                        "category": "user_identification",
                        "completed": false,
                        "source": "base"
                    }],
                    "user_identity": {}
                }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(structured(&again), assessment);
}

#[tokio::test]
async fn test_goal_tracker_recommendation_decision_table() {
    let mut session = initialized(Arc::new(GoalTrackerServer::new())).await;

    let response = session
        .handle(request(
            2,
            "tools/call",
            json!({
                "name": "get_agent_recommendations",
                "arguments": {
                    "current_phase": "pre_login",
                    "ready_for_next_phase": true,
                    "incomplete_goals": [],
                    "conflict_status": "pending"
                }
            }),
        ))
        .await
        .unwrap();

    let recommendation = structured(&response);
    assert_eq!(recommendation["action"], "suggest_login");
    assert_eq!(recommendation["next_phase"], "login_suggested");

    let response = session
        .handle(request(
            3,
            "tools/call",
            json!({
                "name": "get_agent_recommendations",
                "arguments": {
                    "current_phase": "secured",
                    "ready_for_next_phase": true,
                    "incomplete_goals": [],
                    "conflict_status": "conflict_detected"
                }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(structured(&response)["action"], "complete_conversation");
}

#[tokio::test]
async fn test_conflict_checker_worked_example() {
    let provider = Arc::new(ConflictCheckerServer::new(Arc::new(conflict_fixture())));
    let mut session = initialized(provider).await;

    let response = session
        .handle(request(
            2,
            "tools/call",
            json!({
                "name": "check_conflicts",
                "arguments": {
                    "firm_id": "firm_1",
                    "user_identity": {"names": ["Jane Roe"]},
                    "conversation_context": null
                }
            }),
        ))
        .await
        .unwrap();

    let result = structured(&response);
    assert_eq!(result["status"], "conflict_detected");
    assert_eq!(result["matches"][0]["match_type"], "exact");
    let confidence = result["confidence"].as_f64().unwrap();
    assert!((confidence - 0.05).abs() < 1e-9);
    assert_eq!(result["stop_conversation"], true);
    assert_eq!(result["recommendation"], "attorney_handoff");
}

#[tokio::test]
async fn test_conflict_checker_resolution_analysis() {
    let provider = Arc::new(ConflictCheckerServer::new(Arc::new(FixtureSearch::new())));
    let mut session = initialized(provider).await;

    let response = session
        .handle(request(
            2,
            "tools/call",
            json!({
                "name": "analyze_conflict_resolution",
                "arguments": {
                    "user_response": "Yes, I was involved in that case",
                    "related_conflict_id": "matter-818"
                }
            }),
        ))
        .await
        .unwrap();

    let resolution = structured(&response);
    assert_eq!(resolution["strategy"], "immediate_stop");
    assert_eq!(resolution["related_conflict_id"], "matter-818");
}

#[tokio::test]
async fn test_additional_goals_server_over_rpc() {
    let search = FixtureSearch::new().with_entry(docket_tools::search::FixtureEntry {
        terms: vec!["employment".into()],
        filter: HashMap::from([
            ("kind".to_string(), "playbook".to_string()),
            ("legal_area".to_string(), "employment".to_string()),
        ]),
        hit: SearchHit {
            id: "playbook-employment".into(),
            score: 0.88,
            metadata: json!({
                "goals": [{
                    "description": "Collect the employment timeline",
                    "priority": "required",
                    "category": "employment_timeline"
                }],
                "documents": [{"name": "Employment contract", "required": true}]
            }),
        },
    });
    let mut session = initialized(Arc::new(AdditionalGoalsServer::new(Arc::new(search)))).await;

    let response = session
        .handle(request(
            2,
            "tools/call",
            json!({
                "name": "suggest_goals",
                "arguments": {
                    "legal_area": "employment",
                    "case_type": "wrongful termination",
                    "existing_goal_categories": []
                }
            }),
        ))
        .await
        .unwrap();

    let suggestions = structured(&response);
    assert_eq!(
        suggestions["suggested_goals"][0]["category"],
        "employment_timeline"
    );
    assert_eq!(
        suggestions["document_requirements"][0]["name"],
        "Employment contract"
    );
}

#[tokio::test]
async fn test_handshake_rules_across_servers() {
    let provider: Arc<dyn ToolProvider> = Arc::new(GoalTrackerServer::new());

    // Pre-handshake calls rejected.
    let mut cold = ToolSession::new(provider.clone());
    let response = cold
        .handle(request(1, "tools/list", Value::Null))
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, codes::INVALID_REQUEST);

    // Two clients have independent handshakes.
    let mut warmed = initialized(provider.clone()).await;
    let response = warmed
        .handle(request(2, "tools/list", Value::Null))
        .await
        .unwrap();
    assert!(response.error.is_none());

    let mut other = ToolSession::new(provider);
    let response = other
        .handle(request(1, "tools/list", Value::Null))
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, codes::INVALID_REQUEST);

    // Unknown tool after a valid handshake.
    let response = warmed
        .handle(request(3, "tools/call", json!({"name": "not_a_tool"})))
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, codes::TOOL_NOT_FOUND);
}
