//! Semantic search seam
//!
//! The conflict checker and additional-goals server consume an external
//! vector search service. The trait keeps the heuristic servers testable
//! and lets the real service plug in at the edge of the system.

use async_trait::async_trait;
use docket_core::{Result, SEARCH_TOP_K_MAX};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One search request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub top_k: usize,
    #[serde(default)]
    pub filter: HashMap<String, String>,
}

impl SearchQuery {
    /// Build a query, clamping `top_k` to the service limit
    pub fn new(text: impl Into<String>, top_k: usize) -> Self {
        Self {
            text: text.into(),
            top_k: top_k.clamp(1, SEARCH_TOP_K_MAX),
            filter: HashMap::new(),
        }
    }

    /// Add a filter term
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter.insert(key.into(), value.into());
        self
    }
}

/// One scored result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    #[serde(default)]
    pub metadata: Value,
}

/// Vector search collaborator
#[async_trait]
pub trait SemanticSearch: Send + Sync {
    /// Run one query; errors indicate the service is unavailable, which
    /// callers degrade rather than propagate
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>>;
}

/// One entry in the fixture index
#[derive(Debug, Clone)]
pub struct FixtureEntry {
    /// Lowercase terms; the entry matches when any appears in the query text
    pub terms: Vec<String>,
    /// Filter values this entry requires to match (subset semantics)
    pub filter: HashMap<String, String>,
    /// The hit returned on a match
    pub hit: SearchHit,
}

/// In-memory search backend for tests and local runs
#[derive(Debug, Clone, Default)]
pub struct FixtureSearch {
    entries: Vec<FixtureEntry>,
}

impl FixtureSearch {
    /// Empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry
    pub fn with_entry(mut self, entry: FixtureEntry) -> Self {
        self.entries.push(entry);
        self
    }
}

#[async_trait]
impl SemanticSearch for FixtureSearch {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let text = query.text.to_lowercase();

        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .filter(|entry| {
                entry
                    .filter
                    .iter()
                    .all(|(k, v)| query.filter.get(k) == Some(v))
            })
            .filter(|entry| entry.terms.iter().any(|term| text.contains(term.as_str())))
            .map(|entry| entry.hit.clone())
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(query.top_k);
        Ok(hits)
    }
}
