//! Server state
//!
//! Shared, cheaply clonable handle to everything the HTTP layer needs:
//! the conversation service, the search index and audit log, the tool
//! providers, and the per-client tool-protocol sessions.

use crate::service::ConversationService;
use docket_sync::{AuditLog, SearchIndex};
use docket_tools::{ToolProvider, ToolSession};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};

/// Tool server slugs routable under `/v1/tools/{server}`
pub const TOOL_SERVER_SLUGS: [&str; 3] =
    ["goal-tracker", "conflict-checker", "additional-goals"];

/// Server-wide shared state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    service: ConversationService,
    index: Arc<dyn SearchIndex>,
    audit: Arc<dyn AuditLog>,
    admin_key: Option<String>,
    tool_providers: HashMap<&'static str, Arc<dyn ToolProvider>>,
    /// Handshake state per `(server, client)` pair. Keeping it here — not
    /// in the providers — is what makes the handshake per-connection.
    tool_sessions: RwLock<HashMap<String, Arc<Mutex<ToolSession>>>>,
    start_time: Instant,
}

impl AppState {
    /// Assemble the server state
    pub fn new(
        service: ConversationService,
        index: Arc<dyn SearchIndex>,
        audit: Arc<dyn AuditLog>,
        admin_key: Option<String>,
        goal_tracker: Arc<dyn ToolProvider>,
        conflict_checker: Arc<dyn ToolProvider>,
        additional_goals: Arc<dyn ToolProvider>,
    ) -> Self {
        let mut tool_providers: HashMap<&'static str, Arc<dyn ToolProvider>> = HashMap::new();
        tool_providers.insert("goal-tracker", goal_tracker);
        tool_providers.insert("conflict-checker", conflict_checker);
        tool_providers.insert("additional-goals", additional_goals);

        Self {
            inner: Arc::new(AppStateInner {
                service,
                index,
                audit,
                admin_key,
                tool_providers,
                tool_sessions: RwLock::new(HashMap::new()),
                start_time: Instant::now(),
            }),
        }
    }

    /// Conversation service
    pub fn service(&self) -> &ConversationService {
        &self.inner.service
    }

    /// Search index for admin reads
    pub fn index(&self) -> &Arc<dyn SearchIndex> {
        &self.inner.index
    }

    /// Sync audit log
    pub fn audit(&self) -> &Arc<dyn AuditLog> {
        &self.inner.audit
    }

    /// Server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.inner.start_time.elapsed().as_secs()
    }

    /// Check the admin credential. Admin routes are disabled entirely when
    /// no key is configured.
    pub fn authorize_admin(&self, presented: Option<&str>) -> bool {
        match (&self.inner.admin_key, presented) {
            (Some(expected), Some(presented)) => expected == presented,
            _ => false,
        }
    }

    /// Look up a tool provider by slug
    pub fn tool_provider(&self, server: &str) -> Option<Arc<dyn ToolProvider>> {
        self.inner.tool_providers.get(server).cloned()
    }

    /// Get or open the tool session for one `(server, client)` pair
    pub async fn tool_session(
        &self,
        server: &str,
        client_id: &str,
    ) -> Option<Arc<Mutex<ToolSession>>> {
        let provider = self.tool_provider(server)?;
        let key = format!("{}:{}", server, client_id);

        {
            let sessions = self.inner.tool_sessions.read().await;
            if let Some(session) = sessions.get(&key) {
                return Some(session.clone());
            }
        }

        let mut sessions = self.inner.tool_sessions.write().await;
        Some(
            sessions
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(ToolSession::new(provider))))
                .clone(),
        )
    }
}
