//! Process-scoped registry of project contexts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use dth_resolver::ProjectResolver;
use dth_types::ProjectContextsPayload;

use crate::context::ProjectContext;
use crate::lock;
use crate::protocol::ProtocolManager;

/// Maps client-chosen context ids to their [`ProjectContext`], shared by
/// every connection of the process.
///
/// Contexts are created lazily on first use and never torn down; a
/// client that reuses an id joins the existing context.
pub struct ContextRegistry {
    resolver: Arc<dyn ProjectResolver>,
    protocol: Arc<ProtocolManager>,
    contexts: Mutex<HashMap<i32, Arc<ProjectContext>>>,
}

impl ContextRegistry {
    #[must_use]
    pub fn new(resolver: Arc<dyn ProjectResolver>, protocol: Arc<ProtocolManager>) -> Self {
        Self {
            resolver,
            protocol,
            contexts: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_or_create(&self, context_id: i32) -> Arc<ProjectContext> {
        let mut contexts = lock(&self.contexts);
        Arc::clone(contexts.entry(context_id).or_insert_with(|| {
            tracing::debug!(context = context_id, "creating project context");
            Arc::new(ProjectContext::new(
                context_id,
                Arc::clone(&self.resolver),
                Arc::clone(&self.protocol),
            ))
        }))
    }

    /// Snapshot of `{project path → context id}` for every context that
    /// has been initialized with a project folder.
    #[must_use]
    pub fn project_contexts(&self) -> ProjectContextsPayload {
        let contexts = lock(&self.contexts);
        let mut payload = ProjectContextsPayload::default();
        for (id, context) in contexts.iter() {
            if let Some(path) = context.project_path() {
                payload.projects.insert(path, *id);
            }
        }
        payload
    }
}
