//! Session Registry
//!
//! Each user session gets its own [`Graph`]. Sessions never share cells,
//! so one user's input can never leak into another user's view.

use dashmap::DashMap;

use crate::config::GraphConfig;
use crate::reactive::Graph;

/// Concurrent map from session id to that session's graph.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    config: GraphConfig,
    sessions: DashMap<String, Graph>,
}

impl SessionRegistry {
    /// Create a registry whose graphs all use `config`.
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            sessions: DashMap::new(),
        }
    }

    /// Return the graph for `session`, creating an empty one if needed.
    ///
    /// The boolean is true when the graph was created by this call, so the
    /// caller knows to build the session's modules.
    pub fn open(&self, session: &str) -> (Graph, bool) {
        let mut created = false;
        let graph = self
            .sessions
            .entry(session.to_owned())
            .or_insert_with(|| {
                created = true;
                Graph::with_config(self.config.clone())
            })
            .clone();

        if created {
            tracing::debug!(session, "opened session");
        }
        (graph, created)
    }

    pub fn get(&self, session: &str) -> Option<Graph> {
        self.sessions.get(session).map(|entry| entry.value().clone())
    }

    /// Drop the registry's handle to a session's graph.
    ///
    /// Returns false if the session was not open.
    pub fn close(&self, session: &str) -> bool {
        let closed = self.sessions.remove(session).is_some();
        if closed {
            tracing::debug!(session, "closed session");
        }
        closed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Ids of all open sessions, in no particular order.
    pub fn ids(&self) -> Vec<String> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }
}
