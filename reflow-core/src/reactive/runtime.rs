//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects cells, memos, and
//! outputs. A [`Graph`] handle owns the dependency graph of one session and
//! decides when nodes recompute.
//!
//! # How It Works
//!
//! 1. Cells, memos and outputs are created through a graph handle and
//!    register under a fully-qualified name.
//!
//! 2. When a memo or output evaluates, the runtime records what it read
//!    and rewires its edges.
//!
//! 3. When a cell is written, the runtime:
//!    a. Takes a new revision from the graph clock
//!    b. Marks direct dependents dirty and the rest "maybe dirty"
//!    c. Notifies outputs that just went stale
//!    d. Leaves recomputation to the next read
//!
//! 4. When a node is read, the runtime refreshes it:
//!    - clean nodes return their cache,
//!    - "maybe dirty" nodes refresh their dependencies first and recompute
//!      only if one of them moved to a newer revision,
//!    - dirty nodes recompute.
//!
//! # Thread Safety
//!
//! A graph is `Send + Sync`. All reads and writes of one graph are
//! serialized by a re-entrant evaluation lock, so another thread never
//! sees a node halfway through recomputing. Separate graphs never share
//! state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, MutexGuard, ReentrantMutex, ReentrantMutexGuard};
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::{Cell, Memo, Output};
use crate::config::GraphConfig;
use crate::error::Result;
use crate::graph::{
    DirtyState, GraphSnapshot, InvalidationGraph, NodeId, NodeKind, Revision,
};

/// A node that the runtime can re-evaluate without knowing its value type.
pub trait Reactive: Send + Sync {
    /// The graph node this value is registered as.
    fn node_id(&self) -> NodeId;

    /// Re-run the computation and commit the result to the graph.
    fn recompute(&self) -> Result<()>;

    /// Called when an output goes from fresh to stale.
    fn invalidated(&self) {}
}

/// Identity of a graph instance, used to keep recording scopes apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct GraphId(u64);

impl GraphId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

struct GraphInner {
    id: GraphId,
    config: GraphConfig,
    eval_lock: ReentrantMutex<()>,
    state: Mutex<InvalidationGraph>,
}

/// Handle to one reactive graph.
///
/// Cloning is cheap and yields another handle to the same graph.
#[derive(Clone)]
pub struct Graph {
    inner: Arc<GraphInner>,
}

impl Graph {
    /// Create an empty graph with the default configuration.
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    /// Create an empty graph with the given configuration.
    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            inner: Arc::new(GraphInner {
                id: GraphId::next(),
                config,
                eval_lock: ReentrantMutex::new(()),
                state: Mutex::new(InvalidationGraph::new()),
            }),
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.inner.config
    }

    /// Whether two handles point at the same graph.
    pub fn same_graph(&self, other: &Graph) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether a node is registered under the fully-qualified `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.state().lookup(name).is_some()
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.state().node_count()
    }

    /// Dirty state of the node registered under `name`.
    pub fn state_of(&self, name: &str) -> Option<DirtyState> {
        let state = self.state();
        let dirty = state
            .lookup(name)
            .and_then(|id| state.get(id))
            .map(|node| node.dirty);
        dirty
    }

    /// Serializable dump of every node, for diagnostics.
    pub fn snapshot(&self) -> GraphSnapshot {
        let _guard = self.lock();
        self.state().snapshot()
    }

    /// Create a cell named `name`.
    pub fn cell<T>(&self, name: impl Into<String>, value: T) -> Result<Cell<T>>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        Cell::new(self, name.into(), value)
    }

    /// Create a memo named `name`. `compute` runs on first read.
    pub fn memo<T, F>(&self, name: impl Into<String>, compute: F) -> Result<Memo<T>>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        Memo::new(self, name.into(), compute)
    }

    /// Create an output named `name`. `render` runs on first render.
    pub fn output<T, F>(&self, name: impl Into<String>, render: F) -> Result<Output<T>>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        Output::new(self, name.into(), render)
    }

    pub(crate) fn id(&self) -> GraphId {
        self.inner.id
    }

    /// Acquire the evaluation lock. Re-entrant on the owning thread.
    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.inner.eval_lock.lock()
    }

    fn state(&self) -> MutexGuard<'_, InvalidationGraph> {
        self.inner.state.lock()
    }

    pub(crate) fn register(&self, name: String, kind: NodeKind) -> Result<NodeId> {
        let id = self.state().add_node(name, kind)?;
        tracing::trace!(node = %id, ?kind, "registered node");
        Ok(id)
    }

    pub(crate) fn attach(&self, id: NodeId, handle: Weak<dyn Reactive>) {
        self.state().set_handle(id, handle);
    }

    pub(crate) fn unregister(&self, id: NodeId) {
        let _guard = self.lock();
        self.state().remove_node(id);
    }

    pub(crate) fn name_of(&self, id: NodeId) -> String {
        self.state().name_of(id)
    }

    pub(crate) fn revision_of(&self, id: NodeId) -> Result<Revision> {
        Ok(self.state().node(id)?.revision)
    }

    pub(crate) fn dirty_state(&self, id: NodeId) -> Result<DirtyState> {
        Ok(self.state().node(id)?.dirty)
    }

    /// Record a read of `id` in the innermost recording scope.
    pub(crate) fn track(&self, id: NodeId) {
        if !ReactiveContext::is_active() {
            return;
        }
        if let Some(node) = self.state().get(id) {
            ReactiveContext::track_dependency(self.inner.id, id, node.revision);
        }
    }

    /// Run `evaluate` in a recording scope owned by node `id`.
    pub(crate) fn record<T>(
        &self,
        id: NodeId,
        evaluate: impl FnOnce() -> T,
    ) -> (T, IndexMap<NodeId, Revision>) {
        ReactiveContext::record(self.inner.id, id, evaluate)
    }

    /// Publish a write to source node `id`.
    pub(crate) fn write(&self, id: NodeId) {
        let _guard = self.lock();

        let stale = {
            let mut state = self.state();
            let revision = state.tick();
            if let Some(node) = state.get_mut(id) {
                node.revision = revision;
            }
            tracing::trace!(node = %state.name_of(id), revision = revision.raw(), "cell written");

            let stale = state.mark_changed(id);
            stale
                .into_iter()
                .filter_map(|output| state.handle(output).ok())
                .collect::<Vec<_>>()
        };

        // Callbacks may read the graph, so the state lock must be released.
        for output in stale {
            output.invalidated();
        }
    }

    /// Store the outcome of a successful evaluation.
    pub(crate) fn commit(
        &self,
        id: NodeId,
        dependencies: IndexMap<NodeId, Revision>,
        changed: bool,
    ) {
        let mut state = self.state();
        let revision = changed.then(|| state.tick());

        // A dependency written after it was read leaves the result stale.
        let outdated = dependencies.iter().any(|(dep, seen)| {
            state.get(*dep).map_or(true, |node| node.revision != *seen)
        });

        state.replace_dependencies(id, dependencies);
        if let Some(node) = state.get_mut(id) {
            if let Some(revision) = revision {
                node.revision = revision;
            }
            if outdated {
                node.mark_dirty();
            } else {
                node.mark_clean();
            }
        }
        if outdated {
            tracing::debug!(node = %state.name_of(id), "input changed during evaluation");
        }
    }

    /// Keep a node dirty after its computation failed.
    ///
    /// The reads made before the failure still become edges, so a write to
    /// any of them reaches the node's dependents.
    pub(crate) fn fail(&self, id: NodeId, dependencies: IndexMap<NodeId, Revision>) {
        let mut state = self.state();
        state.replace_dependencies(id, dependencies);
        if let Some(node) = state.get_mut(id) {
            node.mark_dirty();
        }
    }

    /// Bring node `id` up to date, recomputing it if needed.
    pub(crate) fn refresh(&self, id: NodeId) -> Result<()> {
        let _guard = self.lock();

        let (kind, dirty) = {
            let state = self.state();
            let node = state.node(id)?;
            (node.kind, node.dirty)
        };
        if kind == NodeKind::Source || dirty == DirtyState::Clean {
            return Ok(());
        }

        self.state().begin_eval(id, self.inner.config.max_depth)?;
        let _eval = EvalGuard { graph: self, node: id };
        self.refresh_stale(id, dirty)
    }

    fn refresh_stale(&self, id: NodeId, dirty: DirtyState) -> Result<()> {
        if dirty == DirtyState::MaybeDirty && !self.dependencies_changed(id)? {
            if let Some(node) = self.state().get_mut(id) {
                node.mark_clean();
            }
            tracing::trace!(node = %self.name_of(id), "verified unchanged");
            return Ok(());
        }

        let handle = self.state().handle(id)?;
        tracing::trace!(node = %self.name_of(id), "recomputing");
        handle.recompute()
    }

    /// Refresh each recorded dependency in read order and report whether any
    /// of them moved past the revision seen on the last evaluation.
    fn dependencies_changed(&self, id: NodeId) -> Result<bool> {
        let dependencies: SmallVec<[(NodeId, Revision); 8]> = self
            .state()
            .node(id)?
            .dependencies
            .iter()
            .map(|(dep, seen)| (*dep, *seen))
            .collect();

        for (dep, seen) in dependencies {
            self.refresh(dep)?;
            if self.revision_of(dep)? != seen {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Pops a node off the evaluation stack, even if its computation panics.
struct EvalGuard<'a> {
    graph: &'a Graph,
    node: NodeId,
}

impl Drop for EvalGuard<'_> {
    fn drop(&mut self) {
        self.graph.state().end_eval(self.node);
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("id", &self.inner.id)
            .field("config", &self.inner.config)
            .field("node_count", &self.node_count())
            .finish()
    }
}
