//! Cell Implementation
//!
//! A Cell is the reactive input. It holds a value and a revision that moves
//! forward on every write.
//!
//! # How Cells Work
//!
//! 1. When a cell is read within a recording scope (memo or output), the
//!    read is recorded together with the cell's current revision.
//!
//! 2. When a cell is written, the graph takes a fresh revision for it and
//!    marks every computation that read it as stale.
//!
//! 3. Stale computations recompute on their next read.
//!
//! By default a write always bumps the revision, even when the new value
//! equals the old one. [`WritePolicy::SuppressEqual`] turns equal writes
//! into no-ops.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::runtime::Graph;
use crate::config::WritePolicy;
use crate::error::Result;
use crate::graph::{NodeId, NodeKind, Revision};

/// A reactive input holding a value of type T.
///
/// # Example
///
/// ```rust
/// use reflow_core::Graph;
///
/// let graph = Graph::new();
/// let count = graph.cell("count", 0).unwrap();
///
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Cell<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    id: NodeId,
    name: Arc<str>,
    graph: Graph,
    value: Arc<RwLock<T>>,
}

impl<T> Cell<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) fn new(graph: &Graph, name: String, value: T) -> Result<Self> {
        let id = graph.register(name.clone(), NodeKind::Source)?;
        Ok(Self {
            id,
            name: name.into(),
            graph: graph.clone(),
            value: Arc::new(RwLock::new(value)),
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Fully-qualified name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the current value.
    ///
    /// If called within a recording scope of the same graph, this also
    /// records the read.
    pub fn get(&self) -> T {
        let _guard = self.graph.lock();
        let value = self.value.read().clone();
        self.graph.track(self.id);
        value
    }

    /// Get the current value without recording a dependency.
    pub fn get_untracked(&self) -> T {
        let _guard = self.graph.lock();
        self.value.read().clone()
    }

    /// Replace the value and invalidate dependents.
    pub fn set(&self, value: T) {
        let _guard = self.graph.lock();

        if self.graph.config().write_policy == WritePolicy::SuppressEqual
            && *self.value.read() == value
        {
            tracing::trace!(node = %self.name, "suppressed equal write");
            return;
        }

        if let Some(reader) = ReactiveContext::current_node() {
            tracing::warn!(
                node = %self.name,
                reader = %self.graph.name_of(reader),
                "cell written during evaluation"
            );
        }

        *self.value.write() = value;
        self.graph.write(self.id);
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let _guard = self.graph.lock();
        let new_value = f(&*self.value.read());
        self.set(new_value);
    }

    /// Revision of the last applied write.
    pub fn revision(&self) -> Revision {
        self.graph
            .revision_of(self.id)
            .unwrap_or_default()
    }
}

impl<T> Clone for Cell<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: Arc::clone(&self.name),
            graph: self.graph.clone(),
            value: Arc::clone(&self.value),
        }
    }
}

impl<T> Debug for Cell<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("value", &self.get_untracked())
            .field("revision", &self.revision())
            .finish()
    }
}
