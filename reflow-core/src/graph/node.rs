//! Graph Nodes
//!
//! This module defines the bookkeeping record the invalidation graph keeps
//! for every cell, memo and output.

use std::fmt;
use std::sync::Weak;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::reactive::Reactive;

/// Identifier for a node in one graph.
///
/// Ids are allocated by the owning graph and are only meaningful there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A point on a graph's logical clock.
///
/// Every cell write takes a fresh revision, so the revision of one cell
/// strictly increases with each write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct Revision(u64);

impl Revision {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw revision value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A reactive input (cell). Has dependents, never dependencies.
    Source,

    /// A memo. Has dependencies and may have dependents.
    Derived,

    /// A terminal consumer. Has dependencies but is never read by other nodes.
    Output,
}

/// Dirty state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirtyState {
    /// The node's cached value is up-to-date.
    Clean,

    /// Something upstream changed. Dependencies have to be verified before
    /// deciding whether to recompute.
    MaybeDirty,

    /// A direct dependency changed, or the node has never evaluated.
    Dirty,
}

/// The graph's record of one node.
pub(crate) struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) dirty: DirtyState,

    /// Revision at which this node's value last changed.
    pub(crate) revision: Revision,

    /// Dependencies read during the last successful evaluation, in read
    /// order, with the revision observed at read time.
    pub(crate) dependencies: IndexMap<NodeId, Revision>,

    /// Nodes whose last evaluation read this node.
    pub(crate) dependents: IndexSet<NodeId>,

    /// Set while the node is being verified or recomputed.
    pub(crate) evaluating: bool,

    /// Evaluation hook for derived and output nodes.
    pub(crate) handle: Option<Weak<dyn Reactive>>,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: String, kind: NodeKind, revision: Revision) -> Self {
        Self {
            id,
            name,
            kind,
            dirty: match kind {
                NodeKind::Source => DirtyState::Clean,
                // Start dirty to ensure first computation
                NodeKind::Derived | NodeKind::Output => DirtyState::Dirty,
            },
            revision,
            dependencies: IndexMap::new(),
            dependents: IndexSet::new(),
            evaluating: false,
            handle: None,
        }
    }

    pub(crate) fn is_clean(&self) -> bool {
        self.dirty == DirtyState::Clean
    }

    /// Mark as maybe dirty unless already dirty.
    pub(crate) fn mark_maybe_dirty(&mut self) {
        if self.dirty == DirtyState::Clean {
            self.dirty = DirtyState::MaybeDirty;
        }
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = DirtyState::Dirty;
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = DirtyState::Clean;
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("dirty", &self.dirty)
            .field("revision", &self.revision)
            .field("dependencies", &self.dependencies.len())
            .field("dependents", &self.dependents.len())
            .finish()
    }
}
