//! Invalidation Graph
//!
//! Holds every node of one graph together with its live dependency edges,
//! and propagates dirty flags when a source node changes.
//!
//! # Algorithm
//!
//! Edges are never accumulated. Whenever a node finishes an evaluation its
//! dependency map is replaced wholesale with what it read, and the reverse
//! index (`dependents`) of every old and new dependency is patched to match.
//!
//! When a source node changes:
//!
//! 1. Its direct dependents are marked `Dirty`.
//! 2. Everything reachable from them is marked `MaybeDirty` (breadth-first,
//!    each node visited once).
//! 3. Output nodes that were clean before the walk are returned so the
//!    caller can notify them after releasing the graph lock.
//!
//! Whether a `MaybeDirty` node really has to recompute is decided later, on
//! read, by comparing dependency revisions.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use serde::Serialize;

use super::node::{DirtyState, Node, NodeId, NodeKind, Revision};
use crate::error::{ReactiveError, Result};
use crate::reactive::Reactive;

/// Node storage plus the logical clock of one graph.
#[derive(Debug, Default)]
pub(crate) struct InvalidationGraph {
    /// All nodes in the graph, indexed by ID.
    nodes: HashMap<NodeId, Node>,

    /// Fully-qualified name to node.
    names: HashMap<String, NodeId>,

    next_id: u64,
    clock: u64,

    /// Nodes currently being verified or recomputed, outermost first.
    eval_stack: Vec<NodeId>,
}

impl InvalidationGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Advance the logical clock.
    pub(crate) fn tick(&mut self) -> Revision {
        self.clock += 1;
        Revision::new(self.clock)
    }

    /// Add a node under a fully-qualified name.
    pub(crate) fn add_node(&mut self, name: String, kind: NodeKind) -> Result<NodeId> {
        if self.names.contains_key(&name) {
            return Err(ReactiveError::DuplicateName { name });
        }

        self.next_id += 1;
        let id = NodeId::new(self.next_id);
        let revision = self.tick();

        self.names.insert(name.clone(), id);
        self.nodes.insert(id, Node::new(id, name, kind, revision));
        Ok(id)
    }

    /// Remove a node from the graph.
    ///
    /// Also removes all edges involving this node.
    pub(crate) fn remove_node(&mut self, node_id: NodeId) {
        let Some(node) = self.nodes.remove(&node_id) else {
            return;
        };
        self.names.remove(&node.name);

        for dep_id in node.dependencies.keys() {
            if let Some(dep) = self.nodes.get_mut(dep_id) {
                dep.dependents.shift_remove(&node_id);
            }
        }
        for dependent_id in &node.dependents {
            if let Some(dependent) = self.nodes.get_mut(dependent_id) {
                dependent.dependencies.shift_remove(&node_id);
                dependent.mark_dirty();
            }
        }
    }

    pub(crate) fn set_handle(&mut self, node_id: NodeId, handle: Weak<dyn Reactive>) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.handle = Some(handle);
        }
    }

    pub(crate) fn get(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub(crate) fn get_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Look up a node, failing with `Disposed` when it is gone.
    pub(crate) fn node(&self, node_id: NodeId) -> Result<&Node> {
        self.nodes.get(&node_id).ok_or_else(|| ReactiveError::Disposed {
            node: node_id.to_string(),
        })
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    pub(crate) fn name_of(&self, node_id: NodeId) -> String {
        self.nodes
            .get(&node_id)
            .map(|node| node.name.clone())
            .unwrap_or_else(|| node_id.to_string())
    }

    /// Upgrade the evaluation hook of a derived or output node.
    pub(crate) fn handle(&self, node_id: NodeId) -> Result<Arc<dyn Reactive>> {
        self.node(node_id)?
            .handle
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| ReactiveError::Disposed {
                node: self.name_of(node_id),
            })
    }

    /// Replace a node's dependency set with the one observed on its latest
    /// evaluation, keeping the reverse index in sync.
    pub(crate) fn replace_dependencies(
        &mut self,
        node_id: NodeId,
        dependencies: IndexMap<NodeId, Revision>,
    ) {
        let old = match self.nodes.get_mut(&node_id) {
            Some(node) => std::mem::take(&mut node.dependencies),
            None => return,
        };

        for dep_id in old.keys() {
            if !dependencies.contains_key(dep_id) {
                if let Some(dep) = self.nodes.get_mut(dep_id) {
                    dep.dependents.shift_remove(&node_id);
                }
            }
        }
        for dep_id in dependencies.keys() {
            if let Some(dep) = self.nodes.get_mut(dep_id) {
                dep.dependents.insert(node_id);
            }
        }

        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.dependencies = dependencies;
        }
    }

    /// Mark a source node as changed and propagate dirty flags.
    ///
    /// Returns the output nodes that went from clean to stale.
    pub(crate) fn mark_changed(&mut self, source_id: NodeId) -> Vec<NodeId> {
        let mut newly_stale = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        let direct: Vec<NodeId> = match self.nodes.get(&source_id) {
            Some(source) => source.dependents.iter().copied().collect(),
            None => return newly_stale,
        };

        for node_id in direct {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                if node.kind == NodeKind::Output && node.is_clean() {
                    newly_stale.push(node_id);
                }
                node.mark_dirty();
                visited.insert(node_id);
                queue.extend(node.dependents.iter().copied());
            }
        }

        while let Some(node_id) = queue.pop_front() {
            if !visited.insert(node_id) {
                continue;
            }

            if let Some(node) = self.nodes.get_mut(&node_id) {
                if node.kind == NodeKind::Output && node.is_clean() {
                    newly_stale.push(node_id);
                }
                node.mark_maybe_dirty();
                queue.extend(node.dependents.iter().copied());
            }
        }

        tracing::debug!(
            source = %self.name_of(source_id),
            invalidated = visited.len(),
            "propagated change"
        );

        newly_stale
    }

    /// Push a node onto the evaluation stack.
    ///
    /// Fails with `CyclicDependency` if the node is already being evaluated,
    /// and with `DepthExceeded` if the stack is at the configured limit.
    pub(crate) fn begin_eval(&mut self, node_id: NodeId, max_depth: usize) -> Result<()> {
        let evaluating = self.node(node_id)?.evaluating;

        if evaluating {
            let start = self
                .eval_stack
                .iter()
                .position(|id| *id == node_id)
                .unwrap_or(self.eval_stack.len());
            let cycle = self.eval_stack[start..]
                .iter()
                .chain(std::iter::once(&node_id))
                .map(|id| self.name_of(*id))
                .collect();
            return Err(ReactiveError::CyclicDependency { cycle });
        }

        if self.eval_stack.len() >= max_depth {
            return Err(ReactiveError::DepthExceeded {
                limit: max_depth,
                node: self.name_of(node_id),
            });
        }

        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.evaluating = true;
        }
        self.eval_stack.push(node_id);
        Ok(())
    }

    /// Pop a node pushed by [`begin_eval`](Self::begin_eval).
    pub(crate) fn end_eval(&mut self, node_id: NodeId) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.evaluating = false;
        }
        if let Some(pos) = self.eval_stack.iter().rposition(|id| *id == node_id) {
            self.eval_stack.remove(pos);
        }
    }

    /// Get the total number of nodes in the graph.
    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn snapshot(&self) -> GraphSnapshot {
        let mut nodes: Vec<NodeSnapshot> = self
            .nodes
            .values()
            .map(|node| NodeSnapshot {
                id: node.id,
                name: node.name.clone(),
                kind: node.kind,
                state: node.dirty,
                revision: node.revision,
                dependencies: node
                    .dependencies
                    .keys()
                    .map(|id| self.name_of(*id))
                    .collect(),
            })
            .collect();
        nodes.sort_by_key(|node| node.id);

        GraphSnapshot {
            revision: Revision::new(self.clock),
            nodes,
        }
    }
}

/// Serializable view of a graph, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct GraphSnapshot {
    /// Current value of the logical clock.
    pub revision: Revision,
    /// Nodes in creation order.
    pub nodes: Vec<NodeSnapshot>,
}

/// Serializable view of one node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub state: DirtyState,
    pub revision: Revision,
    /// Names of the nodes read on the last successful evaluation.
    pub dependencies: Vec<String>,
}

impl GraphSnapshot {
    /// Find a node by fully-qualified name.
    pub fn node(&self, name: &str) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|node| node.name == name)
    }
}
