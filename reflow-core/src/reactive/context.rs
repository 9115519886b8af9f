//! Reactive Context
//!
//! The reactive context records which cells and memos a computation reads.
//! This is what lets dependencies be discovered instead of declared: every
//! tracked read registers itself with whatever computation is running.
//!
//! # Implementation
//!
//! We use a thread-local stack of recording scopes. Evaluating a memo pushes
//! a scope, runs the computation, and pops the scope together with the
//! dependencies it collected.
//!
//! Scopes nest. A read only ever lands in the innermost scope, so when memo A
//! reads memo B, A's scope records B and nothing that B itself read. The
//! graph stays a set of direct edges.
//!
//! Every scope belongs to one graph. Reads of a cell owned by a different
//! graph are not recorded, which keeps independent sessions independent even
//! when they share a thread.

use std::cell::RefCell;

use indexmap::IndexMap;

use super::runtime::GraphId;
use crate::graph::{NodeId, Revision};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Debug)]
struct ContextEntry {
    graph: GraphId,
    node: NodeId,
    /// Dependencies read so far, in read order, with the revision observed
    /// at the first read.
    dependencies: IndexMap<NodeId, Revision>,
}

/// Guard for one recording scope.
///
/// The scope is popped when the guard is finished or dropped, so the stack
/// stays balanced even if the computation panics.
pub struct ReactiveContext {
    node: NodeId,
    finished: bool,
}

impl ReactiveContext {
    /// Enter a new recording scope for `node` of `graph`.
    pub(crate) fn enter(graph: GraphId, node: NodeId) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                graph,
                node,
                dependencies: IndexMap::new(),
            });
        });

        Self {
            node,
            finished: false,
        }
    }

    /// Run `evaluate` inside a fresh scope and return its result together
    /// with every dependency it read.
    pub(crate) fn record<T>(
        graph: GraphId,
        node: NodeId,
        evaluate: impl FnOnce() -> T,
    ) -> (T, IndexMap<NodeId, Revision>) {
        let scope = Self::enter(graph, node);
        let value = evaluate();
        (value, scope.finish())
    }

    /// Pop this scope and return its dependencies.
    pub(crate) fn finish(mut self) -> IndexMap<NodeId, Revision> {
        self.finished = true;
        self.pop().map(|entry| entry.dependencies).unwrap_or_default()
    }

    fn pop(&self) -> Option<ContextEntry> {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = &popped {
                debug_assert_eq!(
                    entry.node, self.node,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.node, entry.node
                );
            }
            popped
        })
    }

    /// Check if there is an active recording scope.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// The node whose scope is innermost, if any.
    pub fn current_node() -> Option<NodeId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|entry| entry.node))
    }

    /// Record a read of `node` at `revision`.
    ///
    /// Ignored when no scope is active or the innermost scope belongs to a
    /// different graph.
    pub(crate) fn track_dependency(graph: GraphId, node: NodeId, revision: Revision) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                if entry.graph == graph && entry.node != node {
                    entry.dependencies.entry(node).or_insert(revision);
                }
            }
        });
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if !self.finished {
            self.pop();
        }
    }
}
