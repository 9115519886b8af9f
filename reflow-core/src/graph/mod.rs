//! Dependency Graph
//!
//! This module implements the invalidation graph that tracks relationships
//! between cells, memos and outputs.
//!
//! # Overview
//!
//! The graph is directed: if A reads B, there is an edge from B to A.
//!
//! - Source nodes (cells) are the roots.
//! - Derived nodes (memos) have dependencies and dependents.
//! - Output nodes are leaves.
//!
//! Edges are not declared up front. They are whatever a node read on its
//! most recent successful evaluation, so the shape of the graph follows the
//! branches each computation actually takes.
//!
//! When a cell changes, we walk its dependents and mark them dirty. Whether
//! a dirty node actually recomputes is decided lazily, on read.
//!
//! # Design Decisions
//!
//! 1. Storage is centralized per graph instance rather than spread across
//!    the typed handles, so invalidation never has to know value types.
//!
//! 2. Nodes are indexed by id for O(1) lookups, and by fully-qualified name
//!    so module instances cannot collide.
//!
//! 3. We maintain both forward (dependencies) and reverse (dependents) edges.

mod invalidation;
mod node;

pub(crate) use invalidation::InvalidationGraph;
pub use invalidation::{GraphSnapshot, NodeSnapshot};
pub use node::{DirtyState, NodeId, NodeKind, Revision};
