//! Reactive Primitives
//!
//! This module implements the core reactive system: cells, memos, and
//! outputs, plus the runtime that ties them to a graph.
//!
//! # Concepts
//!
//! ## Cells
//!
//! A Cell is a container for mutable input. When a cell is read within a
//! recording scope (a memo or output evaluating), the read is recorded with
//! the cell's revision. When the cell is written, everything that read it is
//! marked stale.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates only
//! when one of its dependencies moved to a newer revision.
//!
//! ## Outputs
//!
//! An Output is the terminal consumer. It renders on demand and tells the
//! presentation layer when its last rendering went stale.
//!
//! # Implementation Notes
//!
//! Dependencies are discovered, not declared. A thread-local stack of
//! recording scopes captures every tracked read while a computation runs,
//! and the node's edges are replaced with exactly what it read.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod cell;
mod context;
mod memo;
mod output;
mod runtime;

pub use cell::Cell;
pub use context::ReactiveContext;
pub use memo::Memo;
pub use output::Output;
pub use runtime::{Graph, Reactive};
