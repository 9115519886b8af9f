//! Reflow Core
//!
//! This crate provides a dependency-tracking reactive computation engine.
//! It implements:
//!
//! - Reactive primitives (cells, memos, outputs)
//! - Automatic dependency discovery through recording scopes
//! - Incremental invalidation with lazy, verified recomputation
//! - Namespaced modules that can be instantiated many times in one graph
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and the graph runtime
//! - `graph`: Dependency graph bookkeeping and invalidation
//! - `module`: Namespaces and reusable graph fragments
//! - `session`: Independent graphs per user session
//! - `filter`: Column filters and the filter-panel module
//!
//! # Example
//!
//! ```rust
//! use reflow_core::Graph;
//!
//! let graph = Graph::new();
//!
//! // Create a cell
//! let count = graph.cell("count", 0).unwrap();
//!
//! // Create a derived value
//! let c = count.clone();
//! let doubled = graph.memo("doubled", move || Ok(c.get() * 2)).unwrap();
//!
//! // Update the cell; the memo recomputes on its next read
//! count.set(5);
//! assert_eq!(doubled.get().unwrap(), 10);
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod graph;
pub mod module;
pub mod reactive;
pub mod session;

pub use config::{GraphConfig, WritePolicy};
pub use error::{ReactiveError, Result};
pub use module::{Bindings, Module, Scope};
pub use reactive::{Cell, Graph, Memo, Output};
pub use session::SessionRegistry;
