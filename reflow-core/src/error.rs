//! Error Types
//!
//! Every fallible engine operation returns [`ReactiveError`]. Errors are
//! never swallowed: a read either yields a value that is fresh as of the call
//! or one of these variants.

use thiserror::Error;

/// Boxed domain error carried by [`ReactiveError::ComputeFailure`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;

/// Errors raised by the reactive engine.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A node was re-entered while it was still evaluating.
    ///
    /// `cycle` lists the fully-qualified node names starting and ending
    /// with the re-entered node.
    #[error("cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// The domain compute function of a node failed.
    #[error(transparent)]
    ComputeFailure(BoxError),

    /// A namespace lookup asked for a name the module never exposed.
    #[error("module instance `{namespace}` does not expose `{name}`")]
    UnknownBinding { namespace: String, name: String },

    /// A binding exists but holds a different handle type.
    #[error("binding `{namespace}/{name}` is not a {expected}")]
    BindingType {
        namespace: String,
        name: String,
        expected: &'static str,
    },

    /// A fully-qualified name was registered twice in the same graph.
    #[error("name `{name}` is already registered in this graph")]
    DuplicateName { name: String },

    /// Instance ids must be non-empty and must not contain `/`.
    #[error("invalid module instance id `{id}`")]
    InvalidInstanceId { id: String },

    /// Nested evaluation went deeper than the configured limit.
    #[error("evaluation depth limit {limit} exceeded at `{node}`")]
    DepthExceeded { limit: usize, node: String },

    /// A dependency's handle was dropped while still referenced.
    #[error("node `{node}` has been disposed")]
    Disposed { node: String },

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl ReactiveError {
    /// Wrap a domain error as a compute failure.
    pub fn compute<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        ReactiveError::ComputeFailure(error.into())
    }

    /// Whether this error is a [`ReactiveError::CyclicDependency`].
    pub fn is_cycle(&self) -> bool {
        matches!(self, ReactiveError::CyclicDependency { .. })
    }
}
