//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation inside a recording
//!    scope and caches the result along with every dependency it read.
//!
//! 2. When accessed again, if it is still clean, the cache is returned and
//!    the computation does not run.
//!
//! 3. When a dependency changes, the memo is marked dirty (direct
//!    dependency) or "maybe dirty" (something further upstream).
//!
//! 4. On next access a "maybe dirty" memo refreshes its dependencies and
//!    recomputes only if one of them ended up at a newer revision.
//!
//! 5. A recomputation that produces a value equal to the cached one keeps
//!    the memo's revision, so dependents reading only this memo stay valid.
//!
//! # Failures
//!
//! If the computation returns an error, the error reaches the caller of
//! [`Memo::get`], the previous cached value is kept and the memo stays dirty,
//! so the next read retries.

use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::runtime::{Graph, Reactive};
use crate::error::{ReactiveError, Result};
use crate::graph::{DirtyState, NodeId, NodeKind, Revision};

type ComputeFn<T> = Box<dyn Fn() -> Result<T> + Send + Sync>;

struct MemoInner<T> {
    id: NodeId,
    name: String,
    graph: Graph,
    compute: ComputeFn<T>,

    /// The cached value (None if never computed).
    value: RwLock<Option<T>>,

    /// Number of times `compute` has run.
    computations: AtomicUsize,
}

/// A cached derived value that recomputes only when dependencies change.
///
/// The PartialEq bound lets the memo detect recomputations that produced
/// the same value and stop invalidation there.
///
/// # Example
///
/// ```rust
/// use reflow_core::Graph;
///
/// let graph = Graph::new();
/// let count = graph.cell("count", 2).unwrap();
///
/// let c = count.clone();
/// let doubled = graph.memo("doubled", move || Ok(c.get() * 2)).unwrap();
///
/// assert_eq!(doubled.get().unwrap(), 4);
/// count.set(5);
/// assert_eq!(doubled.get().unwrap(), 10);
/// ```
pub struct Memo<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<MemoInner<T>>,
}

impl<T> Memo<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Register a memo. The computation does not run until first access.
    pub(crate) fn new<F>(graph: &Graph, name: String, compute: F) -> Result<Self>
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        let id = graph.register(name.clone(), NodeKind::Derived)?;
        let inner = Arc::new(MemoInner {
            id,
            name,
            graph: graph.clone(),
            compute: Box::new(compute),
            value: RwLock::new(None),
            computations: AtomicUsize::new(0),
        });

        let weak: Weak<dyn Reactive> = Arc::downgrade(&inner) as Weak<dyn Reactive>;
        graph.attach(id, weak);

        Ok(Self { inner })
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Fully-qualified name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// Inside a recording scope this registers the memo itself as a
    /// dependency, never the memo's own inputs. The read is registered even
    /// when it fails, so a reader that handles the error still sees the
    /// memo recover.
    pub fn get(&self) -> Result<T> {
        let value = self.get_untracked();
        self.inner.graph.track(self.inner.id);
        value
    }

    /// Get the current value without recording a dependency.
    pub fn get_untracked(&self) -> Result<T> {
        let graph = &self.inner.graph;
        let _guard = graph.lock();

        graph.refresh(self.inner.id)?;

        self.inner
            .value
            .read()
            .clone()
            .ok_or_else(|| ReactiveError::Disposed {
                node: self.inner.name.clone(),
            })
    }

    /// Current dirty state.
    pub fn state(&self) -> DirtyState {
        self.inner
            .graph
            .dirty_state(self.inner.id)
            .unwrap_or(DirtyState::Dirty)
    }

    /// Revision at which the value last changed.
    pub fn revision(&self) -> Revision {
        self.inner
            .graph
            .revision_of(self.inner.id)
            .unwrap_or_default()
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }

    /// Number of times the computation has run, including failed runs.
    pub fn compute_count(&self) -> usize {
        self.inner.computations.load(Ordering::SeqCst)
    }
}

impl<T> Reactive for MemoInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn recompute(&self) -> Result<()> {
        self.computations.fetch_add(1, Ordering::SeqCst);

        let (result, dependencies) = self.graph.record(self.id, || (self.compute)());

        match result {
            Ok(new_value) => {
                let changed = {
                    let mut slot = self.value.write();
                    let changed = slot.as_ref() != Some(&new_value);
                    if changed {
                        *slot = Some(new_value);
                    }
                    changed
                };

                tracing::trace!(
                    node = %self.name,
                    dependencies = dependencies.len(),
                    changed,
                    "memo recomputed"
                );
                self.graph.commit(self.id, dependencies, changed);
                Ok(())
            }
            Err(err) => {
                tracing::debug!(node = %self.name, error = %err, "memo computation failed");
                self.graph.fail(self.id, dependencies);
                Err(err)
            }
        }
    }
}

impl<T> Drop for MemoInner<T> {
    fn drop(&mut self) {
        self.graph.unregister(self.id);
    }
}

impl<T> Clone for Memo<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("compute_count", &self.compute_count())
            .finish()
    }
}
