//! Output Implementation
//!
//! An Output is the terminal consumer of a graph: the thing that finally
//! looks at derived values, such as a rendered table.
//!
//! # How Outputs Work
//!
//! 1. An output is created lazily; nothing runs until the first
//!    [`render`](Output::render).
//!
//! 2. Rendering runs the render function inside a recording scope and keeps
//!    the result, like a memo.
//!
//! 3. When any upstream cell changes, the output goes stale and every
//!    callback registered with [`on_invalidate`](Output::on_invalidate)
//!    fires once. The presentation layer then decides when to re-render.
//!
//! # Differences from Memo
//!
//! - Outputs are never recorded as dependencies; nothing reads them.
//! - Outputs push a notification when they go stale; memos stay silent.
//! - Outputs do not need `PartialEq`, since there is nobody to cut off.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use super::runtime::{Graph, Reactive};
use crate::error::{ReactiveError, Result};
use crate::graph::{DirtyState, NodeId, NodeKind};

type RenderFn<T> = Box<dyn Fn() -> Result<T> + Send + Sync>;
type Callback = Arc<dyn Fn() + Send + Sync>;

struct OutputInner<T> {
    id: NodeId,
    name: String,
    graph: Graph,
    render: RenderFn<T>,
    value: RwLock<Option<T>>,
    callbacks: Mutex<Vec<Callback>>,
    disposed: AtomicBool,
    render_count: AtomicUsize,
}

/// A terminal consumer that pulls values out of the graph.
///
/// # Example
///
/// ```rust
/// use reflow_core::Graph;
///
/// let graph = Graph::new();
/// let name = graph.cell("name", String::from("world")).unwrap();
///
/// let n = name.clone();
/// let greeting = graph.output("greeting", move || Ok(format!("hello {}", n.get()))).unwrap();
///
/// assert_eq!(greeting.render().unwrap(), "hello world");
/// name.set("there".into());
/// assert!(greeting.is_stale());
/// assert_eq!(greeting.render().unwrap(), "hello there");
/// ```
pub struct Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<OutputInner<T>>,
}

impl<T> Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new<F>(graph: &Graph, name: String, render: F) -> Result<Self>
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        let id = graph.register(name.clone(), NodeKind::Output)?;
        let inner = Arc::new(OutputInner {
            id,
            name,
            graph: graph.clone(),
            render: Box::new(render),
            value: RwLock::new(None),
            callbacks: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
            render_count: AtomicUsize::new(0),
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

    /// Produce the current value, re-running the render function only if
    /// something it read has changed.
    pub fn render(&self) -> Result<T> {
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

    /// Whether the next render will re-run the render function.
    pub fn is_stale(&self) -> bool {
        self.inner
            .graph
            .dirty_state(self.inner.id)
            .map(|state| state != DirtyState::Clean)
            .unwrap_or(true)
    }

    /// Register a callback that fires each time the output goes stale.
    pub fn on_invalidate<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.callbacks.lock().push(Arc::new(callback));
    }

    /// Stop notifying callbacks. Rendering still works.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        self.inner.callbacks.lock().clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Number of times the render function has run.
    pub fn render_count(&self) -> usize {
        self.inner.render_count.load(Ordering::SeqCst)
    }
}

impl<T> Reactive for OutputInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn recompute(&self) -> Result<()> {
        self.render_count.fetch_add(1, Ordering::SeqCst);

        let (result, dependencies) = self.graph.record(self.id, || (self.render)());

        match result {
            Ok(value) => {
                *self.value.write() = Some(value);
                tracing::trace!(node = %self.name, dependencies = dependencies.len(), "output rendered");
                self.graph.commit(self.id, dependencies, true);
                Ok(())
            }
            Err(err) => {
                tracing::debug!(node = %self.name, error = %err, "output render failed");
                self.graph.fail(self.id, dependencies);
                Err(err)
            }
        }
    }

    fn invalidated(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        // Callbacks may subscribe or dispose, so run them unlocked.
        let callbacks: Vec<Callback> = self.callbacks.lock().clone();
        for callback in callbacks {
            if self.disposed.load(Ordering::SeqCst) {
                break;
            }
            callback();
        }
    }
}

impl<T> Drop for OutputInner<T> {
    fn drop(&mut self) {
        self.graph.unregister(self.id);
    }
}

impl<T> Clone for Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Output")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("render_count", &self.render_count())
            .field("stale", &self.is_stale())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
