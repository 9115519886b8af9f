//! Modules and Namespaces
//!
//! A module is a reusable bundle of cells, memos and outputs. Instantiating
//! it under an instance id builds a fresh copy whose nodes are all named
//! `instance/local`, so the same module can appear many times in one graph.
//!
//! Only what the module explicitly [exposes](Scope::expose) is reachable
//! from the parent, through the returned [`Bindings`].
//!
//! ```rust
//! use reflow_core::{Graph, Module, Result, Scope};
//!
//! struct Counter;
//!
//! impl Module for Counter {
//!     type Args = i64;
//!
//!     fn build(&self, scope: &mut Scope, start: i64) -> Result<()> {
//!         let count = scope.cell("count", start)?;
//!         let c = count.clone();
//!         let doubled = scope.memo("doubled", move || Ok(c.get() * 2))?;
//!         scope.expose("count", count)?;
//!         scope.expose("doubled", doubled)
//!     }
//! }
//!
//! let graph = Graph::new();
//! let left = graph.instantiate(&Counter, "left", 1).unwrap();
//! let right = graph.instantiate(&Counter, "right", 1).unwrap();
//!
//! left.cell::<i64>("count").unwrap().set(10);
//! assert_eq!(left.memo::<i64>("doubled").unwrap().get().unwrap(), 20);
//! assert_eq!(right.memo::<i64>("doubled").unwrap().get().unwrap(), 2);
//! ```

use std::any::{type_name, Any};

use indexmap::IndexMap;

use crate::error::{ReactiveError, Result};
use crate::graph::NodeId;
use crate::reactive::{Cell, Graph, Memo, Output};

/// Separator between namespace segments in fully-qualified names.
pub const SEPARATOR: char = '/';

/// A reusable graph fragment.
pub trait Module {
    /// Construction arguments passed to each instance.
    type Args;

    /// Create this module's nodes in `scope` and expose its public contract.
    fn build(&self, scope: &mut Scope, args: Self::Args) -> Result<()>;
}

/// The namespace a module instance is being built in.
pub struct Scope {
    graph: Graph,
    prefix: String,
    exports: IndexMap<String, Box<dyn Any + Send + Sync>>,
    created: Vec<NodeId>,
}

impl Scope {
    fn new(graph: &Graph, prefix: String) -> Self {
        Self {
            graph: graph.clone(),
            prefix,
            exports: IndexMap::new(),
            created: Vec::new(),
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The fully-qualified prefix of this instance, e.g. `panel/left`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Fully-qualified name for a local name.
    pub fn qualify(&self, local: &str) -> String {
        format!("{}{}{}", self.prefix, SEPARATOR, local)
    }

    pub fn cell<T>(&mut self, local: &str, value: T) -> Result<Cell<T>>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        let cell = self.graph.cell(self.qualify(local), value)?;
        self.created.push(cell.id());
        Ok(cell)
    }

    pub fn memo<T, F>(&mut self, local: &str, compute: F) -> Result<Memo<T>>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        let memo = self.graph.memo(self.qualify(local), compute)?;
        self.created.push(memo.id());
        Ok(memo)
    }

    pub fn output<T, F>(&mut self, local: &str, render: F) -> Result<Output<T>>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        let output = self.graph.output(self.qualify(local), render)?;
        self.created.push(output.id());
        Ok(output)
    }

    /// Instantiate a child module inside this namespace.
    pub fn instantiate<M: Module>(
        &mut self,
        module: &M,
        instance_id: &str,
        args: M::Args,
    ) -> Result<Bindings> {
        validate_instance_id(instance_id)?;
        let (bindings, created) = build(&self.graph, self.qualify(instance_id), module, args)?;
        self.created.extend(created);
        Ok(bindings)
    }

    /// Make a handle available to the parent under `name`.
    pub fn expose<H>(&mut self, name: &str, handle: H) -> Result<()>
    where
        H: Any + Send + Sync,
    {
        if self.exports.contains_key(name) {
            return Err(ReactiveError::DuplicateName {
                name: self.qualify(name),
            });
        }
        self.exports.insert(name.to_owned(), Box::new(handle));
        Ok(())
    }

    fn rollback(&self) {
        for id in self.created.iter().rev() {
            self.graph.unregister(*id);
        }
    }
}

/// The public contract of one module instance.
pub struct Bindings {
    namespace: String,
    entries: IndexMap<String, Box<dyn Any + Send + Sync>>,
}

impl Bindings {
    /// The instance's fully-qualified prefix.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Exposed names, in the order the module exposed them.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Look up an exposed handle of type `H`.
    pub fn get<H>(&self, name: &str) -> Result<H>
    where
        H: Any + Clone,
    {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| ReactiveError::UnknownBinding {
                namespace: self.namespace.clone(),
                name: name.to_owned(),
            })?;

        entry
            .downcast_ref::<H>()
            .cloned()
            .ok_or_else(|| ReactiveError::BindingType {
                namespace: self.namespace.clone(),
                name: name.to_owned(),
                expected: type_name::<H>(),
            })
    }

    pub fn cell<T>(&self, name: &str) -> Result<Cell<T>>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        self.get(name)
    }

    pub fn memo<T>(&self, name: &str) -> Result<Memo<T>>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        self.get(name)
    }

    pub fn output<T>(&self, name: &str) -> Result<Output<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.get(name)
    }

    /// Nested bindings of a child instance the module exposed.
    pub fn child(&self, name: &str) -> Result<&Bindings> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| ReactiveError::UnknownBinding {
                namespace: self.namespace.clone(),
                name: name.to_owned(),
            })?;

        entry
            .downcast_ref::<Bindings>()
            .ok_or_else(|| ReactiveError::BindingType {
                namespace: self.namespace.clone(),
                name: name.to_owned(),
                expected: type_name::<Bindings>(),
            })
    }
}

impl std::fmt::Debug for Bindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bindings")
            .field("namespace", &self.namespace)
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Graph {
    /// Build a fresh instance of `module` named `instance_id`.
    ///
    /// Every node the module creates is named `instance_id/local`. If the
    /// module fails to build, the nodes it already created are removed.
    pub fn instantiate<M: Module>(
        &self,
        module: &M,
        instance_id: &str,
        args: M::Args,
    ) -> Result<Bindings> {
        validate_instance_id(instance_id)?;
        let (bindings, _) = build(self, instance_id.to_owned(), module, args)?;
        Ok(bindings)
    }
}

fn validate_instance_id(id: &str) -> Result<()> {
    if id.is_empty() || id.contains(SEPARATOR) {
        return Err(ReactiveError::InvalidInstanceId { id: id.to_owned() });
    }
    Ok(())
}

fn build<M: Module>(
    graph: &Graph,
    prefix: String,
    module: &M,
    args: M::Args,
) -> Result<(Bindings, Vec<NodeId>)> {
    let _guard = graph.lock();
    let mut scope = Scope::new(graph, prefix);

    if let Err(err) = module.build(&mut scope, args) {
        tracing::debug!(namespace = %scope.prefix, error = %err, "module build failed");
        scope.rollback();
        return Err(err);
    }

    tracing::debug!(
        namespace = %scope.prefix,
        nodes = scope.created.len(),
        exports = scope.exports.len(),
        "instantiated module"
    );

    let bindings = Bindings {
        namespace: scope.prefix,
        entries: scope.exports,
    };
    Ok((bindings, scope.created))
}
