//! The host document's side of the seam.
//!
//! The engine never touches a real document API directly. Everything it
//! needs from the host (the named-behavior sink, the optional action
//! execution service, the data-refresh collaborator) goes through
//! [`HostSink`]. Host glue implements the trait; every method has a no-op
//! default so a minimal host implements nothing.

use std::collections::HashMap;
use std::rc::Rc;

use crate::dom::ElementId;
use crate::value::Value;

/// A host-provided function callable from expressions.
pub type HostFn = Rc<dyn Fn(&[Value]) -> Value>;

/// The external collaborator interface.
pub trait HostSink {
    /// Broadcast a named behavior event (`"state was changed"`,
    /// `"count was updated"`, changed-behavior hooks, …).
    fn trigger_behavior(&mut self, _name: &str) {}

    /// Execute ad-hoc code through the host's action service. Returns the
    /// produced value, if any. Used by [`HostEvaluator`](crate::expr::HostEvaluator).
    fn run_action(&mut self, _code: &str, _element: Option<ElementId>) -> Option<Value> {
        None
    }

    /// The post-pass data-refresh collaborator
    /// (see [`Config::refresh_data_on_change`](crate::Config::refresh_data_on_change)).
    fn refresh_data(&mut self) {}
}

/// A host that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl HostSink for NullHost {}

/// Document-level values and functions exposed to expressions.
///
/// These sit between the evaluator-injected element bindings and the
/// scope/state layers during name resolution. Reads only; writes from
/// expressions never land here.
#[derive(Clone, Default)]
pub struct HostBindings {
    values: HashMap<String, Value>,
    functions: HashMap<String, HostFn>,
}

impl HostBindings {
    /// Create an empty set of host bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose a value under a name.
    pub fn insert_value(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Expose a callable function under a name.
    pub fn insert_fn(
        &mut self,
        name: impl Into<String>,
        function: impl Fn(&[Value]) -> Value + 'static,
    ) {
        self.functions.insert(name.into(), Rc::new(function));
    }

    /// Look up a value binding.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Look up a function binding.
    pub fn function(&self, name: &str) -> Option<&HostFn> {
        self.functions.get(name)
    }

    /// Whether any binding (value or function) uses this name.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name) || self.functions.contains_key(name)
    }
}

impl std::fmt::Debug for HostBindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBindings")
            .field("values", &self.values.keys())
            .field("functions", &self.functions.keys())
            .finish()
    }
}
