//! Scope resolution: the scope symbol inside binding text, and the
//! closest-ancestor `data-scope` chain.
//!
//! Binding text may carry scope information through a configurable scope
//! symbol (default `⇢`):
//!
//! - `⇢expr` — resolve the nearest ancestor (inclusive) declaring
//!   `data-scope`, evaluate its declaration in root context, bind `expr`
//!   against the result.
//! - `scopeExpr⇢expr` — `scopeExpr` itself must produce the scope object.
//! - `expr` — no scope; the state graph is the context.
//!
//! A resolution producing a container is a scope. `Null` (or no declaration
//! at all) means "no scope" and the binding evaluates in state context. Any
//! other value is malformed: the binding short-circuits to no value and
//! never silently falls back to the state graph.

use crate::config::Config;
use crate::dom::{attrs, Document, ElementId};
use crate::expr::{BindingKind, EvalContext, EvalMeta, Evaluator};
use crate::host::HostBindings;
use crate::reactive::{ReactiveHandle, Reading};
use crate::value::Value;

/// Where a binding's scope comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopePart<'a> {
    /// No scope symbol in the binding text.
    None,
    /// Leading scope symbol: use the closest ancestor declaration.
    Closest,
    /// Infix scope symbol: the text before it is the scope expression.
    Inline(&'a str),
}

/// Binding text split at the scope symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeSplit<'a> {
    /// The scope part.
    pub part: ScopePart<'a>,
    /// The binding expression proper.
    pub expr: &'a str,
}

/// Split binding text at the configured scope symbol. An empty symbol
/// disables splitting entirely.
pub fn split_scope<'a>(text: &'a str, symbol: &str) -> ScopeSplit<'a> {
    let trimmed = text.trim();
    if symbol.is_empty() {
        return ScopeSplit {
            part: ScopePart::None,
            expr: trimmed,
        };
    }
    if let Some(rest) = trimmed.strip_prefix(symbol) {
        return ScopeSplit {
            part: ScopePart::Closest,
            expr: rest.trim(),
        };
    }
    if let Some(pos) = trimmed.find(symbol) {
        return ScopeSplit {
            part: ScopePart::Inline(trimmed[..pos].trim()),
            expr: trimmed[pos + symbol.len()..].trim(),
        };
    }
    ScopeSplit {
        part: ScopePart::None,
        expr: trimmed,
    }
}

/// A resolved scope object.
#[derive(Debug, Clone)]
pub enum ScopeObject {
    /// A node of the state graph: reads and writes go through the handle,
    /// so writes notify with full key paths.
    Live(ReactiveHandle),
    /// A snapshot produced by a computed scope expression.
    Detached(Value),
}

impl ScopeObject {
    /// A clone of the scope object's current value.
    pub fn value(&self) -> Option<Value> {
        match self {
            Self::Live(handle) => handle.value(),
            Self::Detached(value) => Some(value.clone()),
        }
    }
}

/// The scope argument handed to the evaluator.
#[derive(Debug, Clone, Default)]
pub enum ScopeArg {
    /// Suppress evaluation entirely without resolving a scope at all (the
    /// internal "undefined" sentinel).
    Skip,
    /// No scope; the state graph is the context.
    #[default]
    Default,
    /// Malformed scope: evaluation is skipped and yields no value.
    Invalid,
    /// A resolved scope object.
    Scoped(ScopeObject),
}

/// Resolve the nearest scope declaration, starting from `element` itself
/// and walking upward. The declaration's expression text is evaluated with
/// no scope of its own (root context only).
pub fn resolve_closest_scope(
    dom: &Document,
    element: ElementId,
    state: &ReactiveHandle,
    host: &HostBindings,
    evaluator: &dyn Evaluator,
    config: &Config,
) -> ScopeArg {
    let Some(holder) = dom.closest(element, |data| data.has_attr(attrs::SCOPE)) else {
        return ScopeArg::Default;
    };
    let declaration = dom
        .get(holder)
        .and_then(|data| data.attr(attrs::SCOPE))
        .unwrap_or("")
        .to_owned();
    resolve_scope(&declaration, state, host, evaluator, config, Some(element))
}

/// Resolve an arbitrary scope expression in root context.
///
/// Bare key paths into the state graph resolve to live handles; anything
/// else is evaluated and, when it produces a container, kept as a snapshot.
pub fn resolve_scope(
    expr: &str,
    state: &ReactiveHandle,
    host: &HostBindings,
    evaluator: &dyn Evaluator,
    config: &Config,
    element: Option<ElementId>,
) -> ScopeArg {
    let expr = expr.trim();
    if expr.is_empty() {
        return ScopeArg::Default;
    }
    if let Some(segments) = bare_path(expr) {
        return resolve_live(state, &segments);
    }
    let mut ctx = EvalContext::new(host, state);
    let meta = EvalMeta {
        element,
        kind: BindingKind::Scope,
        diagnostics: config.diagnostics,
    };
    match evaluator.evaluate(expr, &mut ctx, &meta) {
        Some(value) if value.is_container() => ScopeArg::Scoped(ScopeObject::Detached(value)),
        Some(Value::Null) => ScopeArg::Default,
        // Non-null, non-container, and failed scope expressions: the
        // defensive case. Never fall back to state.
        Some(_) | None => ScopeArg::Invalid,
    }
}

/// Split a bare dotted key path (`user`, `user.profile`, `items.0`) into
/// segments. Returns `None` for anything that needs real evaluation.
fn bare_path(expr: &str) -> Option<Vec<&str>> {
    let segments: Vec<&str> = expr.split('.').collect();
    for segment in &segments {
        if segment.is_empty() {
            return None;
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return None;
        }
    }
    // The root segment must be a name; number literals and the literal
    // keywords go through real evaluation.
    let root = segments[0];
    if !root.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        return None;
    }
    if matches!(root, "true" | "false" | "null") {
        return None;
    }
    Some(segments)
}

fn resolve_live(state: &ReactiveHandle, segments: &[&str]) -> ScopeArg {
    let (last, prefix) = segments.split_last().expect("bare paths are non-empty");
    let mut handle = state.clone();
    for segment in prefix {
        match handle.child(segment) {
            Some(child) => handle = child,
            // A broken intermediate is malformed, not "no scope".
            None => return ScopeArg::Invalid,
        }
    }
    match handle.read(last) {
        Some(Reading::Nested(child)) => ScopeArg::Scoped(ScopeObject::Live(child)),
        Some(Reading::Primitive(Value::Null)) | None => ScopeArg::Default,
        Some(Reading::Primitive(_)) => ScopeArg::Invalid,
    }
}
