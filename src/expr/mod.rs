//! The expression layer: tokenizer, parser, and pluggable evaluation.
//!
//! Bindings carry expression text; the refresh engine hands that text to an
//! [`Evaluator`]. Two implementations ship:
//!
//! - [`ExprEvaluator`] — the safe default: a sandboxed parse-and-walk
//!   interpreter over [`Value`](crate::Value).
//! - [`HostEvaluator`] — delegates the raw source to the host's
//!   action-execution service ([`HostSink::run_action`]).
//!
//! Callers never depend on which implementation is active: both honor the
//! scope sentinels, both catch every failure at this boundary, and both
//! yield `None` for "no value".

pub mod eval;
pub mod parser;
pub mod tokenizer;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::dom::ElementId;
use crate::host::HostSink;
use crate::value::Value;

pub use eval::{EvalContext, EvalError, ExprEvaluator, ELEMENT_ALIASES};
pub use parser::{parse_program, ParseError, Program};

/// What kind of consumer is evaluating, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// A content binding.
    Content,
    /// A visibility binding.
    Visibility,
    /// An effect binding.
    Effect,
    /// A template interpolation token.
    Template,
    /// A scope declaration or inline scope expression.
    Scope,
    /// A changed-action hook.
    Action,
    /// Ad-hoc code (triggered behaviors, `run_code`).
    Code,
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Content => "content",
            Self::Visibility => "visibility",
            Self::Effect => "effect",
            Self::Template => "template",
            Self::Scope => "scope",
            Self::Action => "action",
            Self::Code => "code",
        };
        write!(f, "{name}")
    }
}

/// Diagnostic context for one evaluation.
#[derive(Debug, Clone)]
pub struct EvalMeta {
    /// The element whose binding is being evaluated, if any.
    pub element: Option<ElementId>,
    /// The binding kind.
    pub kind: BindingKind,
    /// Whether failures are reported at warn level with full context.
    pub diagnostics: bool,
}

/// A pluggable expression evaluator.
///
/// Contract: honor the scope sentinels ([`ScopeArg::Skip`] and
/// [`ScopeArg::Invalid`](crate::scope::ScopeArg) both yield `None` without
/// evaluating), catch every failure, and return `None` for "no value".
/// Content consumers render no value as empty; visibility consumers coerce
/// it to hidden.
pub trait Evaluator {
    /// Evaluate `source` against the context layers.
    fn evaluate(&self, source: &str, ctx: &mut EvalContext<'_>, meta: &EvalMeta) -> Option<Value>;
}

/// An evaluator that defers to the host's action-execution service.
pub struct HostEvaluator {
    host: Rc<RefCell<dyn HostSink>>,
}

impl HostEvaluator {
    /// Delegate every evaluation to `host`'s [`HostSink::run_action`].
    pub fn new(host: Rc<RefCell<dyn HostSink>>) -> Self {
        Self { host }
    }
}

impl fmt::Debug for HostEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostEvaluator").finish()
    }
}

impl Evaluator for HostEvaluator {
    fn evaluate(&self, source: &str, ctx: &mut EvalContext<'_>, meta: &EvalMeta) -> Option<Value> {
        use crate::scope::ScopeArg;
        match ctx.scope {
            ScopeArg::Skip | ScopeArg::Invalid => None,
            _ => self.host.borrow_mut().run_action(source, meta.element),
        }
    }
}

/// Classify a string as code rather than a bare literal: any of `;`, `=`,
/// `(`, `)`. Used by the triggered-behavior glue and the equals-notification
/// guard; bindings are always evaluated as expressions regardless.
pub fn is_code(text: &str) -> bool {
    text.contains(|c| matches!(c, ';' | '=' | '(' | ')'))
}

/// Report an evaluation failure to the observability sink. Warn level with
/// expression and element context in diagnostics mode, debug otherwise.
pub(crate) fn report_failure(err: &EvalError, source: &str, meta: &EvalMeta) {
    if meta.diagnostics {
        tracing::warn!(
            target: "weft::expr",
            error = %err,
            expr = source,
            element = ?meta.element,
            kind = %meta.kind,
            "expression evaluation failed"
        );
    } else {
        tracing::debug!(
            target: "weft::expr",
            error = %err,
            expr = source,
            "expression evaluation failed"
        );
    }
}
