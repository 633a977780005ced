//! The default sandboxed expression interpreter.
//!
//! A tree-walking interpreter over [`Value`]. Name resolution consults an
//! explicit, ordered list of layers, most specific first:
//!
//! 1. evaluator-injected element bindings (the current element's
//!    descriptor, under the [`ELEMENT_ALIASES`]),
//! 2. host-provided bindings ([`HostBindings`] values; functions resolve
//!    at call sites),
//! 3. the scope object when one is resolved, **else** the state root.
//!
//! Writes never target the element/host layers: assignment lands on the
//! scope object when one is resolved, otherwise on the state graph, where
//! it flows through reactive handles and therefore notifies.
//!
//! Names missing from every layer read as [`Value::Null`] rather than
//! failing, so a bare unknown name renders as empty content instead of
//! reporting an error.

use crate::host::HostBindings;
use crate::reactive::ReactiveHandle;
use crate::scope::{ScopeArg, ScopeObject};
use crate::value::Value;

use super::parser::{parse_program, BinaryOp, Expr, ParseError, UnaryOp};
use super::{EvalMeta, Evaluator};

/// The aliases the current element's descriptor is injected under.
pub const ELEMENT_ALIASES: [&str; 2] = ["element", "elm"];

/// Errors from expression evaluation. Callers of [`Evaluator::evaluate`]
/// never see these; they are caught at the evaluator boundary and reported
/// to the observability sink.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("`{0}` is not a callable host function")]
    NotCallable(String),
    #[error("cannot read member `{key}` of null")]
    MemberOfNull { key: String },
    #[error("invalid index of type {index} into {target}")]
    BadIndex {
        target: &'static str,
        index: &'static str,
    },
    #[error("invalid operands for `{op}`: {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("cannot negate a {0}")]
    BadNegation(&'static str),
    #[error("cannot assign through `{0}`")]
    BadAssignPath(String),
}

/// The evaluation context: the ordered lookup layers.
pub struct EvalContext<'a> {
    /// The current element's descriptor, if a binding is being evaluated.
    pub element: Option<Value>,
    /// Host-provided values and functions.
    pub host: &'a HostBindings,
    /// The resolved scope argument for this evaluation.
    pub scope: ScopeArg,
    /// The state graph root.
    pub state: &'a ReactiveHandle,
}

impl<'a> EvalContext<'a> {
    /// Root context: no element, no scope.
    pub fn new(host: &'a HostBindings, state: &'a ReactiveHandle) -> Self {
        Self {
            element: None,
            host,
            scope: ScopeArg::Default,
            state,
        }
    }

    /// Attach a resolved scope argument (builder).
    pub fn with_scope(mut self, scope: ScopeArg) -> Self {
        self.scope = scope;
        self
    }

    /// Attach the current element's descriptor (builder).
    pub fn with_element(mut self, descriptor: Value) -> Self {
        self.element = Some(descriptor);
        self
    }
}

impl std::fmt::Debug for EvalContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvalContext")
            .field("element", &self.element.is_some())
            .field("scope", &self.scope)
            .finish()
    }
}

/// The safe default evaluator: sandboxed parse + tree walk, no host code.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExprEvaluator;

impl Evaluator for ExprEvaluator {
    fn evaluate(&self, source: &str, ctx: &mut EvalContext<'_>, meta: &EvalMeta) -> Option<Value> {
        match ctx.scope {
            // The undefined sentinel: suppress evaluation without touching
            // the scope chain at all.
            ScopeArg::Skip => return None,
            // Malformed scope must never silently fall back to state.
            ScopeArg::Invalid => return None,
            _ => {}
        }
        match run(source, ctx) {
            Ok(value) => Some(value),
            Err(err) => {
                super::report_failure(&err, source, meta);
                None
            }
        }
    }
}

fn run(source: &str, ctx: &mut EvalContext<'_>) -> Result<Value, EvalError> {
    let program = parse_program(source)?;
    let mut result = Value::Null;
    for expr in &program.body {
        result = eval_expr(expr, ctx)?;
    }
    Ok(result)
}

fn eval_expr(expr: &Expr, ctx: &mut EvalContext<'_>) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Ident(name) => Ok(read_name(ctx, name)),
        Expr::Member(base, key) => {
            let base = eval_expr(base, ctx)?;
            read_member(&base, key)
        }
        Expr::Index(base, index) => {
            let base_v = eval_expr(base, ctx)?;
            let index_v = eval_expr(index, ctx)?;
            let key = index_key(&base_v, &index_v)?;
            read_member(&base_v, &key)
        }
        Expr::Call(name, args) => {
            let Some(function) = ctx.host.function(name).cloned() else {
                return Err(EvalError::NotCallable(name.clone()));
            };
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_expr(arg, ctx)?);
            }
            Ok(function(&values))
        }
        Expr::Unary(op, operand) => {
            let value = eval_expr(operand, ctx)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
                UnaryOp::Neg => value
                    .as_number()
                    .map(|n| Value::Number(-n))
                    .ok_or(EvalError::BadNegation(value.type_name())),
            }
        }
        Expr::Binary(op, left, right) => eval_binary(*op, left, right, ctx),
        Expr::Ternary {
            cond,
            then,
            otherwise,
        } => {
            if eval_expr(cond, ctx)?.truthy() {
                eval_expr(then, ctx)
            } else {
                eval_expr(otherwise, ctx)
            }
        }
        Expr::Assign(target, value) => {
            let value = eval_expr(value, ctx)?;
            let place = flatten_place(target, ctx)?;
            write_place(ctx, &place, value.clone())?;
            // Assignment evaluates to the assigned value.
            Ok(value)
        }
    }
}

/// Read a bare name through the layers.
fn read_name(ctx: &EvalContext<'_>, name: &str) -> Value {
    if let Some(descriptor) = &ctx.element {
        if ELEMENT_ALIASES.contains(&name) {
            return descriptor.clone();
        }
    }
    if let Some(value) = ctx.host.value(name) {
        return value.clone();
    }
    match &ctx.scope {
        ScopeArg::Scoped(ScopeObject::Live(handle)) => handle.get(name).unwrap_or(Value::Null),
        ScopeArg::Scoped(ScopeObject::Detached(object)) => {
            object.get(name).cloned().unwrap_or(Value::Null)
        }
        _ => ctx.state.get(name).unwrap_or(Value::Null),
    }
}

/// Member read policy: containers yield the member (or `Null` when
/// absent); `null` has no members at all; other primitives read as `Null`.
fn read_member(base: &Value, key: &str) -> Result<Value, EvalError> {
    match base {
        Value::Null => Err(EvalError::MemberOfNull {
            key: key.to_owned(),
        }),
        base if base.is_container() => Ok(base.get(key).cloned().unwrap_or(Value::Null)),
        _ => Ok(Value::Null),
    }
}

/// Turn an index value into a member key for the given base.
fn index_key(base: &Value, index: &Value) -> Result<String, EvalError> {
    match index {
        Value::Str(s) => Ok(s.clone()),
        Value::Number(_) => Ok(index.to_string()),
        _ => Err(EvalError::BadIndex {
            target: base.type_name(),
            index: index.type_name(),
        }),
    }
}

fn eval_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    ctx: &mut EvalContext<'_>,
) -> Result<Value, EvalError> {
    // Short-circuit operators keep operand values, script-style:
    // `a || b` is `a` when truthy, `a && b` is `a` when falsy.
    match op {
        BinaryOp::And => {
            let l = eval_expr(left, ctx)?;
            return if l.truthy() { eval_expr(right, ctx) } else { Ok(l) };
        }
        BinaryOp::Or => {
            let l = eval_expr(left, ctx)?;
            return if l.truthy() { Ok(l) } else { eval_expr(right, ctx) };
        }
        _ => {}
    }

    let l = eval_expr(left, ctx)?;
    let r = eval_expr(right, ctx)?;
    let mismatch = |op: &'static str| EvalError::TypeMismatch {
        op,
        left: l.type_name(),
        right: r.type_name(),
    };
    match op {
        BinaryOp::Add => match (&l, &r) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            // String concatenation when either side is a string.
            (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::Str(format!("{l}{r}"))),
            _ => Err(mismatch("+")),
        },
        BinaryOp::Sub => numeric(&l, &r, mismatch("-")).map(|(a, b)| Value::Number(a - b)),
        BinaryOp::Mul => numeric(&l, &r, mismatch("*")).map(|(a, b)| Value::Number(a * b)),
        BinaryOp::Div => numeric(&l, &r, mismatch("/")).map(|(a, b)| Value::Number(a / b)),
        BinaryOp::Rem => numeric(&l, &r, mismatch("%")).map(|(a, b)| Value::Number(a % b)),
        BinaryOp::Eq => Ok(Value::Bool(l == r)),
        BinaryOp::Ne => Ok(Value::Bool(l != r)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&l, &r) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => return Err(mismatch("comparison")),
            };
            // NaN comparisons are false across the board.
            let result = ordering.is_some_and(|o| match op {
                BinaryOp::Lt => o.is_lt(),
                BinaryOp::Le => o.is_le(),
                BinaryOp::Gt => o.is_gt(),
                BinaryOp::Ge => o.is_ge(),
                _ => unreachable!(),
            });
            Ok(Value::Bool(result))
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn numeric(l: &Value, r: &Value, err: EvalError) -> Result<(f64, f64), EvalError> {
    match (l.as_number(), r.as_number()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(err),
    }
}

/// An assignment place flattened to a root name plus member segments.
struct Place {
    root: String,
    segments: Vec<String>,
}

impl Place {
    fn dotted(&self) -> String {
        let mut out = self.root.clone();
        for segment in &self.segments {
            out.push('.');
            out.push_str(segment);
        }
        out
    }
}

fn flatten_place(expr: &Expr, ctx: &mut EvalContext<'_>) -> Result<Place, EvalError> {
    match expr {
        Expr::Ident(name) => Ok(Place {
            root: name.clone(),
            segments: Vec::new(),
        }),
        Expr::Member(base, key) => {
            let mut place = flatten_place(base, ctx)?;
            place.segments.push(key.clone());
            Ok(place)
        }
        Expr::Index(base, index) => {
            let index_v = eval_expr(index, ctx)?;
            let mut place = flatten_place(base, ctx)?;
            let key = index_key(&Value::Null, &index_v).map_err(|_| EvalError::BadIndex {
                target: "place",
                index: index_v.type_name(),
            })?;
            place.segments.push(key);
            Ok(place)
        }
        // The parser only produces places for assignment targets.
        _ => Err(EvalError::BadAssignPath(format!("{expr:?}"))),
    }
}

/// Write a place through the lowest layer: the scope object when resolved,
/// otherwise the state graph.
fn write_place(ctx: &mut EvalContext<'_>, place: &Place, value: Value) -> Result<(), EvalError> {
    match &mut ctx.scope {
        ScopeArg::Scoped(ScopeObject::Live(handle)) => {
            write_through_handle(handle.clone(), place, value)
        }
        ScopeArg::Scoped(ScopeObject::Detached(object)) => {
            // A detached scope is a snapshot; the write is visible for the
            // remainder of this evaluation only.
            write_into_value(object, place, value)
        }
        _ => write_through_handle(ctx.state.clone(), place, value),
    }
}

fn write_through_handle(
    handle: ReactiveHandle,
    place: &Place,
    value: Value,
) -> Result<(), EvalError> {
    let mut node = handle;
    let mut last = place.root.as_str();
    for segment in &place.segments {
        node = node
            .child(last)
            .ok_or_else(|| EvalError::BadAssignPath(place.dotted()))?;
        last = segment;
    }
    if node.set(last, value) {
        Ok(())
    } else {
        Err(EvalError::BadAssignPath(place.dotted()))
    }
}

fn write_into_value(target: &mut Value, place: &Place, value: Value) -> Result<(), EvalError> {
    let mut node = target;
    let mut last = place.root.as_str();
    for segment in &place.segments {
        node = node
            .get_mut(last)
            .ok_or_else(|| EvalError::BadAssignPath(place.dotted()))?;
        last = segment;
    }
    if node.insert(last, value) {
        Ok(())
    } else {
        Err(EvalError::BadAssignPath(place.dotted()))
    }
}
