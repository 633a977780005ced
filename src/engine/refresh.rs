//! The refresh pass: one full enumeration-and-write cycle over all
//! bindings in the document.
//!
//! Per pass: an optional notification phase for the triggering change,
//! then every bound element in document order. Per element the kinds run
//! in fixed order — visibility, then effect, then content-or-template —
//! and the closest-ancestor scope is resolved at most once and shared
//! between them. Every write is compute-fully → compare → write, so an
//! unchanged refresh performs zero writes, and a failing binding never
//! aborts the pass.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::config::Config;
use crate::dom::{attrs, Display, Document, ElementId, Visibility};
use crate::expr::{BindingKind, EvalContext, EvalMeta, Evaluator};
use crate::host::{HostBindings, HostSink};
use crate::reactive::{Change, ReactiveHandle};
use crate::scope::{resolve_closest_scope, resolve_scope, split_scope, ScopeArg, ScopePart};
use crate::template::{interpolate, TemplateKey, TemplateStore};

use super::notify;

/// The per-document update hook, invoked after the notification phase.
pub type UpdateHook = Box<dyn FnMut(&Change)>;

/// One refresh pass over a session's document. Borrows the session's parts
/// disjointly; constructed fresh for every pass.
pub(crate) struct RefreshPass<'a> {
    pub dom: &'a mut Document,
    pub config: &'a Config,
    pub templates: &'a TemplateStore,
    pub state: &'a ReactiveHandle,
    pub host_bindings: &'a HostBindings,
    pub host: &'a Rc<RefCell<dyn HostSink>>,
    pub evaluator: &'a dyn Evaluator,
    pub deferred_behaviors: &'a mut Vec<String>,
    pub update_hook: &'a mut Option<UpdateHook>,
}

impl RefreshPass<'_> {
    /// Run the pass. `change` is the triggering mutation, if any — forced
    /// refreshes skip the notification phase.
    pub fn run(&mut self, change: Option<&Change>) {
        if let Some(change) = change {
            self.notify(change);
        }

        let elements = self.dom.bound_elements();
        let mut visibility_fired: HashSet<ElementId> = HashSet::new();
        let mut content_fired: HashSet<ElementId> = HashSet::new();

        for el in elements {
            let Some(data) = self.dom.get(el) else { continue };
            let visibility = data.attr(attrs::VISIBILITY).map(str::to_owned);
            let effect = data.attr(attrs::EFFECT).map(str::to_owned);
            let content = data.attr(attrs::CONTENT).map(str::to_owned);
            let template = data
                .has_attr(attrs::TEMPLATE)
                .then(|| data.attr(attrs::TEMPLATE).unwrap_or("").to_owned());

            // The closest-ancestor scope is resolved at most once per
            // element and shared across its bindings.
            let mut closest: Option<ScopeArg> = None;

            if let Some(text) = visibility {
                self.refresh_visibility(el, &text, &mut closest, &mut visibility_fired);
            }
            if let Some(text) = effect {
                self.eval_binding(el, &text, BindingKind::Effect, &mut closest);
            }
            if let Some(text) = content {
                self.refresh_content(el, &text, &mut closest, &mut content_fired);
            } else if let Some(name) = template {
                self.refresh_template(el, &name, &mut closest, &mut content_fired);
            }
        }

        if self.config.refresh_data_on_change {
            self.host.borrow_mut().refresh_data();
        }
    }

    /// The notification phase: key-level events, the generic event, then
    /// the registered update hook.
    fn notify(&mut self, change: &Change) {
        {
            let mut host = self.host.borrow_mut();
            host.trigger_behavior(&notify::update_event(&change.path));
            if let Some(event) = notify::equals_event(&change.path, &change.value) {
                host.trigger_behavior(&event);
            }
            host.trigger_behavior(notify::STATE_CHANGED);
        }
        if let Some(hook) = self.update_hook.as_mut() {
            hook(change);
        }
    }

    /// Resolve the binding's scope (sharing the closest-ancestor memo) and
    /// evaluate its expression.
    fn eval_binding(
        &self,
        el: ElementId,
        text: &str,
        kind: BindingKind,
        closest: &mut Option<ScopeArg>,
    ) -> Option<crate::value::Value> {
        let split = split_scope(text, &self.config.scope_symbol);
        let scope = match split.part {
            ScopePart::None => ScopeArg::Default,
            ScopePart::Closest => closest
                .get_or_insert_with(|| {
                    resolve_closest_scope(
                        self.dom,
                        el,
                        self.state,
                        self.host_bindings,
                        self.evaluator,
                        self.config,
                    )
                })
                .clone(),
            ScopePart::Inline(scope_expr) => resolve_scope(
                scope_expr,
                self.state,
                self.host_bindings,
                self.evaluator,
                self.config,
                Some(el),
            ),
        };
        self.eval_with_scope(el, split.expr, kind, scope)
    }

    /// Evaluate a template token in the element's context: the closest
    /// ancestor scope when one is declared, else the state graph.
    fn eval_token(
        &self,
        el: ElementId,
        token: &str,
        closest: &mut Option<ScopeArg>,
    ) -> Option<crate::value::Value> {
        let scope = closest
            .get_or_insert_with(|| {
                resolve_closest_scope(
                    self.dom,
                    el,
                    self.state,
                    self.host_bindings,
                    self.evaluator,
                    self.config,
                )
            })
            .clone();
        self.eval_with_scope(el, token, BindingKind::Template, scope)
    }

    fn eval_with_scope(
        &self,
        el: ElementId,
        source: &str,
        kind: BindingKind,
        scope: ScopeArg,
    ) -> Option<crate::value::Value> {
        let mut ctx = EvalContext::new(self.host_bindings, self.state)
            .with_scope(scope)
            .with_element(element_descriptor(self.dom, el));
        let meta = EvalMeta {
            element: Some(el),
            kind,
            diagnostics: self.config.diagnostics,
        };
        self.evaluator.evaluate(source, &mut ctx, &meta)
    }

    fn refresh_visibility(
        &mut self,
        el: ElementId,
        text: &str,
        closest: &mut Option<ScopeArg>,
        fired: &mut HashSet<ElementId>,
    ) {
        let value = self.eval_binding(el, text, BindingKind::Visibility, closest);
        // No value coerces to hidden.
        let desired = value.is_some_and(|v| v.truthy());
        let new_state = if desired {
            Visibility::Visible
        } else {
            Visibility::Hidden
        };

        let Some(data) = self.dom.get_mut(el) else { return };
        // Visibility is the only hide/show mechanism; a suppressed display
        // is historical residue and is cleared regardless of outcome.
        if data.display == Display::None {
            data.display = Display::Normal;
        }
        if data.visibility == new_state {
            return;
        }
        data.visibility = new_state;
        self.run_changed_hooks(
            el,
            attrs::VISIBILITY_CHANGED_ACTION,
            attrs::VISIBILITY_CHANGED_BEHAVIOR,
            fired,
        );
    }

    fn refresh_content(
        &mut self,
        el: ElementId,
        text: &str,
        closest: &mut Option<ScopeArg>,
        fired: &mut HashSet<ElementId>,
    ) {
        let value = self.eval_binding(el, text, BindingKind::Content, closest);
        let markup = value.map(|v| v.to_markup()).unwrap_or_default();
        self.write_content(el, markup, fired);
    }

    fn refresh_template(
        &mut self,
        el: ElementId,
        name: &str,
        closest: &mut Option<ScopeArg>,
        fired: &mut HashSet<ElementId>,
    ) {
        let key = if name.is_empty() {
            TemplateKey::Anonymous(el)
        } else {
            TemplateKey::Named(name.to_owned())
        };
        // A missing template renders as empty content, not an error.
        let markup = match self.templates.get(&key) {
            Some(body) => {
                let body = body.to_owned();
                interpolate(&body, |token| self.eval_token(el, token, closest))
            }
            None => String::new(),
        };
        self.write_content(el, markup, fired);
    }

    /// Diff-before-write: the computed markup is written only when it
    /// differs from the element's current markup.
    fn write_content(&mut self, el: ElementId, markup: String, fired: &mut HashSet<ElementId>) {
        let Some(data) = self.dom.get_mut(el) else { return };
        if data.content == markup {
            return;
        }
        data.content = markup;
        self.run_changed_hooks(
            el,
            attrs::CONTENT_CHANGED_ACTION,
            attrs::CONTENT_CHANGED_BEHAVIOR,
            fired,
        );
    }

    /// The bubbling changed hooks: the nearest ancestor (inclusive)
    /// declaring the action attribute has its code run immediately; the
    /// nearest declaring the behavior attribute has its behavior fired at
    /// most once per ancestor identity per pass, deferred to the next
    /// scheduling tick.
    fn run_changed_hooks(
        &mut self,
        el: ElementId,
        action_attr: &str,
        behavior_attr: &str,
        fired: &mut HashSet<ElementId>,
    ) {
        if let Some(holder) = self.dom.closest(el, |d| d.has_attr(action_attr)) {
            let code = self
                .dom
                .get(holder)
                .and_then(|d| d.attr(action_attr))
                .unwrap_or("")
                .to_owned();
            if !code.is_empty() {
                // The changed element, not the declaring ancestor, is the
                // action's context.
                self.eval_with_scope(el, &code, BindingKind::Action, ScopeArg::Default);
            }
        }

        if let Some(holder) = self.dom.closest(el, |d| d.has_attr(behavior_attr)) {
            if fired.insert(holder) {
                if let Some(name) = self.dom.get(holder).and_then(|d| d.attr(behavior_attr)) {
                    if !name.is_empty() {
                        self.deferred_behaviors.push(name.to_owned());
                    }
                }
            }
        }
    }
}

/// The descriptor object injected under the element aliases during binding
/// evaluation.
pub(crate) fn element_descriptor(dom: &Document, el: ElementId) -> crate::value::Value {
    use crate::value::Value;
    let Some(data) = dom.get(el) else {
        return Value::Null;
    };
    Value::object([
        ("tag", Value::from(data.tag.as_str())),
        (
            "id",
            data.id
                .as_deref()
                .map(Value::from)
                .unwrap_or(Value::Null),
        ),
        (
            "classes",
            Value::list(data.classes.iter().map(|c| Value::from(c.as_str()))),
        ),
        ("content", Value::from(data.content.as_str())),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ElementData;
    use crate::expr::ExprEvaluator;
    use crate::testing::RecordingHost;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    /// A refresh pass over loose parts, without a full session.
    struct Harness {
        dom: Document,
        config: Config,
        templates: TemplateStore,
        state: ReactiveHandle,
        host_bindings: HostBindings,
        host: Rc<RefCell<RecordingHost>>,
        sink: Rc<RefCell<dyn HostSink>>,
        deferred: Vec<String>,
        update_hook: Option<UpdateHook>,
    }

    impl Harness {
        fn new(state: Value) -> Self {
            let host = RecordingHost::shared();
            let sink: Rc<RefCell<dyn HostSink>> = host.clone();
            Self {
                dom: Document::new(),
                config: Config::default(),
                templates: TemplateStore::new(),
                state: ReactiveHandle::wrap(state, |_| {}),
                host_bindings: HostBindings::new(),
                host,
                sink,
                deferred: Vec::new(),
                update_hook: None,
            }
        }

        fn run(&mut self, change: Option<&Change>) {
            let mut pass = RefreshPass {
                dom: &mut self.dom,
                config: &self.config,
                templates: &self.templates,
                state: &self.state,
                host_bindings: &self.host_bindings,
                host: &self.sink,
                evaluator: &ExprEvaluator,
                deferred_behaviors: &mut self.deferred,
                update_hook: &mut self.update_hook,
            };
            pass.run(change);
        }

        fn content(&self, el: ElementId) -> &str {
            &self.dom.get(el).unwrap().content
        }
    }

    #[test]
    fn content_binding_renders() {
        let mut h = Harness::new(Value::object([("count", Value::from(0))]));
        let root = h.dom.insert(ElementData::new("body"));
        let el = h
            .dom
            .insert_child(root, ElementData::new("div").with_attr(attrs::CONTENT, "count"));
        h.run(None);
        assert_eq!(h.content(el), "0");
    }

    #[test]
    fn undefined_content_renders_empty() {
        let mut h = Harness::new(Value::object([("count", Value::from(0))]));
        let el = h.dom.insert(
            ElementData::new("div")
                .with_attr(attrs::CONTENT, "missing.deeper")
                .with_content("stale"),
        );
        h.run(None);
        assert_eq!(h.content(el), "");
    }

    #[test]
    fn visibility_binding_hides_and_clears_display() {
        let mut h = Harness::new(Value::object([("shown", Value::from(false))]));
        let el = h.dom.insert(
            ElementData::new("div")
                .with_attr(attrs::VISIBILITY, "shown")
                .with_display(Display::None),
        );
        h.run(None);
        let data = h.dom.get(el).unwrap();
        assert_eq!(data.visibility, Visibility::Hidden);
        // display:none is residue; visibility is the only hide mechanism.
        assert_eq!(data.display, Display::Normal);
    }

    #[test]
    fn effect_binding_runs_for_side_effects() {
        let mut h = Harness::new(Value::object([
            ("count", Value::from(1)),
            ("log", Value::from(0)),
        ]));
        h.dom.insert(
            ElementData::new("div").with_attr(attrs::EFFECT, "log = count * 10"),
        );
        h.run(None);
        assert_eq!(h.state.get("log"), Some(Value::from(10)));
    }

    #[test]
    fn template_binding_interpolates() {
        let mut h = Harness::new(Value::object([("name", Value::from("World"))]));
        let el = h.dom.insert(
            ElementData::new("div")
                .with_attr(attrs::TEMPLATE, "greeting")
                .with_content("Hello {{name}}"),
        );
        h.templates.capture(&h.dom);
        h.run(None);
        assert_eq!(h.content(el), "Hello World");
    }

    #[test]
    fn missing_template_renders_empty() {
        let mut h = Harness::new(Value::object([("name", Value::from("x"))]));
        let el = h.dom.insert(
            ElementData::new("div")
                .with_attr(attrs::TEMPLATE, "nope")
                .with_content("stale"),
        );
        h.run(None);
        assert_eq!(h.content(el), "");
    }

    #[test]
    fn anonymous_template_keyed_by_element() {
        let mut h = Harness::new(Value::object([("count", Value::from(7))]));
        let el = h.dom.insert(
            ElementData::new("div")
                .with_attr(attrs::TEMPLATE, "")
                .with_content("n={{count}}"),
        );
        h.templates.capture(&h.dom);
        h.run(None);
        assert_eq!(h.content(el), "n=7");
    }

    #[test]
    fn notification_phase_order() {
        let mut h = Harness::new(Value::object([("count", Value::from(5))]));
        h.run(Some(&Change {
            path: "count".to_owned(),
            value: Value::from(5),
        }));
        assert_eq!(
            h.host.borrow().behaviors,
            vec![
                "count was updated".to_owned(),
                "count equals 5".to_owned(),
                "state was changed".to_owned(),
            ]
        );
    }

    #[test]
    fn code_valued_change_skips_equals_event() {
        let mut h = Harness::new(Value::object::<&str, _>([]));
        h.run(Some(&Change {
            path: "cb".to_owned(),
            value: Value::from("doThing()"),
        }));
        assert_eq!(
            h.host.borrow().behaviors,
            vec!["cb was updated".to_owned(), "state was changed".to_owned()]
        );
    }

    #[test]
    fn update_hook_runs_after_notifications() {
        let mut h = Harness::new(Value::object::<&str, _>([]));
        let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let seen_c = seen.clone();
        h.update_hook = Some(Box::new(move |change: &Change| {
            seen_c.borrow_mut().push(change.path.clone());
        }));
        h.run(Some(&Change {
            path: "count".to_owned(),
            value: Value::from(1),
        }));
        assert_eq!(*seen.borrow(), vec!["count".to_owned()]);
    }

    #[test]
    fn forced_refresh_skips_notification_phase() {
        let mut h = Harness::new(Value::object::<&str, _>([]));
        h.run(None);
        assert!(h.host.borrow().behaviors.is_empty());
    }

    #[test]
    fn refresh_is_idempotent_on_unchanged_state() {
        let mut h = Harness::new(Value::object([("count", Value::from(3))]));
        let root = h.dom.insert(
            ElementData::new("body").with_attr(attrs::CONTENT_CHANGED_BEHAVIOR, "content moved"),
        );
        h.dom
            .insert_child(root, ElementData::new("div").with_attr(attrs::CONTENT, "count"));
        h.run(None);
        assert_eq!(h.deferred, vec!["content moved".to_owned()]);

        // Second pass with no state change: zero writes, zero new hooks.
        h.deferred.clear();
        h.run(None);
        assert!(h.deferred.is_empty());
    }

    #[test]
    fn visibility_behavior_dedups_by_ancestor_identity() {
        let mut h = Harness::new(Value::object([("shown", Value::from(false))]));
        let root = h.dom.insert(
            ElementData::new("body").with_attr(attrs::VISIBILITY_CHANGED_BEHAVIOR, "vis moved"),
        );
        for _ in 0..3 {
            h.dom.insert_child(
                root,
                ElementData::new("div").with_attr(attrs::VISIBILITY, "shown"),
            );
        }
        h.run(None);
        // Three descendants changed under one declaring ancestor: once.
        assert_eq!(h.deferred, vec!["vis moved".to_owned()]);
        // Deferred, not fired during the pass.
        assert!(h.host.borrow().behaviors.is_empty());
    }

    #[test]
    fn distinct_ancestors_each_fire() {
        let mut h = Harness::new(Value::object([("shown", Value::from(false))]));
        let root = h.dom.insert(ElementData::new("body"));
        for _ in 0..2 {
            let section = h.dom.insert_child(
                root,
                ElementData::new("section")
                    .with_attr(attrs::VISIBILITY_CHANGED_BEHAVIOR, "vis moved"),
            );
            h.dom.insert_child(
                section,
                ElementData::new("div").with_attr(attrs::VISIBILITY, "shown"),
            );
        }
        h.run(None);
        // Same behavior name, two declaring ancestors: both fire.
        assert_eq!(h.deferred.len(), 2);
    }

    #[test]
    fn changed_action_runs_immediately() {
        let mut h = Harness::new(Value::object([
            ("count", Value::from(1)),
            ("hits", Value::from(0)),
        ]));
        let root = h.dom.insert(
            ElementData::new("body").with_attr(attrs::CONTENT_CHANGED_ACTION, "hits = hits + 1"),
        );
        h.dom
            .insert_child(root, ElementData::new("div").with_attr(attrs::CONTENT, "count"));
        h.run(None);
        assert_eq!(h.state.get("hits"), Some(Value::from(1)));
    }

    #[test]
    fn scope_prefix_uses_closest_declaration() {
        let mut h = Harness::new(Value::object([(
            "user",
            Value::object([("name", Value::from("Ada"))]),
        )]));
        let root = h
            .dom
            .insert(ElementData::new("body").with_attr(attrs::SCOPE, "user"));
        let el = h.dom.insert_child(
            root,
            ElementData::new("div").with_attr(attrs::CONTENT, "⇢name"),
        );
        h.run(None);
        assert_eq!(h.content(el), "Ada");
    }

    #[test]
    fn scope_infix_resolves_inline() {
        let mut h = Harness::new(Value::object([(
            "user",
            Value::object([("name", Value::from("Ada"))]),
        )]));
        let el = h.dom.insert(
            ElementData::new("div").with_attr(attrs::CONTENT, "user ⇢ name"),
        );
        h.run(None);
        assert_eq!(h.content(el), "Ada");
    }

    #[test]
    fn malformed_scope_yields_no_value() {
        let mut h = Harness::new(Value::object([
            ("label", Value::from("text")),
            ("name", Value::from("state-level")),
        ]));
        // `label` is a string — malformed as a scope; the binding must NOT
        // fall back to the state-level `name`.
        let el = h.dom.insert(
            ElementData::new("div")
                .with_attr(attrs::CONTENT, "label ⇢ name")
                .with_content("stale"),
        );
        h.run(None);
        assert_eq!(h.content(el), "");
    }

    #[test]
    fn visibility_shares_scope_with_content() {
        let mut h = Harness::new(Value::object([(
            "user",
            Value::object([("name", Value::from("Ada")), ("active", Value::from(true))]),
        )]));
        let root = h
            .dom
            .insert(ElementData::new("body").with_attr(attrs::SCOPE, "user"));
        let el = h.dom.insert_child(
            root,
            ElementData::new("div")
                .with_attr(attrs::VISIBILITY, "⇢active")
                .with_attr(attrs::CONTENT, "⇢name"),
        );
        h.run(None);
        let data = h.dom.get(el).unwrap();
        assert_eq!(data.visibility, Visibility::Visible);
        assert_eq!(data.content, "Ada");
    }

    #[test]
    fn one_failing_binding_does_not_abort_the_pass() {
        let mut h = Harness::new(Value::object([("count", Value::from(2))]));
        let root = h.dom.insert(ElementData::new("body"));
        h.dom.insert_child(
            root,
            ElementData::new("div").with_attr(attrs::CONTENT, "count +"),
        );
        let ok = h.dom.insert_child(
            root,
            ElementData::new("div").with_attr(attrs::CONTENT, "count"),
        );
        h.run(None);
        assert_eq!(h.content(ok), "2");
    }

    #[test]
    fn post_pass_data_refresh_hook() {
        let mut h = Harness::new(Value::object::<&str, _>([]));
        h.run(None);
        assert_eq!(h.host.borrow().data_refreshes, 0);

        h.config.refresh_data_on_change = true;
        h.run(None);
        assert_eq!(h.host.borrow().data_refreshes, 1);
    }

    #[test]
    fn element_descriptor_is_injected() {
        let mut h = Harness::new(Value::object::<&str, _>([]));
        let el = h.dom.insert(
            ElementData::new("div")
                .with_id("badge")
                .with_attr(attrs::CONTENT, "element.id"),
        );
        h.run(None);
        assert_eq!(h.content(el), "badge");
    }
}
