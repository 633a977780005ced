//! The document session: one state graph, one document, one refresh
//! discipline.
//!
//! A [`Session`] owns everything with per-document lifetime: the retained
//! [`Document`], the reactive state root, the template store, the pending
//! refresh slot, the deferred behavior queue, the host sink, and the
//! evaluator. Mutating state through [`Session::state`] schedules a
//! debounced refresh; the host (or the built-in frame pump) drives frame
//! boundaries with [`Session::tick`].

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::config::Config;
use crate::dom::{Document, ElementId};
use crate::engine::refresh::UpdateHook;
use crate::engine::RefreshPass;
use crate::expr::{is_code, BindingKind, EvalContext, EvalMeta, Evaluator, ExprEvaluator};
use crate::host::{HostBindings, HostSink, NullHost};
use crate::reactive::{Change, FrameScheduler, ReactiveHandle};
use crate::scope::{resolve_closest_scope, ScopeArg};
use crate::template::TemplateStore;
use crate::value::Value;

/// A document session.
pub struct Session {
    config: Config,
    dom: Document,
    templates: TemplateStore,
    state: ReactiveHandle,
    scheduler: FrameScheduler<Option<Change>>,
    deferred_behaviors: Vec<String>,
    host: Rc<RefCell<dyn HostSink>>,
    host_bindings: HostBindings,
    evaluator: Rc<dyn Evaluator>,
    update_hook: Option<UpdateHook>,
}

impl Session {
    /// Create a session with an empty document and an empty state graph.
    pub fn new(config: Config) -> Self {
        let scheduler: FrameScheduler<Option<Change>> = FrameScheduler::new();
        let sched = scheduler.clone();
        // Every observed mutation schedules a (debounced) refresh carrying
        // that mutation's arguments; latest wins within a frame.
        let state = ReactiveHandle::wrap(Value::object::<&str, _>([]), move |change| {
            sched.schedule(Some(change));
        });
        tracing::debug!(target: "weft::session", "session created");
        Self {
            config,
            dom: Document::new(),
            templates: TemplateStore::new(),
            state,
            scheduler,
            deferred_behaviors: Vec::new(),
            host: Rc::new(RefCell::new(NullHost)),
            host_bindings: HostBindings::new(),
            evaluator: Rc::new(ExprEvaluator),
            update_hook: None,
        }
    }

    // ── Document ─────────────────────────────────────────────────────

    /// The retained document.
    pub fn document(&self) -> &Document {
        &self.dom
    }

    /// Mutable access to the retained document (host glue builds the tree
    /// here).
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.dom
    }

    // ── State ────────────────────────────────────────────────────────

    /// A handle to the state root. Mutations through it (or any child
    /// handle) schedule a debounced refresh.
    pub fn state(&self) -> ReactiveHandle {
        self.state.clone()
    }

    /// Replace the state root and schedule a refresh. The swap is atomic:
    /// the stored reference and its wrapped form change together.
    pub fn set_state(&mut self, value: Value) {
        self.state = self.state.replace(value);
        self.scheduler.schedule(None);
    }

    /// Merge the top-level entries of an object into the state root. Each
    /// entry is an observed write, so notifications and scheduling flow as
    /// usual (collapsing to one refresh).
    pub fn merge_state(&mut self, value: Value) {
        if let Value::Object(entries) = value {
            for (key, entry) in entries {
                self.state.set(&key, entry);
            }
        }
    }

    // ── Config ───────────────────────────────────────────────────────

    /// The session configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mutable access to the session configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Replace the whole configuration.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    // ── Collaborators ────────────────────────────────────────────────

    /// Install the host sink.
    pub fn set_host(&mut self, host: Rc<RefCell<dyn HostSink>>) {
        self.host = host;
    }

    /// Host bindings exposed to expressions.
    pub fn host_bindings(&self) -> &HostBindings {
        &self.host_bindings
    }

    /// Mutable access to the host bindings.
    pub fn host_bindings_mut(&mut self) -> &mut HostBindings {
        &mut self.host_bindings
    }

    /// Swap the evaluator implementation. Callers never depend on which
    /// one is active.
    pub fn set_evaluator(&mut self, evaluator: Rc<dyn Evaluator>) {
        self.evaluator = evaluator;
    }

    /// Register the update hook invoked after each notification phase.
    pub fn set_update_hook(&mut self, hook: impl FnMut(&Change) + 'static) {
        self.update_hook = Some(Box::new(hook));
    }

    /// Remove the update hook.
    pub fn clear_update_hook(&mut self) {
        self.update_hook = None;
    }

    // ── Templates ────────────────────────────────────────────────────

    /// The body of a named template, if registered.
    pub fn template(&self, name: &str) -> Option<&str> {
        self.templates.get_named(name)
    }

    /// Register or replace a named template.
    pub fn set_template(&mut self, name: impl Into<String>, body: impl Into<String>) {
        let changed = self.templates.set(name, body);
        self.maybe_refresh_templates(changed);
    }

    /// Merge a batch of named templates.
    pub fn set_templates<K, V>(&mut self, templates: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let changed = self.templates.merge(templates);
        self.maybe_refresh_templates(changed);
    }

    /// Remove a named template.
    pub fn remove_template(&mut self, name: &str) {
        let changed = self.templates.remove(name);
        self.maybe_refresh_templates(changed);
    }

    /// Clear the template store.
    pub fn clear_templates(&mut self) {
        let changed = self.templates.clear();
        self.maybe_refresh_templates(changed);
    }

    /// Capture template bodies from the current document (once-only per
    /// key). Returns the number of newly captured entries.
    pub fn capture_templates(&mut self) -> usize {
        self.templates.capture(&self.dom)
    }

    fn maybe_refresh_templates(&mut self, changed: bool) {
        if changed && self.config.refresh_on_template_change {
            self.scheduler.schedule(None);
        }
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Document activation: capture templates, then refresh immediately.
    /// Host glue calls this on document load and on scene display.
    pub fn activate(&mut self) {
        self.capture_templates();
        self.refresh_now(None);
    }

    /// Schedule a debounced refresh with no triggering change.
    pub fn schedule_refresh(&mut self) {
        self.scheduler.schedule(None);
    }

    /// Run a refresh pass immediately, bypassing the scheduler. A pending
    /// scheduled refresh stays pending; a scheduled refresh always
    /// eventually runs.
    pub fn refresh_now(&mut self, change: Option<&Change>) {
        self.run_pass(change);
    }

    /// The frame boundary: flush behaviors deferred by the previous pass,
    /// then run at most one pending refresh. Returns whether anything ran.
    pub fn tick(&mut self) -> bool {
        let mut did_work = false;
        if !self.deferred_behaviors.is_empty() {
            let behaviors = std::mem::take(&mut self.deferred_behaviors);
            let host = Rc::clone(&self.host);
            let mut host = host.borrow_mut();
            for name in behaviors {
                host.trigger_behavior(&name);
            }
            did_work = true;
        }
        if let Some(change) = self.scheduler.take() {
            self.run_pass(change.as_ref());
            did_work = true;
        }
        did_work
    }

    /// Whether a refresh is pending or behaviors await the next tick.
    pub fn has_pending_work(&self) -> bool {
        self.scheduler.is_scheduled() || !self.deferred_behaviors.is_empty()
    }

    fn run_pass(&mut self, change: Option<&Change>) {
        let evaluator = Rc::clone(&self.evaluator);
        let host = Rc::clone(&self.host);
        let mut pass = RefreshPass {
            dom: &mut self.dom,
            config: &self.config,
            templates: &self.templates,
            state: &self.state,
            host_bindings: &self.host_bindings,
            host: &host,
            evaluator: evaluator.as_ref(),
            deferred_behaviors: &mut self.deferred_behaviors,
            update_hook: &mut self.update_hook,
        };
        pass.run(change);
    }

    // ── Scope & code glue ────────────────────────────────────────────

    /// Resolve the nearest scope declaration for an element, as a value.
    pub fn resolve_closest_scope(&self, element: ElementId) -> Option<Value> {
        match resolve_closest_scope(
            &self.dom,
            element,
            &self.state,
            &self.host_bindings,
            self.evaluator.as_ref(),
            &self.config,
        ) {
            ScopeArg::Scoped(scope) => scope.value(),
            _ => None,
        }
    }

    /// Run ad-hoc code in root context (no element, no scope).
    pub fn run_code(&mut self, source: &str) -> Option<Value> {
        let mut ctx = EvalContext::new(&self.host_bindings, &self.state);
        let meta = EvalMeta {
            element: None,
            kind: BindingKind::Code,
            diagnostics: self.config.diagnostics,
        };
        self.evaluator.evaluate(source, &mut ctx, &meta)
    }

    /// Host glue for triggered behaviors: a behavior name that classifies
    /// as code is executed; bare names are ignored. Returns whether code
    /// ran.
    pub fn handle_triggered_behavior(&mut self, name: &str) -> bool {
        if is_code(name) {
            self.run_code(name);
            true
        } else {
            false
        }
    }

    // ── Frame pump ───────────────────────────────────────────────────

    /// Pump frame ticks at `fps` until the shutdown channel flips to
    /// `true` (or its sender is dropped).
    pub async fn drive(&mut self, fps: u32, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut frames = tokio::time::interval(frame_period(fps));
        frames.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = frames.tick() => {
                    self.tick();
                }
            }
        }
    }

    /// Pump frame ticks at `fps` until no refresh is pending and no
    /// behaviors are deferred.
    pub async fn drive_until_idle(&mut self, fps: u32) {
        let mut frames = tokio::time::interval(frame_period(fps));
        while self.has_pending_work() {
            frames.tick().await;
            self.tick();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("elements", &self.dom.len())
            .field("templates", &self.templates.len())
            .field("pending", &self.scheduler.is_scheduled())
            .finish()
    }
}

fn frame_period(fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(fps.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{attrs, ElementData};
    use crate::testing::RecordingHost;
    use pretty_assertions::assert_eq;

    fn counter_session() -> (Session, ElementId, Rc<RefCell<RecordingHost>>) {
        let mut session = Session::new(Config::default());
        let host = RecordingHost::shared();
        session.set_host(host.clone());
        let root = session.document_mut().insert(ElementData::new("body"));
        let el = session.document_mut().insert_child(
            root,
            ElementData::new("div").with_attr(attrs::CONTENT, "count"),
        );
        session.set_state(Value::object([("count", Value::from(0))]));
        session.activate();
        (session, el, host)
    }

    fn content(session: &Session, el: ElementId) -> String {
        session.document().get(el).unwrap().content.clone()
    }

    #[test]
    fn activation_renders_initial_state() {
        let (session, el, _host) = counter_session();
        assert_eq!(content(&session, el), "0");
    }

    #[test]
    fn mutation_schedules_and_tick_applies() {
        let (mut session, el, host) = counter_session();
        host.borrow_mut().behaviors.clear();

        session.state().set("count", Value::from(5));
        // Scheduled, not yet applied.
        assert!(session.has_pending_work());
        assert_eq!(content(&session, el), "0");

        assert!(session.tick());
        assert_eq!(content(&session, el), "5");
        assert_eq!(
            host.borrow().behaviors,
            vec![
                "count was updated".to_owned(),
                "count equals 5".to_owned(),
                "state was changed".to_owned(),
            ]
        );
    }

    #[test]
    fn synchronous_writes_collapse_to_one_refresh() {
        let (mut session, el, host) = counter_session();
        host.borrow_mut().behaviors.clear();

        let state = session.state();
        state.set("count", Value::from(1));
        state.set("count", Value::from(2));
        state.set("count", Value::from(3));

        session.tick();
        assert_eq!(content(&session, el), "3");
        // One notification phase, for the last write only.
        assert_eq!(
            host.borrow().behaviors,
            vec![
                "count was updated".to_owned(),
                "count equals 3".to_owned(),
                "state was changed".to_owned(),
            ]
        );
        // Nothing further pending.
        assert!(!session.tick());
    }

    #[test]
    fn set_state_replaces_root_and_refreshes() {
        let (mut session, el, _host) = counter_session();
        session.set_state(Value::object([("count", Value::from(42))]));
        session.tick();
        assert_eq!(content(&session, el), "42");
    }

    #[test]
    fn merge_state_keeps_other_keys() {
        let (mut session, el, _host) = counter_session();
        session.merge_state(Value::object([("extra", Value::from(1))]));
        session.tick();
        assert_eq!(content(&session, el), "0");
        assert_eq!(session.state().get("extra"), Some(Value::from(1)));
    }

    #[test]
    fn template_mutation_triggers_refresh() {
        let mut session = Session::new(Config::default());
        let el = session
            .document_mut()
            .insert(ElementData::new("div").with_attr(attrs::TEMPLATE, "greeting"));
        session.set_state(Value::object([("name", Value::from("World"))]));
        session.activate();
        assert_eq!(content(&session, el), "");

        session.set_template("greeting", "Hello {{name}}");
        assert!(session.has_pending_work());
        session.tick();
        assert_eq!(content(&session, el), "Hello World");

        session.remove_template("greeting");
        session.tick();
        assert_eq!(content(&session, el), "");
    }

    #[test]
    fn template_mutation_respects_config_toggle() {
        let mut session =
            Session::new(Config::default().with_refresh_on_template_change(false));
        session.set_template("t", "body");
        assert!(!session.has_pending_work());
    }

    #[test]
    fn deferred_behaviors_fire_on_next_tick() {
        let mut session = Session::new(Config::default());
        let host = RecordingHost::shared();
        session.set_host(host.clone());
        let root = session.document_mut().insert(
            ElementData::new("body").with_attr(attrs::VISIBILITY_CHANGED_BEHAVIOR, "vis moved"),
        );
        session.document_mut().insert_child(
            root,
            ElementData::new("div").with_attr(attrs::VISIBILITY, "shown"),
        );
        session.set_state(Value::object([("shown", Value::from(false))]));
        session.activate();

        // The pass queued the behavior; it has not fired yet.
        assert!(!host.borrow().behaviors.iter().any(|b| b == "vis moved"));
        session.tick();
        assert!(host.borrow().behaviors.iter().any(|b| b == "vis moved"));
    }

    #[test]
    fn resolve_closest_scope_public_surface() {
        let mut session = Session::new(Config::default());
        let root = session
            .document_mut()
            .insert(ElementData::new("body").with_attr(attrs::SCOPE, "user"));
        let el = session
            .document_mut()
            .insert_child(root, ElementData::new("div"));
        session.set_state(Value::object([(
            "user",
            Value::object([("name", Value::from("Ada"))]),
        )]));
        let scope = session.resolve_closest_scope(el).unwrap();
        assert_eq!(scope.get("name"), Some(&Value::from("Ada")));
    }

    #[test]
    fn run_code_and_triggered_behaviors() {
        let (mut session, el, _host) = counter_session();
        assert_eq!(
            session.run_code("count = count + 10; count"),
            Some(Value::from(10))
        );
        // A bare name is not code.
        assert!(!session.handle_triggered_behavior("just a name"));
        assert!(session.handle_triggered_behavior("count = 20"));
        session.tick();
        assert_eq!(content(&session, el), "20");
    }

    #[test]
    fn refresh_now_leaves_pending_refresh_pending() {
        let (mut session, el, _host) = counter_session();
        session.state().set("count", Value::from(1));
        session.refresh_now(None);
        assert_eq!(content(&session, el), "1");
        // The scheduled refresh still eventually runs.
        assert!(session.has_pending_work());
        assert!(session.tick());
    }

    #[test]
    fn update_hook_is_invoked() {
        let (mut session, _el, _host) = counter_session();
        let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let seen_c = seen.clone();
        session.set_update_hook(move |change| seen_c.borrow_mut().push(change.path.clone()));
        session.state().set("count", Value::from(2));
        session.tick();
        assert_eq!(*seen.borrow(), vec!["count".to_owned()]);

        session.clear_update_hook();
        session.state().set("count", Value::from(3));
        session.tick();
        assert_eq!(seen.borrow().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn drive_until_idle_drains_pending_work() {
        let (mut session, el, _host) = counter_session();
        session.state().set("count", Value::from(9));
        assert!(session.has_pending_work());
        session.drive_until_idle(60).await;
        assert!(!session.has_pending_work());
        assert_eq!(content(&session, el), "9");
    }

    #[test]
    fn drive_until_idle_returns_immediately_when_idle() {
        let mut session = Session::new(Config::default());
        tokio_test::block_on(session.drive_until_idle(60));
        assert!(!session.has_pending_work());
    }

    #[tokio::test(start_paused = true)]
    async fn drive_stops_on_shutdown() {
        let (mut session, _el, _host) = counter_session();
        let (tx, rx) = tokio::sync::watch::channel(false);
        tx.send(true).unwrap();
        // Returns rather than pumping forever.
        session.drive(60, rx).await;
    }
}
