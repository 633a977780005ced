//! # weft
//!
//! A reactive state → declarative document binding engine.
//!
//! weft observes mutations anywhere in a nested state graph and drives a
//! scheduled, idempotent re-evaluation of declarative bindings scattered
//! across a retained document tree — with scoping, templating, and
//! side-effect hooks. The host document API stays behind a thin trait; the
//! engine owns the hard parts.
//!
//! ## Core Systems
//!
//! - **[`value`]** — the dynamic [`Value`] type of the state graph
//! - **[`reactive`]** — mutation-observing handles, frame scheduling
//! - **[`dom`]** — slotmap-backed document arena with binding attributes
//! - **[`expr`]** — expression tokenizer, parser, pluggable evaluators
//! - **[`scope`]** — scope-symbol splitting, closest-ancestor resolution
//! - **[`template`]** — captured-once templates, `{{expr}}` interpolation
//! - **[`engine`]** — the refresh pass and change-notification taxonomy
//! - **[`host`]** — the host collaborator seam ([`HostSink`])
//! - **[`session`]** — per-document ownership and lifecycle
//! - **[`registry`]** — explicit session side table with explicit teardown
//! - **[`testing`]** — headless test helpers

// Foundation
pub mod config;
pub mod value;

// Core systems
pub mod dom;
pub mod expr;
pub mod reactive;
pub mod scope;
pub mod template;

// The refresh engine
pub mod engine;

// Collaborator seams
pub mod host;

// Sessions
pub mod registry;
pub mod session;

// Headless testing
pub mod testing;

pub use config::{Config, VisibilityPropagation};
pub use dom::{Display, Document, ElementData, ElementId, Visibility};
pub use engine::refresh::UpdateHook;
pub use expr::{is_code, Evaluator, ExprEvaluator, HostEvaluator};
pub use host::{HostBindings, HostSink, NullHost};
pub use reactive::{Change, FrameScheduler, ReactiveHandle};
pub use registry::{SessionId, SessionRegistry};
pub use session::Session;
pub use template::TemplateStore;
pub use value::Value;
