//! Document arena: slotmap-backed element tree with binding attributes.
//!
//! The engine keeps its own retained model of the host document. Elements
//! carry the declarative binding attributes ([`attrs`]), their rendered
//! inner markup, and visibility/display state; the host's real document
//! mirrors this model at the glue layer.

pub mod node;
pub mod query;
pub mod tree;

pub use node::{Display, ElementData, ElementId, Visibility};
pub use tree::Document;

/// The declarative binding attributes the refresh engine reads.
pub mod attrs {
    /// Expression producing an element's inner markup.
    pub const CONTENT: &str = "data-content";
    /// Expression producing the visible/hidden boolean.
    pub const VISIBILITY: &str = "data-visibility";
    /// Expression run for side effects only.
    pub const EFFECT: &str = "data-effect";
    /// Selects a named template; an empty value selects the element's own
    /// anonymous template.
    pub const TEMPLATE: &str = "data-template";
    /// Expression producing the default scope object for descendants.
    pub const SCOPE: &str = "data-scope";
    /// Ancestor hook: code run when a content binding's output changes.
    pub const CONTENT_CHANGED_ACTION: &str = "data-content-changed-action";
    /// Ancestor hook: behavior fired when a content binding's output changes.
    pub const CONTENT_CHANGED_BEHAVIOR: &str = "data-content-changed-behavior";
    /// Ancestor hook: code run when a visibility binding's state changes.
    pub const VISIBILITY_CHANGED_ACTION: &str = "data-visibility-changed-action";
    /// Ancestor hook: behavior fired when a visibility binding's state changes.
    pub const VISIBILITY_CHANGED_BEHAVIOR: &str = "data-visibility-changed-behavior";

    /// The attributes that make an element *bound* (enumerated on refresh).
    pub const BINDING_ATTRS: [&str; 4] = [VISIBILITY, EFFECT, CONTENT, TEMPLATE];
}
