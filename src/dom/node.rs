//! Element types: ElementId, ElementData, visibility/display state.

use std::collections::BTreeMap;

use slotmap::new_key_type;

new_key_type! {
    /// Unique identifier for a document element. Copy, lightweight (u64).
    pub struct ElementId;
}

/// Visibility state written by visibility bindings.
///
/// Visibility, not display, is the engine's only hide/show mechanism;
/// [`Display::None`] is only ever a historical residue the refresh pass
/// clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// The element is shown.
    #[default]
    Visible,
    /// The element is hidden but keeps its layout slot.
    Hidden,
}

/// Display state of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Display {
    /// Normal display.
    #[default]
    Normal,
    /// Suppressed display. The refresh pass forces this back to
    /// [`Display::Normal`] on any element with a visibility binding.
    None,
}

/// Data associated with a single document element.
#[derive(Debug, Clone, Default)]
pub struct ElementData {
    /// Element tag name (e.g. "div").
    pub tag: String,
    /// Optional unique id.
    pub id: Option<String>,
    /// Class list (used by manual visibility propagation).
    pub classes: Vec<String>,
    /// Authored attributes, binding attributes included. The attribute is
    /// the source of truth for bindings; nothing is derived ahead of time.
    pub attrs: BTreeMap<String, String>,
    /// Current rendered inner markup.
    pub content: String,
    /// Current visibility state.
    pub visibility: Visibility,
    /// Current display state.
    pub display: Display,
}

impl ElementData {
    /// Create a new element with the given tag and defaults.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Set the id (builder).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add a class (builder). No-op if already present.
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        let class = class.into();
        if !self.classes.contains(&class) {
            self.classes.push(class);
        }
        self
    }

    /// Set an attribute (builder).
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Set the inner markup (builder).
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Set the display state (builder).
    pub fn with_display(mut self, display: Display) -> Self {
        self.display = display;
        self
    }

    /// Attribute value, if set.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Whether the attribute is set (even to an empty value).
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    /// Set an attribute.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(name.into(), value.into());
    }

    /// Remove an attribute. Returns its previous value.
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        self.attrs.remove(name)
    }

    /// Whether this element has a given class.
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Add a class. No-op if already present.
    pub fn add_class(&mut self, class: &str) {
        if !self.has_class(class) {
            self.classes.push(class.to_owned());
        }
    }

    /// Remove a class. No-op if not present.
    pub fn remove_class(&mut self, class: &str) {
        self.classes.retain(|c| c != class);
    }

    /// Whether any binding attribute is present.
    pub fn is_bound(&self) -> bool {
        super::attrs::BINDING_ATTRS
            .iter()
            .any(|name| self.attrs.contains_key(*name))
    }
}
