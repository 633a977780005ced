//! Per-session template store and `{{expr}}` interpolation.
//!
//! Templates are captured once per document activation from elements
//! declaring the template attribute: the element's inner markup at capture
//! time is the body, verbatim, before any interpolation ever touches it.
//! Later renders never re-capture from a mutated document. An empty
//! attribute value registers an *anonymous* template keyed by the element
//! itself.

use std::collections::HashMap;

use crate::dom::{attrs, Document, ElementId};
use crate::value::Value;

/// How a template entry is keyed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplateKey {
    /// A named template, shared by every element selecting that name.
    Named(String),
    /// An anonymous template, private to one element.
    Anonymous(ElementId),
}

/// The per-session template registry.
#[derive(Debug, Default)]
pub struct TemplateStore {
    entries: HashMap<TemplateKey, String>,
}

impl TemplateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture template bodies from the document, in document order.
    ///
    /// Only keys not yet registered are captured — capture is once-only.
    /// Returns the number of newly captured entries.
    pub fn capture(&mut self, dom: &Document) -> usize {
        let mut captured = 0;
        for el in dom.elements_with_attr(attrs::TEMPLATE) {
            let Some(data) = dom.get(el) else { continue };
            let name = data.attr(attrs::TEMPLATE).unwrap_or("");
            let key = if name.is_empty() {
                TemplateKey::Anonymous(el)
            } else {
                TemplateKey::Named(name.to_owned())
            };
            if let std::collections::hash_map::Entry::Vacant(entry) = self.entries.entry(key) {
                entry.insert(data.content.clone());
                captured += 1;
            }
        }
        if captured > 0 {
            tracing::debug!(target: "weft::template", captured, "captured templates");
        }
        captured
    }

    /// The body registered under a key.
    pub fn get(&self, key: &TemplateKey) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// The body of a named template.
    pub fn get_named(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&TemplateKey::Named(name.to_owned()))
            .map(String::as_str)
    }

    /// Register or replace a named template. Returns whether the store
    /// changed.
    pub fn set(&mut self, name: impl Into<String>, body: impl Into<String>) -> bool {
        let key = TemplateKey::Named(name.into());
        let body = body.into();
        if self.entries.get(&key) == Some(&body) {
            return false;
        }
        self.entries.insert(key, body);
        true
    }

    /// Merge a batch of named templates. Returns whether anything changed.
    pub fn merge<K, V>(&mut self, templates: impl IntoIterator<Item = (K, V)>) -> bool
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut changed = false;
        for (name, body) in templates {
            changed |= self.set(name, body);
        }
        changed
    }

    /// Remove a named template. Returns whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        self.entries
            .remove(&TemplateKey::Named(name.to_owned()))
            .is_some()
    }

    /// Clear everything, anonymous entries included. Returns whether the
    /// store was non-empty.
    pub fn clear(&mut self) -> bool {
        let had_entries = !self.entries.is_empty();
        self.entries.clear();
        had_entries
    }

    /// Number of registered templates.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Replace every `{{ token }}` in `body` with the evaluator's result.
///
/// Tokens are matched non-greedily and must not contain brace characters;
/// anything else is copied through verbatim. A token evaluating to no value
/// (or `Null`) renders as the empty string, never as `"null"`.
pub fn interpolate(body: &str, mut eval: impl FnMut(&str) -> Option<Value>) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;
    while !rest.is_empty() {
        if let Some(stripped) = rest.strip_prefix("{{") {
            if let Some(close) = stripped.find("}}") {
                let inner = &stripped[..close];
                if !inner.contains(['{', '}']) {
                    let rendered = eval(inner.trim()).map(|v| v.to_markup()).unwrap_or_default();
                    out.push_str(&rendered);
                    rest = &stripped[close + 2..];
                    continue;
                }
            }
        }
        // Not a token here — copy one char and rescan.
        let Some(ch) = rest.chars().next() else { break };
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ElementData;
    use pretty_assertions::assert_eq;

    fn eval_map(token: &str) -> Option<Value> {
        match token {
            "name" => Some(Value::from("World")),
            "count" => Some(Value::from(3)),
            "nothing" => Some(Value::Null),
            _ => None,
        }
    }

    #[test]
    fn interpolate_basic() {
        assert_eq!(interpolate("Hello {{name}}", eval_map), "Hello World");
        assert_eq!(interpolate("{{count}} items", eval_map), "3 items");
    }

    #[test]
    fn interpolate_whitespace_tolerant() {
        assert_eq!(interpolate("Hello {{  name  }}", eval_map), "Hello World");
    }

    #[test]
    fn unresolved_token_renders_empty() {
        assert_eq!(interpolate("x{{missing}}y", eval_map), "xy");
        assert_eq!(interpolate("x{{nothing}}y", eval_map), "xy");
    }

    #[test]
    fn literal_braces_pass_through() {
        assert_eq!(interpolate("a { b } c", eval_map), "a { b } c");
        assert_eq!(interpolate("{{", eval_map), "{{");
        assert_eq!(interpolate("}}", eval_map), "}}");
    }

    #[test]
    fn token_may_not_contain_braces() {
        // The outer `{{` cannot close over a brace; the inner token still
        // matches.
        assert_eq!(interpolate("{{ {{name}} }}", eval_map), "{{ World }}");
    }

    #[test]
    fn adjacent_tokens() {
        assert_eq!(interpolate("{{name}}{{count}}", eval_map), "World3");
    }

    #[test]
    fn capture_named_and_anonymous() {
        let mut dom = Document::new();
        let root = dom.insert(ElementData::new("body"));
        let named = dom.insert_child(
            root,
            ElementData::new("div")
                .with_attr(attrs::TEMPLATE, "greeting")
                .with_content("Hello {{name}}"),
        );
        let anon = dom.insert_child(
            root,
            ElementData::new("div")
                .with_attr(attrs::TEMPLATE, "")
                .with_content("{{count}}"),
        );
        let _ = named;

        let mut store = TemplateStore::new();
        assert_eq!(store.capture(&dom), 2);
        assert_eq!(store.get_named("greeting"), Some("Hello {{name}}"));
        assert_eq!(
            store.get(&TemplateKey::Anonymous(anon)),
            Some("{{count}}")
        );
    }

    #[test]
    fn capture_is_once_only() {
        let mut dom = Document::new();
        let el = dom.insert(
            ElementData::new("div")
                .with_attr(attrs::TEMPLATE, "t")
                .with_content("original"),
        );
        let mut store = TemplateStore::new();
        store.capture(&dom);

        // A later render mutated the element's markup; capture again.
        dom.get_mut(el).unwrap().content = "mutated".to_owned();
        assert_eq!(store.capture(&dom), 0);
        assert_eq!(store.get_named("t"), Some("original"));
    }

    #[test]
    fn set_reports_change() {
        let mut store = TemplateStore::new();
        assert!(store.set("t", "body"));
        assert!(!store.set("t", "body"));
        assert!(store.set("t", "other"));
    }

    #[test]
    fn merge_remove_clear() {
        let mut store = TemplateStore::new();
        assert!(store.merge([("a", "1"), ("b", "2")]));
        assert_eq!(store.len(), 2);
        assert!(!store.merge([("a", "1")]));
        assert!(store.remove("a"));
        assert!(!store.remove("a"));
        assert!(store.clear());
        assert!(store.is_empty());
        assert!(!store.clear());
    }
}
