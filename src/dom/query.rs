//! Document queries: bound elements, attribute lookups, visibility
//! propagation.
//!
//! Unlike arena iteration, every query here runs in document order (the
//! refresh pass processes bindings in document order, and template capture
//! registers names first-wins in document order).

use crate::config::VisibilityPropagation;

use super::node::{ElementData, ElementId, Visibility};
use super::tree::Document;

impl Document {
    /// Find the first element whose `id` field matches the given string,
    /// in document order.
    pub fn query_by_id(&self, id: &str) -> Option<ElementId> {
        self.walk_from_root()
            .into_iter()
            .find(|&el| self.get(el).is_some_and(|data| data.id.as_deref() == Some(id)))
    }

    /// All elements carrying the given attribute, in document order.
    pub fn elements_with_attr(&self, name: &str) -> Vec<ElementId> {
        self.query_all(|data| data.has_attr(name))
    }

    /// Every element carrying at least one binding attribute, in document
    /// order. This is the refresh pass's enumeration.
    pub fn bound_elements(&self) -> Vec<ElementId> {
        self.query_all(ElementData::is_bound)
    }

    /// All elements matching an arbitrary predicate, in document order.
    pub fn query_all(&self, predicate: impl Fn(&ElementData) -> bool) -> Vec<ElementId> {
        self.walk_from_root()
            .into_iter()
            .filter(|&el| self.get(el).is_some_and(&predicate))
            .collect()
    }

    /// The visibility of an element after applying the configured
    /// propagation mode.
    ///
    /// - `Auto`: hidden ancestors force-hide the element.
    /// - `Manual`: only ancestors carrying `propagation_class` propagate,
    ///   and only to elements carrying it.
    /// - `None`: the element's own state only.
    ///
    /// Style-rule generation is host glue; the engine exposes propagation
    /// as a query for the host to style from.
    pub fn effective_visibility(
        &self,
        id: ElementId,
        mode: VisibilityPropagation,
        propagation_class: &str,
    ) -> Visibility {
        let Some(data) = self.get(id) else {
            return Visibility::Visible;
        };
        if data.visibility == Visibility::Hidden {
            return Visibility::Hidden;
        }
        match mode {
            VisibilityPropagation::None => data.visibility,
            VisibilityPropagation::Auto => {
                let hidden_above = self
                    .ancestors(id)
                    .into_iter()
                    .any(|anc| self.get(anc).is_some_and(|d| d.visibility == Visibility::Hidden));
                if hidden_above {
                    Visibility::Hidden
                } else {
                    data.visibility
                }
            }
            VisibilityPropagation::Manual => {
                if !data.has_class(propagation_class) {
                    return data.visibility;
                }
                let hidden_above = self.ancestors(id).into_iter().any(|anc| {
                    self.get(anc).is_some_and(|d| {
                        d.visibility == Visibility::Hidden && d.has_class(propagation_class)
                    })
                });
                if hidden_above {
                    Visibility::Hidden
                } else {
                    data.visibility
                }
            }
        }
    }
}
