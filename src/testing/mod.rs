//! Headless testing helpers.
//!
//! [`RecordingHost`] stands in for the host document: it records every
//! behavior broadcast, action dispatch, and data-refresh call so tests can
//! assert on the engine's outward traffic without any real host.

use std::cell::RefCell;
use std::rc::Rc;

use crate::dom::{ElementData, ElementId};
use crate::host::HostSink;
use crate::value::Value;

/// A host sink that records everything it is handed.
#[derive(Debug, Default)]
pub struct RecordingHost {
    /// Behavior names, in broadcast order.
    pub behaviors: Vec<String>,
    /// Dispatched action code with its element context.
    pub actions: Vec<(String, Option<ElementId>)>,
    /// Number of data-refresh invocations.
    pub data_refreshes: usize,
    /// The value `run_action` answers with.
    pub action_result: Option<Value>,
}

impl RecordingHost {
    /// A shared, ready-to-install recording host.
    pub fn shared() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::default()))
    }
}

impl HostSink for RecordingHost {
    fn trigger_behavior(&mut self, name: &str) {
        self.behaviors.push(name.to_owned());
    }

    fn run_action(&mut self, code: &str, element: Option<ElementId>) -> Option<Value> {
        self.actions.push((code.to_owned(), element));
        self.action_result.clone()
    }

    fn refresh_data(&mut self) {
        self.data_refreshes += 1;
    }
}

/// Shorthand for an element carrying one binding attribute.
pub fn bound(tag: &str, attr: &str, expr: &str) -> ElementData {
    ElementData::new(tag).with_attr(attr, expr)
}
