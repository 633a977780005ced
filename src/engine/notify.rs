//! The change-notification taxonomy.
//!
//! A notified refresh broadcasts up to three events to the host's
//! named-behavior sink, in this order: the key-level update event, the
//! key-level equals event (unless the value is a code-string), and the
//! generic [`STATE_CHANGED`] event.

use crate::expr::is_code;
use crate::value::Value;

/// The generic event fired on every notified refresh.
pub const STATE_CHANGED: &str = "state was changed";

/// The key-level update event: `"<path> was updated"`.
pub fn update_event(path: &str) -> String {
    format!("{path} was updated")
}

/// The key-level equals event: `"<path> equals <literal>"`. Strings are
/// double-quoted; other values use their display form. Suppressed (`None`)
/// when the value is a string classified as code — a behavior name that
/// *is* code would be re-executed by the triggered-behavior glue.
pub fn equals_event(path: &str, value: &Value) -> Option<String> {
    if let Value::Str(s) = value {
        if is_code(s) {
            return None;
        }
    }
    Some(format!("{path} equals {}", value.literal_repr()))
}
