//! Mutation-observing handles over the state graph.
//!
//! A [`ReactiveHandle`] wraps one node of a session's state graph: shared
//! root storage, the accumulated dotted key path from the root, and the
//! mutation callback. Reading a container member yields a child handle for
//! that node (wrapping is lazy — only nodes actually read are wrapped);
//! reading a primitive yields the value itself. Writing performs the
//! underlying write first, then invokes the callback with the full key
//! path, so the callback always observes post-write state.
//!
//! Wrapping is idempotent by construction: a handle *is* the wrapped form,
//! and re-wrapping (cloning) shares the same storage and callback. Writes
//! through any clone notify exactly once.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::value::Value;

/// The mutation callback. Receives one [`Change`] per write.
pub type ChangeFn = dyn Fn(Change);

/// A single observed mutation: the full dotted key path from the state
/// root, and the value written (post-write state).
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Dotted key path from the root (`"count"`, `"user.name"`, `"items.0"`).
    pub path: String,
    /// The value that was written.
    pub value: Value,
}

/// Join a dotted base path with one more key segment.
pub fn join_path(base: &str, key: &str) -> String {
    if base.is_empty() {
        key.to_owned()
    } else {
        format!("{base}.{key}")
    }
}

/// What a keyed read produces: a child handle for containers, the value
/// itself for primitives.
#[derive(Debug)]
pub enum Reading {
    /// The member is a primitive; wrapping terminates here.
    Primitive(Value),
    /// The member is a container, wrapped with the extended key path.
    Nested(ReactiveHandle),
}

/// A wrapped node of the state graph.
#[derive(Clone)]
pub struct ReactiveHandle {
    root: Rc<RefCell<Value>>,
    path: String,
    on_change: Rc<ChangeFn>,
}

impl ReactiveHandle {
    /// Wrap a state graph root. Every write through this handle (or any
    /// child or clone of it) invokes `on_change` once.
    pub fn wrap(value: Value, on_change: impl Fn(Change) + 'static) -> Self {
        Self {
            root: Rc::new(RefCell::new(value)),
            path: String::new(),
            on_change: Rc::new(on_change),
        }
    }

    /// The dotted key path from the root. Empty at the root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether this handle wraps the root node.
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Replace the entire state graph behind this handle's root.
    ///
    /// The swap is atomic: the shared storage is overwritten in place, so
    /// no observer can see a half-migrated graph. Returns a fresh root
    /// handle wired to the same callback. Handles into the old graph
    /// resolve against the new one where paths still exist, and read as
    /// absent where they don't.
    pub fn replace(&self, value: Value) -> Self {
        *self.root.borrow_mut() = value;
        Self {
            root: Rc::clone(&self.root),
            path: String::new(),
            on_change: Rc::clone(&self.on_change),
        }
    }

    /// A clone of the value this handle wraps, or `None` if the path no
    /// longer exists in the graph.
    pub fn value(&self) -> Option<Value> {
        let root = self.root.borrow();
        locate(&root, &self.path).cloned()
    }

    /// Keyed read: a child handle for container members, the value for
    /// primitive members, `None` for absent members.
    pub fn read(&self, key: &str) -> Option<Reading> {
        let root = self.root.borrow();
        let member = locate(&root, &self.path)?.get(key)?;
        if member.is_container() {
            Some(Reading::Nested(Self {
                root: Rc::clone(&self.root),
                path: join_path(&self.path, key),
                on_change: Rc::clone(&self.on_change),
            }))
        } else {
            Some(Reading::Primitive(member.clone()))
        }
    }

    /// A clone of the member value, container or not.
    pub fn get(&self, key: &str) -> Option<Value> {
        let root = self.root.borrow();
        locate(&root, &self.path)?.get(key).cloned()
    }

    /// A child handle, only if the member is a container.
    pub fn child(&self, key: &str) -> Option<ReactiveHandle> {
        match self.read(key)? {
            Reading::Nested(handle) => Some(handle),
            Reading::Primitive(_) => None,
        }
    }

    /// Whether the member exists.
    pub fn has(&self, key: &str) -> bool {
        let root = self.root.borrow();
        locate(&root, &self.path).is_some_and(|node| node.get(key).is_some())
    }

    /// Write a member, then notify. Returns `false` (and notifies nothing)
    /// when this handle's node no longer exists or is not a container.
    ///
    /// The borrow is released before the callback runs, so the callback
    /// may freely read through other handles.
    pub fn set(&self, key: &str, value: Value) -> bool {
        let notified = value.clone();
        {
            let mut root = self.root.borrow_mut();
            let Some(node) = locate_mut(&mut root, &self.path) else {
                return false;
            };
            if !node.insert(key, value) {
                return false;
            }
        }
        (self.on_change)(Change {
            path: join_path(&self.path, key),
            value: notified,
        });
        true
    }
}

impl fmt::Debug for ReactiveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveHandle")
            .field("path", &self.path)
            .finish()
    }
}

/// Navigate a dotted path from the root. An empty path is the root itself.
fn locate<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.').try_fold(root, |node, segment| node.get(segment))
}

fn locate_mut<'v>(root: &'v mut Value, path: &str) -> Option<&'v mut Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.')
        .try_fold(root, |node, segment| node.get_mut(segment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording_root(value: Value) -> (ReactiveHandle, Rc<RefCell<Vec<Change>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_c = log.clone();
        let handle = ReactiveHandle::wrap(value, move |change| {
            log_c.borrow_mut().push(change);
        });
        (handle, log)
    }

    fn sample_state() -> Value {
        Value::object([
            ("count", Value::from(0)),
            (
                "user",
                Value::object([("name", Value::from("Ada"))]),
            ),
            ("items", Value::list([Value::from(1), Value::from(2)])),
        ])
    }

    #[test]
    fn read_primitive() {
        let (root, _log) = recording_root(sample_state());
        match root.read("count") {
            Some(Reading::Primitive(v)) => assert_eq!(v, Value::from(0)),
            other => panic!("expected primitive, got {other:?}"),
        }
    }

    #[test]
    fn read_container_extends_path() {
        let (root, _log) = recording_root(sample_state());
        let user = root.child("user").unwrap();
        assert_eq!(user.path(), "user");
        assert_eq!(user.get("name"), Some(Value::from("Ada")));
    }

    #[test]
    fn read_absent() {
        let (root, _log) = recording_root(sample_state());
        assert!(root.read("missing").is_none());
        assert!(root.child("count").is_none());
    }

    #[test]
    fn set_notifies_full_path_once() {
        let (root, log) = recording_root(sample_state());
        let user = root.child("user").unwrap();
        assert!(user.set("name", Value::from("Grace")));
        let log = log.borrow();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].path, "user.name");
        assert_eq!(log[0].value, Value::from("Grace"));
    }

    #[test]
    fn set_list_index_path() {
        let (root, log) = recording_root(sample_state());
        let items = root.child("items").unwrap();
        assert!(items.set("1", Value::from(9)));
        assert_eq!(log.borrow()[0].path, "items.1");
        assert_eq!(root.child("items").unwrap().get("1"), Some(Value::from(9)));
    }

    #[test]
    fn callback_observes_post_write_state() {
        let slot: Rc<RefCell<Option<ReactiveHandle>>> = Rc::new(RefCell::new(None));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let slot_c = slot.clone();
        let seen_c = seen.clone();
        let root = ReactiveHandle::wrap(sample_state(), move |change| {
            let current = slot_c.borrow().as_ref().unwrap().get("count");
            seen_c.borrow_mut().push((change.value, current));
        });
        *slot.borrow_mut() = Some(root.clone());

        root.set("count", Value::from(5));
        let seen = seen.borrow();
        assert_eq!(seen[0].0, Value::from(5));
        // The write already landed when the callback ran.
        assert_eq!(seen[0].1, Some(Value::from(5)));
    }

    #[test]
    fn rewrapping_is_idempotent() {
        let (root, log) = recording_root(sample_state());
        // Cloning is the wrapped form of an already-wrapped node.
        let rewrapped = root.clone();
        root.set("count", Value::from(1));
        rewrapped.set("count", Value::from(2));
        // One notification per write, never two.
        assert_eq!(log.borrow().len(), 2);
        assert_eq!(root.get("count"), Some(Value::from(2)));
    }

    #[test]
    fn set_on_primitive_node_is_rejected() {
        let (root, log) = recording_root(sample_state());
        // A stale "child" path pointing at a primitive cannot be written.
        let handle = ReactiveHandle {
            root: root.root.clone(),
            path: "count".to_owned(),
            on_change: root.on_change.clone(),
        };
        assert!(!handle.set("x", Value::from(1)));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn replace_root_keeps_callback() {
        let (root, log) = recording_root(sample_state());
        let fresh = root.replace(Value::object([("count", Value::from(10))]));
        assert!(fresh.is_root());
        assert_eq!(fresh.get("count"), Some(Value::from(10)));
        // The old root handle sees the new graph too (shared storage).
        assert_eq!(root.get("count"), Some(Value::from(10)));
        assert_eq!(root.get("user"), None);

        fresh.set("count", Value::from(11));
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(log.borrow()[0].path, "count");
    }

    #[test]
    fn stale_child_after_replace_reads_absent() {
        let (root, log) = recording_root(sample_state());
        let user = root.child("user").unwrap();
        root.replace(Value::object([("count", Value::from(0))]));
        assert_eq!(user.value(), None);
        assert!(!user.set("name", Value::from("x")));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn join_path_rules() {
        assert_eq!(join_path("", "a"), "a");
        assert_eq!(join_path("a", "b"), "a.b");
        assert_eq!(join_path("a.b", "0"), "a.b.0");
    }
}
