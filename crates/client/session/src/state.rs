//! Client-side replicated state tree.
//!
//! The tree is a JSON object addressed by dotted paths (`"player.stats.hp"`).
//! Local writes go through [`ReplicatedState::update_state`]; authoritative
//! snapshots arrive through [`ReplicatedState::sync_state`], which deep-merges
//! and then re-notifies every subscribed path.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::{Map, Value, json};

use crate::events::{EventBus, LocalEvent};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("state path must not be empty")]
    EmptyPath,

    #[error("cannot write `{path}`: `{segment}` is not an object")]
    PathConflict { path: String, segment: String },

    #[error("sync payload must be a JSON object")]
    NotAnObject,

    #[error("sync_state called while a merge is notifying subscribers")]
    ReentrantSync,
}

/// Identity of a subscription, returned by [`ReplicatedState::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Receives the value now at the subscribed path, `None` when absent.
pub type Subscriber = Rc<dyn Fn(Option<&Value>) -> anyhow::Result<()>>;

struct StateInner {
    tree: RefCell<Value>,
    subscribers: RefCell<BTreeMap<String, Vec<(SubscriptionId, Subscriber)>>>,
    next_id: Cell<u64>,
    merging: Cell<bool>,
    bus: EventBus,
}

/// Shared handle to the tree. Clones observe the same state.
#[derive(Clone)]
pub struct ReplicatedState {
    inner: Rc<StateInner>,
}

/// Clears the merge flag on every exit path of a merge.
struct MergeGuard<'a>(&'a Cell<bool>);

impl Drop for MergeGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl ReplicatedState {
    /// Creates a seeded tree announcing its changes on `bus`.
    pub fn new(bus: EventBus) -> Self {
        Self {
            inner: Rc::new(StateInner {
                tree: RefCell::new(seed()),
                subscribers: RefCell::new(BTreeMap::new()),
                next_id: Cell::new(0),
                merging: Cell::new(false),
                bus,
            }),
        }
    }

    /// Value at `path`, cloned out of the tree.
    pub fn get(&self, path: &str) -> Option<Value> {
        resolve(&self.inner.tree.borrow(), path).cloned()
    }

    pub fn get_full_state(&self) -> Value {
        self.inner.tree.borrow().clone()
    }

    /// Writes `value` at `path`, creating missing intermediate objects.
    ///
    /// Notifies subscribers of exactly `path` and announces
    /// [`LocalEvent::StateChanged`].
    pub fn update_state(&self, path: &str, value: Value) -> Result<(), StateError> {
        {
            let mut tree = self.inner.tree.borrow_mut();
            let slot = slot_mut(&mut tree, path)?;
            *slot = value.clone();
        }

        self.notify(path);
        self.inner.bus.emit(
            LocalEvent::StateChanged,
            &json!({ "path": path, "value": value }),
        );
        Ok(())
    }

    /// Deep-merges `partial` into the subtree at `path` and notifies
    /// subscribers at or below `path`.
    pub fn merge_state(&self, path: &str, partial: Value) -> Result<(), StateError> {
        if !partial.is_object() {
            return Err(StateError::NotAnObject);
        }
        {
            let mut tree = self.inner.tree.borrow_mut();
            let slot = slot_mut(&mut tree, path)?;
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            deep_merge(slot, partial.clone());
        }

        let prefix = format!("{path}.");
        let paths: Vec<String> = self
            .inner
            .subscribers
            .borrow()
            .keys()
            .filter(|subscribed| *subscribed == path || subscribed.starts_with(&prefix))
            .cloned()
            .collect();
        for subscribed in paths {
            self.notify(&subscribed);
        }

        self.inner.bus.emit(
            LocalEvent::StateChanged,
            &json!({ "path": path, "value": partial }),
        );
        Ok(())
    }

    /// Deep-merges an authoritative snapshot into the whole tree.
    ///
    /// Objects merge key by key; any other value replaces what was there.
    /// Afterwards every subscribed path is re-evaluated and its subscribers
    /// called, whether or not its value changed.
    pub fn sync_state(&self, partial: Value) -> Result<(), StateError> {
        if self.inner.merging.get() {
            return Err(StateError::ReentrantSync);
        }
        if !partial.is_object() {
            return Err(StateError::NotAnObject);
        }

        self.inner.merging.set(true);
        let _guard = MergeGuard(&self.inner.merging);

        deep_merge(&mut self.inner.tree.borrow_mut(), partial);

        let paths: Vec<String> = self.inner.subscribers.borrow().keys().cloned().collect();
        for path in paths {
            self.notify(&path);
        }

        self.inner.bus.emit(LocalEvent::StateSynced, &Value::Null);
        Ok(())
    }

    pub fn subscribe<F>(&self, path: impl Into<String>, subscriber: F) -> SubscriptionId
    where
        F: Fn(Option<&Value>) -> anyhow::Result<()> + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.get() + 1);
        self.inner.next_id.set(id.0);
        self.inner
            .subscribers
            .borrow_mut()
            .entry(path.into())
            .or_default()
            .push((id, Rc::new(subscriber)));
        id
    }

    pub fn unsubscribe(&self, path: &str, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.borrow_mut();
        let Some(list) = subscribers.get_mut(path) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            subscribers.remove(path);
        }
        removed
    }

    pub fn clear_subscriptions(&self) {
        self.inner.subscribers.borrow_mut().clear();
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.subscribers.borrow().values().map(Vec::len).sum()
    }

    /// Restores the seed tree. Subscriptions are kept.
    pub fn reset(&self) {
        *self.inner.tree.borrow_mut() = seed();
        self.inner.bus.emit(LocalEvent::StateReset, &Value::Null);
    }

    fn notify(&self, path: &str) {
        let subscribers: Vec<(SubscriptionId, Subscriber)> =
            match self.inner.subscribers.borrow().get(path) {
                Some(list) => list.clone(),
                None => return,
            };
        let value = self.get(path);

        for (id, subscriber) in subscribers {
            if let Err(error) = subscriber(value.as_ref()) {
                tracing::error!(
                    target: "session::state",
                    path,
                    subscription = id.0,
                    %error,
                    "state subscriber failed"
                );
            }
        }
    }
}

fn seed() -> Value {
    json!({
        "player": {},
        "world": {},
        "connectionStatus": "offline",
    })
}

fn resolve<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    path.split('.')
        .try_fold(tree, |node, segment| node.as_object()?.get(segment))
}

/// Mutable slot at `path`, creating missing objects along the way.
fn slot_mut<'a>(tree: &'a mut Value, path: &str) -> Result<&'a mut Value, StateError> {
    if path.is_empty() {
        return Err(StateError::EmptyPath);
    }

    let mut node = tree;
    let mut walked = String::new();
    for segment in path.split('.') {
        if segment.is_empty() {
            return Err(StateError::EmptyPath);
        }
        node = match node {
            Value::Object(map) => map
                .entry(segment.to_owned())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => {
                return Err(StateError::PathConflict {
                    path: path.to_owned(),
                    segment: walked,
                });
            }
        };
        if !walked.is_empty() {
            walked.push('.');
        }
        walked.push_str(segment);
    }
    Ok(node)
}

fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value);
                    }
                    _ => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}
