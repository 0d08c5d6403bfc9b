//! Synchronous three-channel event bus.
//!
//! Event names are typed: an [`EventName`] is a channel tag plus a name
//! enum, so dispatch never parses strings. Their `Display` form is the
//! familiar wire-style name (`"sync:state:sync"`).
//!
//! Handlers run on the emitting task, in registration order. A handler
//! returning an error is logged and the remaining handlers still run.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::protocol::ClientAction;

/// The three logical channels.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr, strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
    /// UI-only notices, never transmitted.
    Local,
    /// Connection lifecycle and outbound intents.
    Network,
    /// Authoritative updates arriving from the transport.
    Sync,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LocalEvent {
    StateChanged,
    StateSynced,
    StateReset,
    /// Named notice owned by the UI layer (e.g. `"shop:click"`).
    Custom(&'static str),
}

impl LocalEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StateChanged => "state:changed",
            Self::StateSynced => "state:synced",
            Self::StateReset => "state:reset",
            Self::Custom(name) => name,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NetworkEvent {
    Connected,
    Disconnected,
    Error,
    /// Intent to send a client action to the authoritative peer.
    Outbound(ClientAction),
}

impl NetworkEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
            Self::Outbound(action) => action.into(),
        }
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::AsRefStr, strum::IntoStaticStr, strum::EnumIter,
)]
pub enum SyncEvent {
    #[strum(serialize = "player:joined")]
    PlayerJoined,
    #[strum(serialize = "player:left")]
    PlayerLeft,
    #[strum(serialize = "player:moved")]
    PlayerMoved,
    #[strum(serialize = "player:attacked")]
    PlayerAttacked,
    #[strum(serialize = "player:updated")]
    PlayerUpdated,
    #[strum(serialize = "state:sync")]
    StateSync,
    #[strum(serialize = "shop:purchase:success")]
    ShopPurchaseSuccess,
    #[strum(serialize = "shop:purchase:error")]
    ShopPurchaseError,
}

/// Fully qualified event name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventName {
    Local(LocalEvent),
    Network(NetworkEvent),
    Sync(SyncEvent),
}

impl EventName {
    pub fn channel(&self) -> Channel {
        match self {
            Self::Local(_) => Channel::Local,
            Self::Network(_) => Channel::Network,
            Self::Sync(_) => Channel::Sync,
        }
    }

    /// Name within the channel, without the channel prefix.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Local(event) => event.as_str(),
            Self::Network(event) => event.as_str(),
            Self::Sync(event) => event.into(),
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel(), self.name())
    }
}

impl From<LocalEvent> for EventName {
    fn from(event: LocalEvent) -> Self {
        Self::Local(event)
    }
}

impl From<NetworkEvent> for EventName {
    fn from(event: NetworkEvent) -> Self {
        Self::Network(event)
    }
}

impl From<SyncEvent> for EventName {
    fn from(event: SyncEvent) -> Self {
        Self::Sync(event)
    }
}

/// Identity of a registration, returned by [`EventBus::on`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

pub type Handler = Rc<dyn Fn(&Value) -> anyhow::Result<()>>;

#[derive(Default)]
struct BusInner {
    handlers: HashMap<EventName, Vec<(HandlerId, Handler)>>,
    next_id: u64,
}

/// Single-task publish/subscribe bus. Clones share registrations.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for the exact event `name`.
    pub fn on<F>(&self, name: impl Into<EventName>, handler: F) -> HandlerId
    where
        F: Fn(&Value) -> anyhow::Result<()> + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = HandlerId(inner.next_id);
        inner
            .handlers
            .entry(name.into())
            .or_default()
            .push((id, Rc::new(handler)));
        id
    }

    /// Removes one registration. Returns whether it existed.
    pub fn off(&self, name: impl Into<EventName>, id: HandlerId) -> bool {
        let name = name.into();
        let mut inner = self.inner.borrow_mut();
        let Some(handlers) = inner.handlers.get_mut(&name) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            inner.handlers.remove(&name);
        }
        removed
    }

    /// Invokes every handler registered for `name`, in registration order.
    ///
    /// Handlers registered or removed while the emission runs take effect
    /// from the next emission. Returns how many handlers were invoked.
    pub fn emit(&self, name: impl Into<EventName>, data: &Value) -> usize {
        let name = name.into();
        let handlers: Vec<(HandlerId, Handler)> = match self.inner.borrow().handlers.get(&name) {
            Some(handlers) => handlers.clone(),
            None => return 0,
        };

        tracing::trace!(target: "session::events", event = %name, handlers = handlers.len(), "emit");
        for (id, handler) in &handlers {
            if let Err(error) = handler(data) {
                tracing::error!(
                    target: "session::events",
                    event = %name,
                    handler = id.0,
                    error = %error,
                    "event handler failed"
                );
            }
        }
        handlers.len()
    }

    /// Drops every registration.
    pub fn clear(&self) {
        self.inner.borrow_mut().handlers.clear();
    }

    pub fn handler_count(&self, name: impl Into<EventName>) -> usize {
        self.inner
            .borrow()
            .handlers
            .get(&name.into())
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use serde_json::json;

    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&'static str) -> Handler) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let make = {
            let log = log.clone();
            move |tag: &'static str| -> Handler {
                let log = log.clone();
                Rc::new(move |_: &Value| {
                    log.borrow_mut().push(tag.to_owned());
                    Ok(())
                })
            }
        };
        (log, make)
    }

    #[test]
    fn names_render_wire_style() {
        assert_eq!(EventName::Sync(SyncEvent::StateSync).to_string(), "sync:state:sync");
        assert_eq!(
            EventName::Network(NetworkEvent::Outbound(ClientAction::PlayerMove)).to_string(),
            "network:player:move"
        );
        assert_eq!(
            EventName::Local(LocalEvent::Custom("shop:click")).to_string(),
            "local:shop:click"
        );
        assert_eq!(EventName::Network(NetworkEvent::Connected).channel(), Channel::Network);
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let first = make("first");
        let second = make("second");
        bus.on(NetworkEvent::Connected, move |v| first(v));
        bus.on(NetworkEvent::Connected, move |v| second(v));

        assert_eq!(bus.emit(NetworkEvent::Connected, &Value::Null), 2);
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn failing_handler_does_not_stop_the_rest() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let after = make("after");
        bus.on(SyncEvent::PlayerMoved, |_| anyhow::bail!("boom"));
        bus.on(SyncEvent::PlayerMoved, move |v| after(v));

        bus.emit(SyncEvent::PlayerMoved, &json!({"id": "p"}));
        assert_eq!(*log.borrow(), vec!["after"]);
    }

    #[test]
    fn off_removes_by_identity_only() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let a = make("a");
        let b = make("b");
        let id_a = bus.on(LocalEvent::StateChanged, move |v| a(v));
        bus.on(LocalEvent::StateChanged, move |v| b(v));

        assert!(bus.off(LocalEvent::StateChanged, id_a));
        assert!(!bus.off(LocalEvent::StateChanged, id_a));
        assert!(!bus.off(LocalEvent::StateSynced, id_a));

        bus.emit(LocalEvent::StateChanged, &Value::Null);
        assert_eq!(*log.borrow(), vec!["b"]);
    }

    #[test]
    fn emission_only_reaches_exact_name() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let a = make("sync");
        bus.on(SyncEvent::PlayerJoined, move |v| a(v));

        assert_eq!(bus.emit(SyncEvent::PlayerLeft, &Value::Null), 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn handlers_may_reenter_the_bus() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let inner = make("inner");
        bus.on(LocalEvent::Custom("inner"), move |v| inner(v));

        let reentrant = bus.clone();
        bus.on(LocalEvent::Custom("outer"), move |v| {
            reentrant.on(LocalEvent::Custom("late"), |_| Ok(()));
            reentrant.emit(LocalEvent::Custom("inner"), v);
            Ok(())
        });

        bus.emit(LocalEvent::Custom("outer"), &Value::Null);
        assert_eq!(*log.borrow(), vec!["inner"]);
        assert_eq!(bus.handler_count(LocalEvent::Custom("late")), 1);

        bus.clear();
        assert!(bus.is_empty());
    }
}
