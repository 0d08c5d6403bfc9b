//! Wire protocol: JSON envelopes carrying a named action.
//!
//! ```json
//! { "action": "player:move", "data": { "x": 3, "y": 4 }, "timestamp": 1700000000000 }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use game_core::Timestamp;

use crate::events::SyncEvent;

/// Actions the client sends to the authoritative peer.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::IntoStaticStr,
    strum::EnumIter,
)]
pub enum ClientAction {
    #[strum(serialize = "player:join")]
    PlayerJoin,
    #[strum(serialize = "player:move")]
    PlayerMove,
    #[strum(serialize = "player:attack")]
    PlayerAttack,
    #[strum(serialize = "player:update")]
    PlayerUpdate,
    #[strum(serialize = "player:changeMap")]
    PlayerChangeMap,
    #[strum(serialize = "shop:purchase")]
    ShopPurchase,
    #[strum(serialize = "pong")]
    Pong,
}

/// Actions the authoritative peer sends to the client.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::IntoStaticStr,
)]
pub enum ServerAction {
    #[strum(serialize = "state:sync")]
    StateSync,
    #[strum(serialize = "player:update")]
    PlayerUpdate,
    #[strum(serialize = "player:joined")]
    PlayerJoined,
    #[strum(serialize = "player:left")]
    PlayerLeft,
    #[strum(serialize = "player:moved")]
    PlayerMoved,
    #[strum(serialize = "player:attacked")]
    PlayerAttacked,
    #[strum(serialize = "shop:purchase:success")]
    ShopPurchaseSuccess,
    #[strum(serialize = "shop:purchase:error")]
    ShopPurchaseError,
    #[strum(serialize = "ping")]
    Ping,
}

impl ServerAction {
    /// Sync-channel event this action is re-published as. `ping` is answered
    /// by the connection itself and never reaches the bus.
    pub fn sync_event(self) -> Option<SyncEvent> {
        let event = match self {
            Self::StateSync => SyncEvent::StateSync,
            Self::PlayerUpdate => SyncEvent::PlayerUpdated,
            Self::PlayerJoined => SyncEvent::PlayerJoined,
            Self::PlayerLeft => SyncEvent::PlayerLeft,
            Self::PlayerMoved => SyncEvent::PlayerMoved,
            Self::PlayerAttacked => SyncEvent::PlayerAttacked,
            Self::ShopPurchaseSuccess => SyncEvent::ShopPurchaseSuccess,
            Self::ShopPurchaseError => SyncEvent::ShopPurchaseError,
            Self::Ping => return None,
        };
        Some(event)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("unknown action `{0}`")]
    UnknownAction(String),

    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}

/// One protocol message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub action: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, deserialize_with = "millis_from_number")]
    pub timestamp: Timestamp,
}

/// Peers may send fractional or negative milliseconds; they are truncated
/// and clamped at zero.
fn millis_from_number<'de, D>(deserializer: D) -> Result<Timestamp, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    let millis = match number.as_u64() {
        Some(millis) => millis,
        None => number.as_f64().map_or(0, |millis| millis as u64),
    };
    Ok(Timestamp(millis))
}

impl Envelope {
    pub fn new(action: ClientAction, data: Value, timestamp: Timestamp) -> Self {
        Self {
            action: action.to_string(),
            data,
            timestamp,
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(frame).map_err(ProtocolError::Malformed)
    }

    /// Interprets the action as a server action.
    pub fn server_action(&self) -> Result<ServerAction, ProtocolError> {
        self.action
            .parse()
            .map_err(|_| ProtocolError::UnknownAction(self.action.clone()))
    }
}
