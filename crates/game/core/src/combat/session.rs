use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::WorldConfig;
use crate::state::PlayerId;
use crate::time::Timestamp;

/// Key under which a combat session is stored.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CombatKey(pub String);

impl CombatKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CombatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds the session key for an attacker/defender pair.
///
/// Ordered: `session_key(a, b) != session_key(b, a)`.
pub fn session_key(attacker: &PlayerId, defender: &PlayerId) -> CombatKey {
    CombatKey(format!("{attacker}_{defender}"))
}

/// Active engagement between two players of the same shard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatSession {
    pub attacker: PlayerId,
    pub defender: PlayerId,
    pub started_at: Timestamp,
    pub last_hit: Timestamp,
}

impl CombatSession {
    pub fn new(attacker: PlayerId, defender: PlayerId, now: Timestamp) -> Self {
        Self {
            attacker,
            defender,
            started_at: now,
            last_hit: now,
        }
    }

    pub fn key(&self) -> CombatKey {
        session_key(&self.attacker, &self.defender)
    }

    pub fn involves(&self, player: &PlayerId) -> bool {
        &self.attacker == player || &self.defender == player
    }

    /// True once more than the combat timeout has passed since the last hit.
    pub fn is_stale(&self, now: Timestamp) -> bool {
        now.millis_since(self.last_hit) > WorldConfig::COMBAT_TIMEOUT_MS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_ordered() {
        let a = PlayerId::from("a");
        let b = PlayerId::from("b");
        assert_eq!(session_key(&a, &b).as_str(), "a_b");
        assert_ne!(session_key(&a, &b), session_key(&b, &a));
    }

    #[test]
    fn stale_only_after_timeout_is_exceeded() {
        let session = CombatSession::new("a".into(), "b".into(), Timestamp(1_000));

        assert!(!session.is_stale(Timestamp(1_000)));
        assert!(!session.is_stale(Timestamp(31_000)));
        assert!(session.is_stale(Timestamp(31_001)));
    }
}
