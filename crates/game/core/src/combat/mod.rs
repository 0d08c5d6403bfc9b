//! Combat session tracking.
//!
//! A combat session records that one player has engaged another inside a
//! shard. Sessions carry no damage logic; they exist so that the world can
//! refuse to start fights in safe zones and drop fights that went quiet.
//!
//! # Session keys
//!
//! Sessions are keyed by the ordered `(attacker, defender)` pair, so
//! A-attacks-B and B-attacks-A are two independent sessions. All key
//! construction goes through [`session_key`] so the policy can be switched to
//! a symmetric key in one place.

mod error;
mod session;

pub use error::CombatError;
pub use session::{CombatKey, CombatSession, session_key};
