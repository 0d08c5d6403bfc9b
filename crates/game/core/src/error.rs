//! Common error infrastructure for game-core.
//!
//! Domain errors (`ShardError`, `CombatError`, `RegistryError`) live next to
//! the operations they describe. Every one of them implements [`GameError`]
//! so callers can decide how to react without matching on variants.
//!
//! Rejections such as a full shard or an attack into a safe zone are normal
//! gameplay outcomes that may succeed later. They are reported as
//! [`ErrorSeverity::Recoverable`] and must never be treated as crashes.
//! Requests that can never succeed unchanged (unknown shard, self-targeting)
//! are [`ErrorSeverity::Validation`].

/// Severity level of an error, used for categorization and recovery strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorSeverity {
    /// Temporary condition, may succeed later (shard full, target moved).
    Recoverable,

    /// Invalid request, should not be retried unchanged.
    Validation,

    /// Unexpected state inconsistency. Indicates a bug.
    Internal,

    /// State is corrupted and cannot be used.
    Fatal,
}

impl ErrorSeverity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::Validation => "validation",
            Self::Internal => "internal",
            Self::Fatal => "fatal",
        }
    }

    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable)
    }

    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal | Self::Fatal)
    }
}

/// Common trait for all game-core errors.
pub trait GameError: core::fmt::Display + core::fmt::Debug {
    fn severity(&self) -> ErrorSeverity;

    /// Stable identifier for metrics, logs and tests.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}
