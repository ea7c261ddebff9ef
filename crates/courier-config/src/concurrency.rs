//! Instance concurrency and lifetime policies.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Governs whether calls on one instance context serialise.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ConcurrencyMode {
    /// One call at a time; call-outs keep the lock.
    #[default]
    Single,
    /// One call at a time; call-outs release the lock and re-enter with
    /// priority over new inbound calls.
    Reentrant,
    /// No locking at all.
    Multiple,
}

impl ConcurrencyMode {
    /// Returns `true` when calls on one instance context must be serialised.
    #[must_use]
    pub const fn requires_lock(self) -> bool {
        !matches!(self, Self::Multiple)
    }

    /// Returns `true` when call-outs release and later reacquire the lock.
    #[must_use]
    pub const fn releases_on_call_out(self) -> bool {
        matches!(self, Self::Reentrant)
    }
}

/// Governs how inbound messages map onto instance contexts.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum InstanceContextMode {
    /// A fresh instance context for every call.
    PerCall,
    /// One instance context per session; sessionless calls fall back to
    /// per-call behaviour.
    #[default]
    PerSession,
    /// One instance context shared by every call.
    Single,
}

/// Errors encountered while parsing concurrency or instance modes from text.
pub type ModeParseError = strum::ParseError;
