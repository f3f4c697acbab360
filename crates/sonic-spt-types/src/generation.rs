//! Topology generation counter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonically increasing counter bumped on every tree recomputation.
///
/// Every drop-rule action carries the generation that produced it so that
/// acknowledgments overtaken by a newer recomputation can be recognised
/// as stale.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Generation(u64);

impl Generation {
    /// The generation before any recomputation happened.
    pub const ZERO: Generation = Generation(0);

    /// Creates a generation from a raw counter value.
    pub const fn new(value: u64) -> Self {
        Generation(value)
    }

    /// Returns the raw counter value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the following generation.
    #[must_use]
    pub const fn next(self) -> Self {
        Generation(self.0.saturating_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen{}", self.0)
    }
}
