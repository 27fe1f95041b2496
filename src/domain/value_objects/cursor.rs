use serde::{Deserialize, Serialize};
use std::fmt;

/// The `lastPulledAt` cursor: the server timestamp (integer millis) through
/// which this client has already absorbed remote changes.
///
/// Monotonically non-decreasing; advanced only after a pull response has been
/// applied in full.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Cursor(i64);

impl Cursor {
    pub const ZERO: Cursor = Cursor(0);

    pub fn from_millis(millis: i64) -> Self {
        Self(millis.max(0))
    }

    pub fn millis(&self) -> i64 {
        self.0
    }

    /// Returns the later of the two cursors; never moves backwards.
    pub fn advanced_to(&self, other: Cursor) -> Cursor {
        if other > *self {
            other
        } else {
            *self
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
