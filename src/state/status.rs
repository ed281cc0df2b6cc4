//! Item state lifecycle.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a node or property state.
///
/// ```text
///  Existing ◄──(save)── Modified
///     │  └─────────────────►│
///     ├──► Stale ◄──────────┤
///     │      │              │
///     └──────┴──► Removed ◄─┘
/// ```
///
/// A `Stale` state is never revived. The next lookup materializes a new
/// instance in its place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Materialized from the service and unchanged.
    Existing,
    /// Changed by the session and not yet saved.
    Modified,
    /// Changed externally; replaced by a fresh state on the next lookup.
    Stale,
    /// Gone. Terminal.
    Removed,
}

impl Status {
    pub fn can_transition_to(self, to: Status) -> bool {
        use Status::*;
        matches!(
            (self, to),
            (Existing, Modified | Stale | Removed)
                | (Modified, Existing | Stale | Removed)
                | (Stale, Removed)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == Status::Removed
    }

    /// Whether the state may be handed out to callers.
    pub fn is_valid(self) -> bool {
        matches!(self, Status::Existing | Status::Modified)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Existing => "EXISTING",
            Status::Modified => "EXISTING_MODIFIED",
            Status::Stale => "STALE",
            Status::Removed => "REMOVED",
        };
        f.write_str(s)
    }
}
