#![forbid(unsafe_code)]

//! Navigation events published to history listeners.

use serde::{Deserialize, Serialize};

use crate::location::HistoryLocation;

/// Kind of navigation that produced an event.
///
/// Listeners only ever see host-originated traversals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum NavigationType {
    Pop,
}

/// Direction of a traversal, derived from the sign of its delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationDirection {
    Back,
    Forward,
    Unknown,
}

impl NavigationDirection {
    /// `Unknown` for zero, `Forward` for positive, `Back` for negative.
    #[must_use]
    pub const fn from_delta(delta: i64) -> Self {
        if delta > 0 {
            Self::Forward
        } else if delta < 0 {
            Self::Back
        } else {
            Self::Unknown
        }
    }
}

/// Metadata attached to a navigation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationInfo {
    pub delta: i64,
    #[serde(rename = "type")]
    pub kind: NavigationType,
    pub direction: NavigationDirection,
}

impl NavigationInfo {
    /// Info for a pop whose direction follows the delta.
    #[must_use]
    pub const fn pop(delta: i64) -> Self {
        Self {
            delta,
            kind: NavigationType::Pop,
            direction: NavigationDirection::from_delta(delta),
        }
    }
}

/// A navigation the application did not initiate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationEvent {
    pub to: HistoryLocation,
    pub from: HistoryLocation,
    pub info: NavigationInfo,
}
