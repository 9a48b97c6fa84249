#![forbid(unsafe_code)]

//! Core data model for fhist.
//!
//! Everything in this crate is pure: no host access, no shared state.
//!
//! - [`location`]: raw host locations, base normalization and the
//!   logical-location codec (including hash-mode bases).
//! - [`entry`]: the per-slot [`HistoryEntry`] payload and its typed merges.
//! - [`event`]: the [`NavigationEvent`] published for host-originated pops.

pub mod entry;
pub mod event;
pub mod location;

pub use entry::{HistoryEntry, ScrollMarker, ScrollSlot, StateData};
pub use event::{NavigationDirection, NavigationEvent, NavigationInfo, NavigationType};
pub use location::{HistoryLocation, RawLocation};
