#![forbid(unsafe_code)]

//! Session-history state machine for fhist.
//!
//! # Role in fhist
//! `fhist-runtime` keeps the router's view of navigation (current location
//! and current [`HistoryEntry`](fhist_core::HistoryEntry)) consistent with a
//! host's session-history stack. It is generic over
//! [`fhist_backend::Host`], so the same code runs against a browser or the
//! deterministic host in `fhist-web`.
//!
//! # Primary responsibilities
//! - **HistoryStack**: the two-write push protocol, in-place replace and the
//!   hard-navigation fallback when the host rejects a write.
//! - **PopReconciler**: host pop notifications turned into
//!   [`NavigationEvent`](fhist_core::NavigationEvent)s with a delta and
//!   direction, the pause marker and the before-unload scroll capture.
//! - **WebHistory / MemoryHistory**: the [`RouterHistory`] implementations.
//! - **HistoryConfig**: configuration loading and validation.

pub mod config;
pub mod memory;
pub mod reconciler;
pub mod router_history;
pub mod stack;
pub mod value_cell;
pub mod web_history;

pub use config::{ConfigError, HistoryConfig, HistoryMode};
pub use memory::MemoryHistory;
pub use reconciler::PopReconciler;
pub use router_history::{ListenerRegistry, ListenerTeardown, NavigationCallback, RouterHistory};
pub use stack::{HistoryStack, WriteOutcome};
pub use value_cell::ValueCell;
pub use web_history::WebHistory;
