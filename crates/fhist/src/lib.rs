#![forbid(unsafe_code)]

//! fhist public facade crate.
//!
//! Router-facing session history. Re-exports the common types from the
//! internal crates and offers constructors for each history flavor:
//!
//! - [`create_web_history`] / [`create_web_hash_history`]: the browser's
//!   back/forward stack (`wasm32` only).
//! - [`create_memory_history`]: an in-process stack.
//! - [`create_history`]: whichever flavor a [`HistoryConfig`] names, over
//!   any [`Host`].
//!
//! ```rust,ignore
//! use fhist::prelude::*;
//!
//! let history = create_web_history(Some("/app/"))?;
//! let teardown = history.listen(Rc::new(|event: &NavigationEvent| {
//!     tracing::info!(to = %event.to, delta = event.info.delta, "navigated");
//! }));
//! history.push("/settings", None);
//! ```

use std::fmt;
use std::rc::Rc;

// --- Core re-exports -------------------------------------------------------

pub use fhist_core::entry::{HistoryEntry, ScrollMarker, ScrollSlot, StateData};
pub use fhist_core::event::{NavigationDirection, NavigationEvent, NavigationInfo, NavigationType};
pub use fhist_core::location::{HistoryLocation, RawLocation};

// --- Backend re-exports ----------------------------------------------------

pub use fhist_backend::{Host, HostEvents, ScrollSource, SessionHistory};

// --- Runtime re-exports ----------------------------------------------------

pub use fhist_runtime::{
    ConfigError, HistoryConfig, HistoryMode, ListenerTeardown, MemoryHistory, NavigationCallback,
    RouterHistory, WebHistory,
};

// --- Host re-exports -------------------------------------------------------

#[cfg(target_arch = "wasm32")]
pub use fhist_web::browser::BrowserHost;
pub use fhist_web::{DeterministicHost, WebHostError};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for history construction.
#[derive(Debug)]
pub enum Error {
    /// The host could not be attached.
    Host(WebHostError),
    /// The configuration is invalid for the requested host.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Host(err) => Some(err),
            Self::Config(err) => Some(err),
        }
    }
}

impl From<WebHostError> for Error {
    fn from(err: WebHostError) -> Self {
        Self::Host(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

/// Standard result type for fhist constructors.
pub type Result<T> = std::result::Result<T, Error>;

// --- Constructors ---------------------------------------------------------

/// In-process history under `base`.
#[must_use]
pub fn create_memory_history(base: Option<&str>) -> MemoryHistory {
    MemoryHistory::new(base)
}

/// Path-based history on the browser's session stack.
#[cfg(target_arch = "wasm32")]
pub fn create_web_history(base: Option<&str>) -> Result<WebHistory<BrowserHost>> {
    let host = Rc::new(BrowserHost::new()?);
    Ok(WebHistory::new(host, base))
}

/// Fragment-based history on the browser's session stack.
#[cfg(target_arch = "wasm32")]
pub fn create_web_hash_history(base: Option<&str>) -> Result<WebHistory<BrowserHost>> {
    let host = Rc::new(BrowserHost::new()?);
    Ok(WebHistory::hash(host, base))
}

/// Build the history `config` names on top of `host`.
///
/// Memory mode ignores `host`.
pub fn create_history<H: Host + 'static>(
    config: &HistoryConfig,
    host: Rc<H>,
) -> Result<Box<dyn RouterHistory>> {
    if config.mode == HistoryMode::Memory {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors).into());
        }
        return Ok(Box::new(MemoryHistory::new(config.base.as_deref())));
    }
    Ok(Box::new(WebHistory::from_config(host, config)?))
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Error, HistoryConfig, HistoryEntry, HistoryLocation, HistoryMode, ListenerTeardown,
        MemoryHistory, NavigationDirection, NavigationEvent, Result, RouterHistory, StateData,
        WebHistory, create_history, create_memory_history,
    };

    #[cfg(target_arch = "wasm32")]
    pub use crate::{BrowserHost, create_web_hash_history, create_web_history};

    pub use crate::{backend, core, runtime, web};
    pub use std::rc::Rc;
}

pub use fhist_backend as backend;
pub use fhist_core as core;
pub use fhist_runtime as runtime;
pub use fhist_web as web;
