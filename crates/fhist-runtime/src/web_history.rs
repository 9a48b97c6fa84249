#![forbid(unsafe_code)]

//! Router history backed by a host session stack.

use std::rc::Rc;

use fhist_backend::{Host, SessionHistory};
use fhist_core::entry::{HistoryEntry, StateData};
use fhist_core::location::{self, HistoryLocation};

use crate::config::{ConfigError, HistoryConfig, HistoryMode};
use crate::reconciler::PopReconciler;
use crate::router_history::{ListenerTeardown, NavigationCallback, RouterHistory};
use crate::stack::HistoryStack;

/// History on top of a [`Host`]: path-based or, with a `#` base,
/// fragment-based.
///
/// `location()` and `state()` read the shared cells on every call, so they
/// always reflect the latest push, replace or pop.
pub struct WebHistory<H: Host> {
    stack: Rc<HistoryStack<H>>,
    reconciler: PopReconciler<H>,
}

impl<H: Host> std::fmt::Debug for WebHistory<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebHistory")
            .field("stack", &self.stack)
            .field("reconciler", &self.reconciler)
            .finish()
    }
}

impl<H: Host + 'static> WebHistory<H> {
    /// Path-based history under `base` (falls back to `<base href>`, then `/`).
    pub fn new(host: Rc<H>, base: Option<&str>) -> Self {
        let config = HistoryConfig::new(HistoryMode::Web, base);
        Self::build(host, base, &config)
    }

    /// Fragment-based history. Without a `#` in `base`, the marker is appended.
    pub fn hash(host: Rc<H>, base: Option<&str>) -> Self {
        let config = HistoryConfig::new(HistoryMode::Hash, base);
        let base = location::hash_base(base, &host.session().location());
        Self::build(host, Some(&base), &config)
    }

    /// Build the flavor `config` asks for.
    ///
    /// Memory mode has no host and is rejected here.
    pub fn from_config(host: Rc<H>, config: &HistoryConfig) -> Result<Self, ConfigError> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }
        let base = config.base.as_deref();
        match config.mode {
            HistoryMode::Web => Ok(Self::build(host, base, config)),
            HistoryMode::Hash => {
                let base = location::hash_base(base, &host.session().location());
                Ok(Self::build(host, Some(&base), config))
            }
            HistoryMode::Memory => Err(ConfigError::UnsupportedMode(HistoryMode::Memory)),
        }
    }

    fn build(host: Rc<H>, base: Option<&str>, config: &HistoryConfig) -> Self {
        let base = location::normalize_base(base, host.session().base_href().as_deref());
        let stack = Rc::new(HistoryStack::new(host, base, config.warn_on_foreign_state));
        let reconciler = PopReconciler::new(Rc::clone(&stack), config.capture_scroll_on_unload);
        Self { stack, reconciler }
    }

    /// Typed view of the current entry.
    #[must_use]
    pub fn entry(&self) -> HistoryEntry {
        self.stack.entry_cell().get()
    }

    #[must_use]
    pub fn host(&self) -> &Rc<H> {
        self.stack.host()
    }

    /// Suppress the notification of the next traversal away from the
    /// current location.
    pub fn pause_listeners(&self) {
        self.reconciler.pause_listeners();
    }
}

impl<H: Host + 'static> RouterHistory for WebHistory<H> {
    fn base(&self) -> &str {
        self.stack.base()
    }

    fn location(&self) -> HistoryLocation {
        self.stack.location_cell().get()
    }

    fn state(&self) -> StateData {
        self.stack.entry_cell().with(HistoryEntry::to_state_data)
    }

    fn push(&self, to: &str, data: Option<&StateData>) {
        self.stack.push(to, data);
    }

    fn replace(&self, to: &str, data: Option<&StateData>) {
        self.stack.replace(to, data);
    }

    fn go(&self, delta: i32, trigger_listeners: bool) {
        if !trigger_listeners {
            self.reconciler.pause_listeners();
        }
        self.stack.host().session().go(delta);
    }

    fn listen(&self, callback: NavigationCallback) -> ListenerTeardown {
        self.reconciler.listen(callback)
    }

    fn create_href(&self, location: &str) -> String {
        location::create_href(self.stack.base(), location)
    }

    fn destroy(&self) {
        self.reconciler.destroy();
    }
}
