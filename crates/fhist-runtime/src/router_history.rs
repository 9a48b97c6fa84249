#![forbid(unsafe_code)]

//! The interface routers consume, and the listener registry behind it.
//!
//! # Listener isolation
//!
//! Listeners are invoked in registration order from a snapshot, so a
//! listener may add or remove listeners (including itself) while an event is
//! being delivered. A panicking listener is caught and logged; the remaining
//! listeners still run.

use std::cell::{Cell, RefCell};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

use fhist_core::entry::StateData;
use fhist_core::event::NavigationEvent;
use fhist_core::location::HistoryLocation;
use tracing::error;

/// Callback registered with [`RouterHistory::listen`].
pub type NavigationCallback = Rc<dyn Fn(&NavigationEvent)>;

/// History abstraction a router depends on.
pub trait RouterHistory {
    /// Normalized base every location is relative to.
    fn base(&self) -> &str;

    /// Current logical location (live).
    fn location(&self) -> HistoryLocation;

    /// Payload of the current slot (live).
    fn state(&self) -> StateData;

    /// Navigate to `to`, adding a slot.
    fn push(&self, to: &str, data: Option<&StateData>);

    /// Navigate to `to`, overwriting the current slot.
    fn replace(&self, to: &str, data: Option<&StateData>);

    /// Traverse by `delta`. With `trigger_listeners = false` the resulting
    /// pop is not published.
    fn go(&self, delta: i32, trigger_listeners: bool);

    /// Register a navigation listener.
    fn listen(&self, callback: NavigationCallback) -> ListenerTeardown;

    /// Href to render for `location`.
    fn create_href(&self, location: &str) -> String;

    /// Drop every listener and detach from the host.
    fn destroy(&self);
}

#[derive(Default)]
struct RegistryInner {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(u64, NavigationCallback)>>,
}

/// Ordered set of navigation listeners.
#[derive(Default, Clone)]
pub struct ListenerRegistry {
    inner: Rc<RegistryInner>,
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listener_count", &self.len())
            .finish()
    }
}

impl ListenerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `callback`, returning its teardown.
    pub fn add(&self, callback: NavigationCallback) -> ListenerTeardown {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.listeners.borrow_mut().push((id, callback));
        ListenerTeardown {
            registry: Rc::downgrade(&self.inner),
            id,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every listener.
    pub fn clear(&self) {
        self.inner.listeners.borrow_mut().clear();
    }

    /// Deliver `event` to every listener registered at call time.
    pub fn dispatch(&self, event: &NavigationEvent) {
        let snapshot: Vec<(u64, NavigationCallback)> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(id, cb)| (*id, Rc::clone(cb)))
            .collect();
        for (id, callback) in snapshot {
            // Removed by an earlier listener during this dispatch.
            if !self.contains(id) {
                continue;
            }
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(event))) {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_owned())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_owned());
                error!(listener = id, to = %event.to, %reason, "navigation listener panicked");
            }
        }
    }

    fn contains(&self, id: u64) -> bool {
        self.inner
            .listeners
            .borrow()
            .iter()
            .any(|(other, _)| *other == id)
    }
}

/// Removes one listener. Calling it again, or after the history is gone,
/// does nothing.
#[derive(Clone)]
pub struct ListenerTeardown {
    registry: Weak<RegistryInner>,
    id: u64,
}

impl std::fmt::Debug for ListenerTeardown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerTeardown")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl ListenerTeardown {
    pub fn teardown(&self) {
        if let Some(inner) = self.registry.upgrade() {
            inner.listeners.borrow_mut().retain(|(id, _)| *id != self.id);
        }
    }
}
