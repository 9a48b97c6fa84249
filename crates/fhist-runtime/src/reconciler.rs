#![forbid(unsafe_code)]

//! Host-originated navigation: pop reconciliation and the unload hook.
//!
//! The reconciler subscribes to two host notifications when it is created
//! and holds them until [`PopReconciler::destroy`]:
//!
//! - `PopState`: the user (or a programmatic `go`) moved the host stack. The
//!   reported payload is diffed against the cached entry and listeners are
//!   told the delta and direction.
//! - `BeforeUnload`: the current slot is rewritten with a fresh scroll
//!   marker, best effort.
//!
//! Host handlers hold a weak reference, so dropping every handle to the
//! reconciler turns late notifications into no-ops.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use fhist_backend::{
    Host, HostEvents, HostNotification, NotificationKind, SessionHistory, SubscriptionId,
};
use fhist_core::entry::HistoryEntry;
use fhist_core::event::{NavigationEvent, NavigationInfo};
use fhist_core::location::HistoryLocation;
use serde_json::Value;
use tracing::{debug, debug_span};

use crate::router_history::{ListenerRegistry, ListenerTeardown, NavigationCallback};
use crate::stack::HistoryStack;

struct ReconcilerInner<H: Host> {
    stack: Rc<HistoryStack<H>>,
    listeners: ListenerRegistry,
    pause: RefCell<Option<HistoryLocation>>,
    subscriptions: RefCell<Vec<SubscriptionId>>,
    capture_scroll_on_unload: bool,
}

/// Turns host pop notifications into [`NavigationEvent`]s.
pub struct PopReconciler<H: Host> {
    inner: Rc<ReconcilerInner<H>>,
}

impl<H: Host> Clone for PopReconciler<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<H: Host> std::fmt::Debug for PopReconciler<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopReconciler")
            .field("listeners", &self.inner.listeners)
            .field("pause", &self.inner.pause.borrow())
            .field("subscriptions", &self.inner.subscriptions.borrow().len())
            .finish_non_exhaustive()
    }
}

impl<H: Host + 'static> PopReconciler<H> {
    /// Attach to the stack's host.
    pub fn new(stack: Rc<HistoryStack<H>>, capture_scroll_on_unload: bool) -> Self {
        let inner = Rc::new(ReconcilerInner {
            stack,
            listeners: ListenerRegistry::new(),
            pause: RefCell::new(None),
            subscriptions: RefCell::new(Vec::new()),
            capture_scroll_on_unload,
        });

        let weak = Rc::downgrade(&inner);
        let events = inner.stack.host().events();
        let pop = events.subscribe(
            NotificationKind::PopState,
            Rc::new(move |notification: &HostNotification| {
                if let (Some(inner), HostNotification::PopState { state }) =
                    (Weak::upgrade(&weak), notification)
                {
                    inner.handle_pop(state.as_ref());
                }
            }),
        );
        let weak = Rc::downgrade(&inner);
        let unload = events.subscribe(
            NotificationKind::BeforeUnload,
            Rc::new(move |_: &HostNotification| {
                if let Some(inner) = weak.upgrade() {
                    inner.before_unload();
                }
            }),
        );
        inner.subscriptions.borrow_mut().extend([pop, unload]);
        Self { inner }
    }

    /// Swallow the next pop whose origin is the current location.
    ///
    /// Must run before the host traversal is requested.
    pub fn pause_listeners(&self) {
        let current = self.inner.stack.location_cell().get();
        *self.inner.pause.borrow_mut() = Some(current);
    }

    /// Whether a pause marker is pending.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.inner.pause.borrow().is_some()
    }

    /// Register `callback` for pop events.
    pub fn listen(&self, callback: NavigationCallback) -> ListenerTeardown {
        self.inner.listeners.add(callback)
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Remove every listener, then drop the host subscriptions.
    ///
    /// Safe to call more than once.
    pub fn destroy(&self) {
        let listeners = self.inner.listeners.len();
        self.inner.listeners.clear();
        let subscriptions = std::mem::take(&mut *self.inner.subscriptions.borrow_mut());
        let events = self.inner.stack.host().events();
        for id in subscriptions {
            events.unsubscribe(id);
        }
        if listeners > 0 {
            debug!(listeners, "history destroyed");
        }
    }

    /// Process one pop notification as the host would deliver it.
    pub fn handle_pop(&self, state: Option<&Value>) {
        self.inner.handle_pop(state);
    }

    /// Process the before-unload notification.
    pub fn before_unload(&self) {
        self.inner.before_unload();
    }
}

impl<H: Host> ReconcilerInner<H> {
    fn handle_pop(&self, state: Option<&Value>) {
        let stack = &self.stack;
        let to = stack.host_location();
        let _span = debug_span!("fhist.pop", %to).entered();
        let from = stack.location_cell().get();
        let from_entry = stack.entry_cell().get();

        let mut delta = 0;
        match state.filter(|payload| payload.is_object()) {
            Some(payload) => {
                let entry = HistoryEntry::from_payload(payload)
                    .unwrap_or_else(|| from_entry.overlay(payload));
                let position = entry.position;
                stack.location_cell().set(to);
                stack.entry_cell().set(entry);

                let paused = self.pause.borrow().as_ref() == Some(&from);
                if paused {
                    *self.pause.borrow_mut() = None;
                    debug!(%from, "pop suppressed by pause marker");
                    return;
                }
                delta = position.saturating_sub(from_entry.position);
            }
            None => {
                debug!("pop without stored entry; rewriting current slot");
                stack.replace(&to, None);
            }
        }

        let event = NavigationEvent {
            to: stack.location_cell().get(),
            from,
            info: NavigationInfo::pop(delta),
        };
        self.listeners.dispatch(&event);
    }

    fn before_unload(&self) {
        if !self.capture_scroll_on_unload {
            return;
        }
        let session = self.stack.host().session();
        let Some(Value::Object(mut payload)) = session.state() else {
            return;
        };
        payload.insert("scroll".into(), self.stack.capture_scroll().to_value());
        if let Err(err) = session.replace_state(Value::Object(payload), "", None) {
            debug!(error = %err, "scroll capture before unload failed");
        }
    }
}
