#![forbid(unsafe_code)]

//! `fhist-web` provides host implementations for the fhist history runtime.
//!
//! Design goals:
//! - **Host-driven traversal**: [`DeterministicHost`] never dispatches on its
//!   own. `go` only queues; the embedder calls [`DeterministicHost::settle`]
//!   (or one of the user-gesture helpers) to move the stack and deliver the
//!   resulting notifications, mirroring the browser's asynchronous
//!   `popstate`.
//! - **Failure injection**: writes can be made to fail to exercise the
//!   hard-navigation fallback.
//! - **No blocking / no threads**: suitable for `wasm32-unknown-unknown`.
//!
//! The real browser binding lives in [`browser`] and is only compiled for
//! `wasm32`.

#[cfg(target_arch = "wasm32")]
pub mod browser;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use fhist_backend::{
    Host, HostEvents, HostNotification, NotificationHandler, NotificationKind, ScrollSource,
    SessionHistory, SubscriptionId,
};
use fhist_core::entry::ScrollMarker;
use fhist_core::location::RawLocation;
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Web host error type.
#[derive(Debug, thiserror::Error)]
pub enum WebHostError {
    /// The host refused the write (rate limit, quota).
    #[error("history write rejected: {0}")]
    Rejected(String),
    /// The URL could not be resolved against the current document.
    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    /// The URL resolves to another origin.
    #[error("cross-origin url {0:?}")]
    CrossOrigin(String),
    /// The payload could not be converted for the host.
    #[error("payload conversion failed: {0}")]
    Payload(#[from] serde_json::Error),
    /// A host API threw.
    #[error("host error: {0}")]
    Js(String),
}

/// Hard navigation recorded by [`DeterministicSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardNavigation {
    pub url: String,
    /// `true` for `location.replace`, `false` for `location.assign`.
    pub replace: bool,
}

#[derive(Debug, Clone)]
struct Slot {
    url: Url,
    state: Option<Value>,
}

#[derive(Debug)]
struct SessionState {
    slots: Vec<Slot>,
    index: usize,
    pending: VecDeque<i32>,
    successes_before_failure: u32,
    failures_left: u32,
    hard_navigations: Vec<HardNavigation>,
    writes: usize,
}

/// In-memory session-history stack.
#[derive(Debug)]
pub struct DeterministicSession {
    state: RefCell<SessionState>,
    base_href: RefCell<Option<String>>,
}

impl DeterministicSession {
    fn new(url: Url) -> Self {
        Self {
            state: RefCell::new(SessionState {
                slots: vec![Slot { url, state: None }],
                index: 0,
                pending: VecDeque::new(),
                successes_before_failure: 0,
                failures_left: 0,
                hard_navigations: Vec::new(),
                writes: 0,
            }),
            base_href: RefCell::new(None),
        }
    }

    fn current_url(&self) -> Url {
        let state = self.state.borrow();
        state.slots[state.index].url.clone()
    }

    fn resolve(&self, url: &str) -> Result<Url, WebHostError> {
        let current = self.current_url();
        let resolved = current.join(url).map_err(|source| WebHostError::InvalidUrl {
            url: url.to_owned(),
            source,
        })?;
        // Opaque origins (`file:`) never compare equal, so only check hosted documents.
        let hosted = current.host_str().is_some_and(|host| !host.is_empty());
        if hosted && resolved.origin() != current.origin() {
            return Err(WebHostError::CrossOrigin(url.to_owned()));
        }
        Ok(resolved)
    }

    fn take_failure(&self) -> Result<(), WebHostError> {
        let mut state = self.state.borrow_mut();
        if state.failures_left == 0 {
            return Ok(());
        }
        if state.successes_before_failure > 0 {
            state.successes_before_failure -= 1;
            return Ok(());
        }
        state.failures_left -= 1;
        Err(WebHostError::Rejected(
            "too many calls to the history API".into(),
        ))
    }

    fn push_slot(&self, slot: Slot) {
        let mut state = self.state.borrow_mut();
        let next = state.index + 1;
        state.slots.truncate(next);
        state.slots.push(slot);
        state.index = next;
    }

    /// Current document URL.
    #[must_use]
    pub fn url(&self) -> String {
        self.current_url().to_string()
    }

    /// Index of the current slot.
    #[must_use]
    pub fn index(&self) -> usize {
        self.state.borrow().index
    }

    /// Payloads of every slot, oldest first.
    #[must_use]
    pub fn states(&self) -> Vec<Option<Value>> {
        self.state
            .borrow()
            .slots
            .iter()
            .map(|slot| slot.state.clone())
            .collect()
    }

    /// Hard navigations requested so far.
    #[must_use]
    pub fn hard_navigations(&self) -> Vec<HardNavigation> {
        self.state.borrow().hard_navigations.clone()
    }

    /// Number of successful `push_state`/`replace_state` calls.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.state.borrow().writes
    }

    /// Make the next `count` writes fail.
    pub fn fail_next_writes(&self, count: u32) {
        self.fail_writes_after(0, count);
    }

    /// Let `skip` writes through, then fail the following `count`.
    pub fn fail_writes_after(&self, skip: u32, count: u32) {
        let mut state = self.state.borrow_mut();
        state.successes_before_failure = skip;
        state.failures_left = count;
    }

    /// Overwrite the current slot's payload without going through the
    /// history API contract (simulates foreign code calling `replaceState`).
    pub fn overwrite_state(&self, payload: Option<Value>) {
        let mut state = self.state.borrow_mut();
        let index = state.index;
        state.slots[index].state = payload;
    }

    pub fn set_base_href(&self, href: Option<&str>) {
        *self.base_href.borrow_mut() = href.map(str::to_owned);
    }

    /// Move the stack by `delta`, returning the new slot's payload.
    ///
    /// Out-of-range and zero deltas do nothing.
    fn traverse(&self, delta: i32) -> Option<Option<Value>> {
        let mut state = self.state.borrow_mut();
        let target = i64::try_from(state.index).ok()? + i64::from(delta);
        let target = usize::try_from(target).ok()?;
        if delta == 0 || target >= state.slots.len() {
            return None;
        }
        state.index = target;
        Some(state.slots[target].state.clone())
    }
}

fn raw_location(url: &Url) -> RawLocation {
    let host = url
        .host_str()
        .map(|host| match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        })
        .unwrap_or_default();
    let origin = if host.is_empty() {
        String::new()
    } else {
        format!("{}://{host}", url.scheme())
    };
    RawLocation {
        pathname: url.path().to_owned(),
        search: url
            .query()
            .filter(|q| !q.is_empty())
            .map(|q| format!("?{q}"))
            .unwrap_or_default(),
        hash: url
            .fragment()
            .filter(|f| !f.is_empty())
            .map(|f| format!("#{f}"))
            .unwrap_or_default(),
        origin,
        host,
    }
}

impl SessionHistory for DeterministicSession {
    type Error = WebHostError;

    fn location(&self) -> RawLocation {
        raw_location(&self.current_url())
    }

    fn base_href(&self) -> Option<String> {
        self.base_href.borrow().clone()
    }

    fn state(&self) -> Option<Value> {
        let state = self.state.borrow();
        state.slots[state.index].state.clone()
    }

    fn length(&self) -> usize {
        self.state.borrow().slots.len()
    }

    fn push_state(&self, payload: Value, _title: &str, url: &str) -> Result<(), Self::Error> {
        self.take_failure()?;
        let url = self.resolve(url)?;
        self.push_slot(Slot {
            url,
            state: Some(payload),
        });
        self.state.borrow_mut().writes += 1;
        Ok(())
    }

    fn replace_state(
        &self,
        payload: Value,
        _title: &str,
        url: Option<&str>,
    ) -> Result<(), Self::Error> {
        self.take_failure()?;
        let url = match url {
            Some(url) => self.resolve(url)?,
            None => self.current_url(),
        };
        let mut state = self.state.borrow_mut();
        let index = state.index;
        state.slots[index] = Slot {
            url,
            state: Some(payload),
        };
        state.writes += 1;
        Ok(())
    }

    fn go(&self, delta: i32) {
        self.state.borrow_mut().pending.push_back(delta);
    }

    fn assign(&self, url: &str) {
        self.state.borrow_mut().hard_navigations.push(HardNavigation {
            url: url.to_owned(),
            replace: false,
        });
        if let Ok(resolved) = self.resolve(url) {
            self.push_slot(Slot {
                url: resolved,
                state: None,
            });
        }
    }

    fn replace_location(&self, url: &str) {
        self.state.borrow_mut().hard_navigations.push(HardNavigation {
            url: url.to_owned(),
            replace: true,
        });
        if let Ok(resolved) = self.resolve(url) {
            let mut state = self.state.borrow_mut();
            let index = state.index;
            state.slots[index] = Slot {
                url: resolved,
                state: None,
            };
        }
    }
}

/// Host-controlled scroll offsets.
#[derive(Debug, Default)]
pub struct DeterministicScroll {
    marker: Cell<ScrollMarker>,
}

impl DeterministicScroll {
    pub fn set(&self, marker: ScrollMarker) {
        self.marker.set(marker);
    }
}

impl ScrollSource for DeterministicScroll {
    fn capture(&self) -> ScrollMarker {
        self.marker.get()
    }
}

/// Notification registry dispatching in registration order.
#[derive(Default)]
pub struct DeterministicEvents {
    next_id: Cell<u64>,
    handlers: RefCell<Vec<(SubscriptionId, NotificationKind, NotificationHandler)>>,
}

impl core::fmt::Debug for DeterministicEvents {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeterministicEvents")
            .field("handler_count", &self.handlers.borrow().len())
            .finish()
    }
}

impl DeterministicEvents {
    /// Number of live subscriptions for `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: NotificationKind) -> usize {
        self.handlers
            .borrow()
            .iter()
            .filter(|(_, other, _)| *other == kind)
            .count()
    }

    fn emit(&self, notification: &HostNotification) {
        // Collect first so handlers may (un)subscribe while we dispatch.
        let handlers: Vec<NotificationHandler> = self
            .handlers
            .borrow()
            .iter()
            .filter(|(_, kind, _)| *kind == notification.kind())
            .map(|(_, _, handler)| Rc::clone(handler))
            .collect();
        for handler in handlers {
            handler(notification);
        }
    }
}

impl HostEvents for DeterministicEvents {
    fn subscribe(&self, kind: NotificationKind, handler: NotificationHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.handlers.borrow_mut().push((id, kind, handler));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.handlers.borrow_mut().retain(|(other, _, _)| *other != id);
    }
}

/// Deterministic, host-driven session for tests and non-browser embedding.
#[derive(Debug)]
pub struct DeterministicHost {
    session: DeterministicSession,
    scroll: DeterministicScroll,
    events: DeterministicEvents,
}

impl DeterministicHost {
    /// Open a session on `url` with one slot and no payload.
    pub fn new(url: &str) -> Result<Self, WebHostError> {
        let url = Url::parse(url).map_err(|source| WebHostError::InvalidUrl {
            url: url.to_owned(),
            source,
        })?;
        Ok(Self {
            session: DeterministicSession::new(url),
            scroll: DeterministicScroll::default(),
            events: DeterministicEvents::default(),
        })
    }

    /// Deliver traversals queued by `go`, returning how many moved the stack.
    pub fn settle(&self) -> usize {
        let mut moved = 0;
        loop {
            let Some(delta) = self.session.state.borrow_mut().pending.pop_front() else {
                break;
            };
            if self.dispatch_traversal(delta) {
                moved += 1;
            }
        }
        moved
    }

    /// A user gesture on the back/forward buttons: traverse now and notify.
    pub fn traverse(&self, delta: i32) -> bool {
        self.dispatch_traversal(delta)
    }

    /// Follow an in-page fragment link: a new slot without payload, then a
    /// pop notification carrying no state.
    pub fn follow_fragment(&self, fragment: &str) -> Result<(), WebHostError> {
        let url = self.session.resolve(fragment)?;
        self.session.push_slot(Slot { url, state: None });
        self.events
            .emit(&HostNotification::PopState { state: None });
        Ok(())
    }

    /// Emit a raw pop notification without moving the stack.
    pub fn dispatch_pop_state(&self, state: Option<Value>) {
        self.events.emit(&HostNotification::PopState { state });
    }

    /// Emit the before-unload notification.
    pub fn unload(&self) {
        self.events.emit(&HostNotification::BeforeUnload);
    }

    fn dispatch_traversal(&self, delta: i32) -> bool {
        match self.session.traverse(delta) {
            Some(state) => {
                debug!(delta, index = self.session.index(), "session traversal");
                self.events.emit(&HostNotification::PopState { state });
                true
            }
            None => false,
        }
    }
}

impl Host for DeterministicHost {
    type Error = WebHostError;
    type Session = DeterministicSession;
    type Scroll = DeterministicScroll;
    type Events = DeterministicEvents;

    fn session(&self) -> &Self::Session {
        &self.session
    }

    fn scroll(&self) -> &Self::Scroll {
        &self.scroll
    }

    fn events(&self) -> &Self::Events {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn host(url: &str) -> DeterministicHost {
        DeterministicHost::new(url).expect("valid url")
    }

    #[test]
    fn initial_session_has_one_empty_slot() {
        let host = host("https://example.com/app/foo?x=1#top");
        let session = host.session();
        assert_eq!(session.length(), 1);
        assert_eq!(session.state(), None);
        assert_eq!(
            session.location(),
            RawLocation {
                pathname: "/app/foo".into(),
                search: "?x=1".into(),
                hash: "#top".into(),
                origin: "https://example.com".into(),
                host: "example.com".into(),
            }
        );
    }

    #[test]
    fn location_keeps_port_and_drops_empty_parts() {
        let host = host("http://localhost:8080/?#");
        let loc = host.session().location();
        assert_eq!(loc.host, "localhost:8080");
        assert_eq!(loc.origin, "http://localhost:8080");
        assert_eq!(loc.search, "");
        assert_eq!(loc.hash, "");
    }

    #[test]
    fn file_documents_have_no_host() {
        let host = host("file:///tmp/index.html");
        let loc = host.session().location();
        assert!(loc.host.is_empty());
        assert!(loc.origin.is_empty());
    }

    #[test]
    fn push_truncates_forward_slots() {
        let host = host("https://example.com/");
        let session = host.session();
        session.push_state(json!(1), "", "/a").unwrap();
        session.push_state(json!(2), "", "/b").unwrap();
        assert!(host.traverse(-1));
        session.push_state(json!(3), "", "/c").unwrap();
        assert_eq!(session.length(), 3);
        assert_eq!(session.states(), vec![None, Some(json!(1)), Some(json!(3))]);
        assert_eq!(session.write_count(), 3);
    }

    #[test]
    fn urls_resolve_relative_to_current() {
        let host = host("https://example.com/app/page");
        let session = host.session();
        session.push_state(json!(null), "", "#/x").unwrap();
        assert_eq!(session.url(), "https://example.com/app/page#/x");
        session.replace_state(json!(null), "", Some("/root")).unwrap();
        assert_eq!(session.url(), "https://example.com/root");
        session.replace_state(json!(2), "", None).unwrap();
        assert_eq!(session.url(), "https://example.com/root");
    }

    #[test]
    fn cross_origin_writes_fail() {
        let host = host("https://example.com/");
        let err = host
            .session()
            .push_state(json!(null), "", "https://evil.test/")
            .unwrap_err();
        assert!(matches!(err, WebHostError::CrossOrigin(_)));
    }

    #[test]
    fn injected_failures_are_consumed() {
        let host = host("https://example.com/");
        let session = host.session();
        session.fail_next_writes(1);
        let err = session.push_state(json!(1), "", "/a").unwrap_err();
        assert!(err.to_string().contains("rejected"));
        assert!(session.push_state(json!(1), "", "/a").is_ok());
    }

    #[test]
    fn delayed_failures_skip_leading_writes() {
        let host = host("https://example.com/");
        let session = host.session();
        session.fail_writes_after(1, 1);
        assert!(session.replace_state(json!(0), "", None).is_ok());
        assert!(session.push_state(json!(1), "", "/a").is_err());
        assert!(session.push_state(json!(1), "", "/a").is_ok());
        assert_eq!(session.write_count(), 2);
    }

    #[test]
    fn go_is_deferred_until_settle() {
        let host = host("https://example.com/");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);
        host.events().subscribe(
            NotificationKind::PopState,
            Rc::new(move |n| seen_clone.borrow_mut().push(n.clone())),
        );
        host.session().push_state(json!({ "n": 1 }), "", "/a").unwrap();
        host.session().go(-1);
        assert!(seen.borrow().is_empty());
        assert_eq!(host.session().index(), 1);

        assert_eq!(host.settle(), 1);
        assert_eq!(host.session().index(), 0);
        assert_eq!(
            *seen.borrow(),
            vec![HostNotification::PopState { state: None }]
        );
    }

    #[test]
    fn out_of_range_traversal_is_ignored() {
        let host = host("https://example.com/");
        host.session().go(-3);
        host.session().go(0);
        assert_eq!(host.settle(), 0);
        assert!(!host.traverse(1));
    }

    #[test]
    fn hard_navigations_are_recorded() {
        let host = host("https://example.com/");
        host.session().assign("https://example.com/next");
        host.session().replace_location("/other");
        assert_eq!(
            host.session().hard_navigations(),
            vec![
                HardNavigation {
                    url: "https://example.com/next".into(),
                    replace: false
                },
                HardNavigation {
                    url: "/other".into(),
                    replace: true
                },
            ]
        );
        assert_eq!(host.session().length(), 2);
        assert_eq!(host.session().url(), "https://example.com/other");
    }

    #[test]
    fn follow_fragment_pushes_stateless_slot() {
        let host = host("https://example.com/#/a");
        let pops = Rc::new(Cell::new(0u32));
        let pops_clone = Rc::clone(&pops);
        host.events().subscribe(
            NotificationKind::PopState,
            Rc::new(move |_| pops_clone.set(pops_clone.get() + 1)),
        );
        host.follow_fragment("#/b").unwrap();
        assert_eq!(pops.get(), 1);
        assert_eq!(host.session().location().hash, "#/b");
        assert_eq!(host.session().state(), None);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let host = host("https://example.com/");
        let count = Rc::new(Cell::new(0u32));
        let count_clone = Rc::clone(&count);
        let id = host.events().subscribe(
            NotificationKind::BeforeUnload,
            Rc::new(move |_| count_clone.set(count_clone.get() + 1)),
        );
        assert_eq!(host.events().subscriber_count(NotificationKind::BeforeUnload), 1);
        host.unload();
        host.events().unsubscribe(id);
        host.unload();
        assert_eq!(count.get(), 1);
        assert_eq!(host.events().subscriber_count(NotificationKind::BeforeUnload), 0);
    }

    #[test]
    fn scroll_and_base_href_are_host_controlled() {
        let host = host("https://example.com/");
        host.scroll().set(ScrollMarker::new(1.0, 2.0));
        assert_eq!(host.scroll().capture(), ScrollMarker::new(1.0, 2.0));
        host.session().set_base_href(Some("/docs/"));
        assert_eq!(host.session().base_href().as_deref(), Some("/docs/"));
    }

    #[test]
    fn overwrite_state_bypasses_write_count() {
        let host = host("https://example.com/");
        host.session().overwrite_state(Some(json!({ "foreign": true })));
        assert_eq!(host.session().state(), Some(json!({ "foreign": true })));
        assert_eq!(host.session().write_count(), 0);
    }
}
