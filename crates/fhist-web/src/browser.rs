#![forbid(unsafe_code)]

//! Browser host over `window.history`, `window.location` and DOM events.
//!
//! Payloads cross the JS boundary as plain objects built with `JSON.parse`,
//! so entries stay readable by other scripts and survive reloads.

use std::cell::{Cell, RefCell};

use fhist_backend::{
    Host, HostEvents, HostNotification, NotificationHandler, NotificationKind, ScrollSource,
    SessionHistory, SubscriptionId,
};
use fhist_core::entry::ScrollMarker;
use fhist_core::location::RawLocation;
use serde_json::Value;
use tracing::debug;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::WebHostError;

type EventClosure = Closure<dyn FnMut(web_sys::Event)>;

struct Listener {
    id: SubscriptionId,
    name: &'static str,
    closure: EventClosure,
}

/// Host backed by the current browser window.
pub struct BrowserHost {
    window: web_sys::Window,
    history: web_sys::History,
    next_id: Cell<u64>,
    listeners: RefCell<Vec<Listener>>,
}

impl core::fmt::Debug for BrowserHost {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BrowserHost")
            .field("listener_count", &self.listeners.borrow().len())
            .finish_non_exhaustive()
    }
}

fn js_error(err: JsValue) -> WebHostError {
    WebHostError::Js(
        err.as_string()
            .or_else(|| {
                js_sys::JSON::stringify(&err)
                    .ok()
                    .and_then(|s| s.as_string())
            })
            .unwrap_or_else(|| "unknown".into()),
    )
}

fn to_js(payload: &Value) -> Result<JsValue, WebHostError> {
    let text = serde_json::to_string(payload)?;
    js_sys::JSON::parse(&text).map_err(js_error)
}

fn from_js(value: &JsValue) -> Option<Value> {
    if value.is_null() || value.is_undefined() {
        return None;
    }
    let text = js_sys::JSON::stringify(value).ok()?.as_string()?;
    serde_json::from_str(&text).ok()
}

const fn event_name(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::PopState => "popstate",
        NotificationKind::BeforeUnload => "beforeunload",
    }
}

impl BrowserHost {
    /// Bind to the global `window`.
    pub fn new() -> Result<Self, WebHostError> {
        let window =
            web_sys::window().ok_or_else(|| WebHostError::Js("no global window".into()))?;
        let history = window.history().map_err(js_error)?;
        Ok(Self {
            window,
            history,
            next_id: Cell::new(0),
            listeners: RefCell::new(Vec::new()),
        })
    }
}

impl SessionHistory for BrowserHost {
    type Error = WebHostError;

    fn location(&self) -> RawLocation {
        let location = self.window.location();
        RawLocation {
            pathname: location.pathname().unwrap_or_default(),
            search: location.search().unwrap_or_default(),
            hash: location.hash().unwrap_or_default(),
            origin: location.origin().unwrap_or_default(),
            host: location.host().unwrap_or_default(),
        }
    }

    fn base_href(&self) -> Option<String> {
        self.window
            .document()?
            .query_selector("base")
            .ok()??
            .get_attribute("href")
    }

    fn state(&self) -> Option<Value> {
        self.history.state().ok().and_then(|state| from_js(&state))
    }

    fn length(&self) -> usize {
        self.history.length().map_or(0, |len| len as usize)
    }

    fn push_state(&self, state: Value, title: &str, url: &str) -> Result<(), Self::Error> {
        let state = to_js(&state)?;
        self.history
            .push_state_with_url(&state, title, Some(url))
            .map_err(js_error)
    }

    fn replace_state(
        &self,
        state: Value,
        title: &str,
        url: Option<&str>,
    ) -> Result<(), Self::Error> {
        let state = to_js(&state)?;
        self.history
            .replace_state_with_url(&state, title, url)
            .map_err(js_error)
    }

    fn go(&self, delta: i32) {
        if let Err(err) = self.history.go_with_delta(delta) {
            debug!(delta, error = %js_error(err), "history.go failed");
        }
    }

    fn assign(&self, url: &str) {
        if let Err(err) = self.window.location().assign(url) {
            debug!(url, error = %js_error(err), "location.assign failed");
        }
    }

    fn replace_location(&self, url: &str) {
        if let Err(err) = self.window.location().replace(url) {
            debug!(url, error = %js_error(err), "location.replace failed");
        }
    }
}

impl ScrollSource for BrowserHost {
    fn capture(&self) -> ScrollMarker {
        ScrollMarker::new(
            self.window.scroll_x().unwrap_or(0.0),
            self.window.scroll_y().unwrap_or(0.0),
        )
    }
}

impl HostEvents for BrowserHost {
    fn subscribe(&self, kind: NotificationKind, handler: NotificationHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let name = event_name(kind);
        let closure = EventClosure::new(move |event: web_sys::Event| {
            let notification = match kind {
                NotificationKind::PopState => HostNotification::PopState {
                    state: event
                        .dyn_ref::<web_sys::PopStateEvent>()
                        .and_then(|pop| from_js(&pop.state())),
                },
                NotificationKind::BeforeUnload => HostNotification::BeforeUnload,
            };
            handler(&notification);
        });
        if let Err(err) = self
            .window
            .add_event_listener_with_callback(name, closure.as_ref().unchecked_ref())
        {
            debug!(event = name, error = %js_error(err), "addEventListener failed");
        }
        self.listeners
            .borrow_mut()
            .push(Listener { id, name, closure });
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let mut listeners = self.listeners.borrow_mut();
        let Some(index) = listeners.iter().position(|listener| listener.id == id) else {
            return;
        };
        let listener = listeners.remove(index);
        if let Err(err) = self.window.remove_event_listener_with_callback(
            listener.name,
            listener.closure.as_ref().unchecked_ref(),
        ) {
            debug!(event = listener.name, error = %js_error(err), "removeEventListener failed");
        }
    }
}

impl Host for BrowserHost {
    type Error = WebHostError;
    type Session = Self;
    type Scroll = Self;
    type Events = Self;

    fn session(&self) -> &Self::Session {
        self
    }

    fn scroll(&self) -> &Self::Scroll {
        self
    }

    fn events(&self) -> &Self::Events {
        self
    }
}
