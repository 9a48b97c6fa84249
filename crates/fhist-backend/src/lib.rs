#![forbid(unsafe_code)]
#![doc = "Host traits for fhist: session-history slots, scroll capture and host notifications."]
#![doc = ""]
#![doc = "This crate defines the boundary between the history state machine in"]
#![doc = "`fhist-runtime` and the environment that owns the real back/forward stack"]
#![doc = "(a browser via `fhist-web::browser`, or the deterministic host in `fhist-web`)."]

use std::rc::Rc;

use fhist_core::entry::ScrollMarker;
use fhist_core::location::RawLocation;
use serde_json::Value;

/// Host notifications the runtime subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// The user or the host traversed the stack (back/forward, `go`).
    PopState,
    /// The session is about to unload.
    BeforeUnload,
}

/// A notification as delivered to handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum HostNotification {
    /// Traversal finished; `state` is the payload stored in the new slot.
    PopState { state: Option<Value> },
    BeforeUnload,
}

impl HostNotification {
    #[must_use]
    pub const fn kind(&self) -> NotificationKind {
        match self {
            Self::PopState { .. } => NotificationKind::PopState,
            Self::BeforeUnload => NotificationKind::BeforeUnload,
        }
    }
}

/// Callback registered with [`HostEvents::subscribe`].
pub type NotificationHandler = Rc<dyn Fn(&HostNotification)>;

/// Opaque handle for removing a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// The host's native session-history stack.
///
/// All methods take `&self`; implementations use interior mutability so the
/// stack and the reconciler can share one host. Implementations must never
/// call notification handlers from inside these methods: traversal results
/// are delivered later through [`HostEvents`].
pub trait SessionHistory {
    /// Platform-specific error type.
    type Error: core::fmt::Debug + core::fmt::Display;

    /// Snapshot of the current document location.
    fn location(&self) -> RawLocation;

    /// `href` of the document's `<base>` element, if one is declared.
    fn base_href(&self) -> Option<String> {
        None
    }

    /// Payload stored in the current slot.
    fn state(&self) -> Option<Value>;

    /// Number of slots in the stack.
    fn length(&self) -> usize;

    /// Add a slot after the current one, discarding any forward slots.
    fn push_state(&self, state: Value, title: &str, url: &str) -> Result<(), Self::Error>;

    /// Overwrite the current slot. `url: None` keeps the current URL.
    fn replace_state(&self, state: Value, title: &str, url: Option<&str>)
    -> Result<(), Self::Error>;

    /// Traverse by `delta` slots. Completion is reported as a pop notification.
    fn go(&self, delta: i32);

    /// Hard navigation to `url`, adding a slot.
    fn assign(&self, url: &str);

    /// Hard navigation to `url`, replacing the current slot.
    fn replace_location(&self, url: &str);
}

/// Scroll capture.
pub trait ScrollSource {
    /// Current scroll offsets of the document.
    fn capture(&self) -> ScrollMarker;
}

/// Named global notifications.
pub trait HostEvents {
    /// Register `handler` for `kind`. Handlers run in registration order.
    fn subscribe(&self, kind: NotificationKind, handler: NotificationHandler) -> SubscriptionId;

    /// Remove a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Unified host combining the session stack, scroll capture and events.
///
/// The history runtime is generic over this trait.
pub trait Host {
    /// Platform-specific error type shared with the session stack.
    type Error: core::fmt::Debug + core::fmt::Display;

    /// Session stack implementation.
    type Session: SessionHistory<Error = Self::Error>;

    /// Scroll capture implementation.
    type Scroll: ScrollSource;

    /// Notification source implementation.
    type Events: HostEvents;

    fn session(&self) -> &Self::Session;

    fn scroll(&self) -> &Self::Scroll;

    fn events(&self) -> &Self::Events;
}
