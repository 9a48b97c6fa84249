#![forbid(unsafe_code)]

//! The push/replace protocol against the host stack.
//!
//! [`HistoryStack`] owns the two shared cells every other component reads:
//! the current logical location and the current [`HistoryEntry`]. The cache
//! mirrors the host's current slot except between a write call and its
//! completion.
//!
//! # Push is two writes
//!
//! ```text
//!   host slots     [ .. | /foo ]                  before push("/bar")
//!   1. replace     [ .. | /foo forward=/bar scroll=captured ]
//!   2. push        [ .. | /foo ... | /bar back=/foo position=p+1 ]
//! ```
//!
//! A single push cannot patch the slot it leaves behind, and that slot must
//! carry the scroll position for when the user comes back to it. Step 2 is
//! skipped when step 1 fell back to a hard navigation.
//!
//! # Write failures
//!
//! Hosts may reject rapid history writes. A rejected write is logged and
//! turned into `location.assign`/`location.replace` on the same URL, which
//! also resets the host's rate counters. Nothing is propagated to callers.

use std::rc::Rc;

use fhist_backend::{Host, ScrollSource, SessionHistory};
use fhist_core::entry::{HistoryEntry, ScrollSlot, StateData};
use fhist_core::location::{HistoryLocation, decode_location, encode_url};
use serde_json::Value;
use tracing::{debug, debug_span, warn};

use crate::value_cell::ValueCell;

/// Result of one host write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum WriteOutcome {
    /// The host stored the entry and the cache was updated.
    Committed,
    /// The host rejected the write; a hard navigation was issued instead.
    FellBack,
}

/// Push/replace protocol plus the shared location/entry cells.
pub struct HistoryStack<H: Host> {
    host: Rc<H>,
    base: String,
    location: ValueCell<HistoryLocation>,
    entry: ValueCell<HistoryEntry>,
    warn_on_foreign_state: bool,
}

impl<H: Host> std::fmt::Debug for HistoryStack<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStack")
            .field("base", &self.base)
            .field("location", &self.location)
            .field("entry", &self.entry)
            .finish_non_exhaustive()
    }
}

impl<H: Host> HistoryStack<H> {
    /// Attach to `host` under an already normalized `base`.
    ///
    /// When the host's current slot carries no payload, an initial entry is
    /// synthesized and written in place.
    pub fn new(host: Rc<H>, base: String, warn_on_foreign_state: bool) -> Self {
        let session = host.session();
        let location = decode_location(&base, &session.location());
        let position = i64::try_from(session.length()).unwrap_or(i64::MAX) - 1;
        let synthesized = HistoryEntry::initial(location.clone(), position);
        let stored = session.state().filter(Value::is_object);

        let entry = match &stored {
            Some(payload) => HistoryEntry::from_payload(payload)
                .unwrap_or_else(|| synthesized.overlay(payload)),
            None => synthesized.clone(),
        };
        let stack = Self {
            host,
            base,
            location: ValueCell::new(location.clone()),
            entry: ValueCell::new(entry),
            warn_on_foreign_state,
        };
        if stored.is_none() {
            debug!(%location, position, "no stored entry; writing initial entry");
            let _ = stack.write(&location, synthesized, true);
        }
        stack
    }

    #[must_use]
    pub fn host(&self) -> &Rc<H> {
        &self.host
    }

    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Shared handle to the current-location cell.
    #[must_use]
    pub fn location_cell(&self) -> &ValueCell<HistoryLocation> {
        &self.location
    }

    /// Shared handle to the current-entry cell.
    #[must_use]
    pub fn entry_cell(&self) -> &ValueCell<HistoryEntry> {
        &self.entry
    }

    /// Decode the host's current location under this stack's base.
    #[must_use]
    pub fn host_location(&self) -> HistoryLocation {
        decode_location(&self.base, &self.host.session().location())
    }

    /// Capture the host's scroll position.
    #[must_use]
    pub fn capture_scroll(&self) -> ScrollSlot {
        ScrollSlot::Captured(self.host.scroll().capture())
    }

    /// Build a fresh entry positioned at the host's current stack length.
    ///
    /// The length is a snapshot and can be one off from the logical depth;
    /// callers that know better overwrite `position`.
    #[must_use]
    pub fn build_entry(
        &self,
        back: Option<HistoryLocation>,
        current: HistoryLocation,
        forward: Option<HistoryLocation>,
        replaced: bool,
        capture_scroll: bool,
    ) -> HistoryEntry {
        let position = i64::try_from(self.host.session().length()).unwrap_or(i64::MAX);
        let scroll = if capture_scroll {
            self.capture_scroll()
        } else {
            ScrollSlot::Unset
        };
        HistoryEntry::new(back, current, forward, position, replaced, scroll)
    }

    /// Write `entry` for `to` into the host stack.
    pub fn write(&self, to: &str, entry: HistoryEntry, replace: bool) -> WriteOutcome {
        let session = self.host.session();
        let url = encode_url(
            &self.base,
            to,
            &session.location(),
            session.base_href().is_some(),
        );
        let payload = entry.to_payload();
        let result = if replace {
            session.replace_state(payload, "", Some(&url))
        } else {
            session.push_state(payload, "", &url)
        };
        match result {
            Ok(()) => {
                self.entry.set(entry);
                WriteOutcome::Committed
            }
            Err(err) => {
                warn!(%url, replace, error = %err, "history write failed; forcing navigation");
                if replace {
                    session.replace_location(&url);
                } else {
                    session.assign(&url);
                }
                WriteOutcome::FellBack
            }
        }
    }

    /// Overwrite the current slot with `to`, keeping its neighbours and position.
    pub fn replace(&self, to: &str, data: Option<&StateData>) {
        let _span = debug_span!("fhist.replace", to).entered();
        let current = self.entry.get();
        let mut entry = self.build_entry(current.back, to.to_owned(), current.forward, true, false);
        if let Some(live) = self.host.session().state() {
            entry.absorb_extras(&live);
        }
        if let Some(data) = data {
            entry.merge_data(data);
        }
        entry.position = current.position;
        let _ = self.write(to, entry, true);
        self.location.set(to.to_owned());
    }

    /// Navigate to `to`, patching the outgoing slot first.
    pub fn push(&self, to: &str, data: Option<&StateData>) {
        let _span = debug_span!("fhist.push", to).entered();
        let live = self.host.session().state().filter(Value::is_object);
        if live.is_none() && self.warn_on_foreign_state {
            warn!(
                "history state was replaced without preserving the router entry; \
                 call replace_state with the current state merged in"
            );
        }

        let mut outgoing = self.entry.get();
        if let Some(live) = &live {
            outgoing = outgoing.overlay(live);
        }
        outgoing.forward = Some(to.to_owned());
        outgoing.scroll = self.capture_scroll();
        let outgoing_location = outgoing.current.clone();
        let outgoing_position = outgoing.position;
        if self.write(&outgoing_location, outgoing, true) == WriteOutcome::FellBack {
            return;
        }

        let mut entry = self.build_entry(
            Some(self.location.get()),
            to.to_owned(),
            None,
            false,
            false,
        );
        entry.position = outgoing_position.saturating_add(1);
        if let Some(data) = data {
            entry.merge_data(data);
        }
        let _ = self.write(to, entry, false);
        self.location.set(to.to_owned());
    }
}
