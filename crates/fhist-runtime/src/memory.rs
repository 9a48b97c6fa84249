#![forbid(unsafe_code)]

//! In-process history with no host, for non-browser rendering and tests.

use std::cell::{Cell, RefCell};

use fhist_core::entry::StateData;
use fhist_core::event::{NavigationDirection, NavigationEvent, NavigationInfo, NavigationType};
use fhist_core::location::{self, HistoryLocation};

use crate::router_history::{ListenerRegistry, ListenerTeardown, NavigationCallback, RouterHistory};

/// Location of the initial slot.
const START: &str = "";

/// A router history that keeps its own stack.
///
/// Traversals are applied immediately and clamp to the ends of the stack.
#[derive(Debug)]
pub struct MemoryHistory {
    base: String,
    queue: RefCell<Vec<(HistoryLocation, StateData)>>,
    position: Cell<usize>,
    listeners: ListenerRegistry,
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MemoryHistory {
    #[must_use]
    pub fn new(base: Option<&str>) -> Self {
        Self {
            base: location::normalize_base(base, None),
            queue: RefCell::new(vec![(START.to_owned(), StateData::new())]),
            position: Cell::new(0),
            listeners: ListenerRegistry::new(),
        }
    }

    /// Index of the current slot.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position.get()
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn set_location(&self, to: &str, data: Option<&StateData>) {
        let next = self.position.get() + 1;
        let mut queue = self.queue.borrow_mut();
        queue.truncate(next);
        queue.push((to.to_owned(), data.cloned().unwrap_or_default()));
        self.position.set(next);
    }
}

impl RouterHistory for MemoryHistory {
    fn base(&self) -> &str {
        &self.base
    }

    fn location(&self) -> HistoryLocation {
        self.queue.borrow()[self.position.get()].0.clone()
    }

    fn state(&self) -> StateData {
        self.queue.borrow()[self.position.get()].1.clone()
    }

    fn push(&self, to: &str, data: Option<&StateData>) {
        self.set_location(to, data);
    }

    fn replace(&self, to: &str, data: Option<&StateData>) {
        let position = self.position.get();
        let mut queue = self.queue.borrow_mut();
        queue.truncate(position);
        queue.push((to.to_owned(), data.cloned().unwrap_or_default()));
    }

    fn go(&self, delta: i32, trigger_listeners: bool) {
        let from = self.location();
        let last = self.len().saturating_sub(1);
        let target = i64::try_from(self.position.get())
            .unwrap_or(i64::MAX)
            .saturating_add(i64::from(delta))
            .clamp(0, i64::try_from(last).unwrap_or(i64::MAX));
        self.position.set(usize::try_from(target).unwrap_or(last));
        if trigger_listeners {
            let info = NavigationInfo {
                delta: i64::from(delta),
                kind: NavigationType::Pop,
                direction: if delta < 0 {
                    NavigationDirection::Back
                } else {
                    NavigationDirection::Forward
                },
            };
            self.listeners.dispatch(&NavigationEvent {
                to: self.location(),
                from,
                info,
            });
        }
    }

    fn listen(&self, callback: NavigationCallback) -> ListenerTeardown {
        self.listeners.add(callback)
    }

    fn create_href(&self, location: &str) -> String {
        location::create_href(&self.base, location)
    }

    fn destroy(&self) {
        self.listeners.clear();
        *self.queue.borrow_mut() = vec![(START.to_owned(), StateData::new())];
        self.position.set(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::rc::Rc;

    fn recording(history: &MemoryHistory) -> Rc<RefCell<Vec<NavigationEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        history.listen(Rc::new(move |e: &NavigationEvent| sink.borrow_mut().push(e.clone())));
        events
    }

    #[test]
    fn starts_at_empty_location() {
        let history = MemoryHistory::default();
        assert_eq!(history.location(), "");
        assert!(history.state().is_empty());
        assert_eq!(history.base(), "");
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn push_truncates_forward_slots() {
        let history = MemoryHistory::new(None);
        history.push("/a", None);
        history.push("/b", None);
        history.go(-1, false);
        history.push("/c", None);
        assert_eq!(history.len(), 3);
        assert_eq!(history.location(), "/c");
        history.go(-1, false);
        assert_eq!(history.location(), "/a");
    }

    #[test]
    fn replace_swaps_current_slot() {
        let history = MemoryHistory::new(None);
        history.push("/a", None);
        let mut data = StateData::new();
        data.insert("k".into(), json!("v"));
        history.replace("/b", Some(&data));
        assert_eq!(history.len(), 2);
        assert_eq!(history.position(), 1);
        assert_eq!(history.location(), "/b");
        assert_eq!(history.state().get("k"), Some(&json!("v")));
    }

    #[test]
    fn replace_initial_slot() {
        let history = MemoryHistory::new(None);
        history.replace("/home", None);
        assert_eq!(history.len(), 1);
        assert_eq!(history.position(), 0);
        assert_eq!(history.location(), "/home");
    }

    #[test]
    fn go_clamps_and_reports_requested_delta() {
        let history = MemoryHistory::new(None);
        let events = recording(&history);
        history.push("/a", None);
        history.go(-5, true);
        assert_eq!(history.location(), "");
        history.go(0, true);

        let events = events.borrow();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].from, "/a");
        assert_eq!(events[0].to, "");
        assert_eq!(events[0].info.delta, -5);
        assert_eq!(events[0].info.direction, NavigationDirection::Back);
        assert_eq!(events[1].info.direction, NavigationDirection::Forward);
    }

    #[test]
    fn destroy_resets() {
        let history = MemoryHistory::new(Some("/base/"));
        let events = recording(&history);
        history.push("/a", None);
        history.destroy();
        assert_eq!(history.location(), "");
        assert_eq!(history.len(), 1);
        history.push("/b", None);
        history.go(-1, true);
        assert!(events.borrow().is_empty());
        assert_eq!(history.create_href("/x"), "/base/x");
    }
}
