#![forbid(unsafe_code)]

//! The payload stored in each host session-history slot.
//!
//! # Schema
//!
//! ```json
//! {
//!   "back": "/foo" | null,
//!   "current": "/bar",
//!   "forward": "/baz" | null,
//!   "position": 3,
//!   "replaced": false,
//!   "scroll": { "left": 0, "top": 120 } | null | false,
//!   "...": "caller fields"
//! }
//! ```
//!
//! `position` is a snapshot of the host stack length when the entry was
//! written. Only differences between two positions carry meaning.
//!
//! # Merge precedence
//!
//! Two merges exist and both go through the same typed field dispatch:
//!
//! - [`HistoryEntry::overlay`]: the host's stored payload over the cached
//!   entry. Fields the host defines win; the cache fills gaps. A host field
//!   with the wrong type is ignored.
//! - [`HistoryEntry::merge_data`]: caller data over a freshly built entry.
//!   Caller fields win, including known fields.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::location::HistoryLocation;

/// Free-form caller data merged into an entry.
pub type StateData = Map<String, Value>;

/// Keys with a typed field on [`HistoryEntry`].
pub const KNOWN_FIELDS: [&str; 6] = ["back", "current", "forward", "position", "replaced", "scroll"];

/// Captured scroll offsets, produced and consumed by the scroll collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollMarker {
    pub left: f64,
    pub top: f64,
}

impl ScrollMarker {
    #[must_use]
    pub const fn new(left: f64, top: f64) -> Self {
        Self { left, top }
    }
}

/// Scroll state recorded on an entry.
///
/// `Unset` lets the scroll collaborator apply its default (anchor) behavior;
/// `Disabled` records that capture was intentionally skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum ScrollSlot {
    #[default]
    Unset,
    Disabled,
    Captured(ScrollMarker),
}

impl ScrollSlot {
    /// The captured marker, if any.
    #[must_use]
    pub const fn marker(&self) -> Option<ScrollMarker> {
        match self {
            Self::Captured(marker) => Some(*marker),
            _ => None,
        }
    }

    /// JSON form stored in the payload.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Unset => Value::Null,
            Self::Disabled => Value::Bool(false),
            Self::Captured(marker) => {
                let mut map = Map::new();
                map.insert("left".into(), Value::from(marker.left));
                map.insert("top".into(), Value::from(marker.top));
                Value::Object(map)
            }
        }
    }
}

impl Serialize for ScrollSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unset => serializer.serialize_none(),
            Self::Disabled => serializer.serialize_bool(false),
            Self::Captured(marker) => marker.serialize(serializer),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScrollRepr {
    Flag(bool),
    Marker(ScrollMarker),
}

impl<'de> Deserialize<'de> for ScrollSlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<ScrollRepr>::deserialize(deserializer)? {
            None | Some(ScrollRepr::Flag(true)) => Self::Unset,
            Some(ScrollRepr::Flag(false)) => Self::Disabled,
            Some(ScrollRepr::Marker(marker)) => Self::Captured(marker),
        })
    }
}

/// One host-stack slot's payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub back: Option<HistoryLocation>,
    pub current: HistoryLocation,
    pub forward: Option<HistoryLocation>,
    pub position: i64,
    #[serde(default)]
    pub replaced: bool,
    #[serde(default)]
    pub scroll: ScrollSlot,
    /// Caller fields carried alongside the known ones.
    #[serde(flatten)]
    pub extra: StateData,
}

impl HistoryEntry {
    /// Build an entry with no caller fields.
    #[must_use]
    pub fn new(
        back: Option<HistoryLocation>,
        current: HistoryLocation,
        forward: Option<HistoryLocation>,
        position: i64,
        replaced: bool,
        scroll: ScrollSlot,
    ) -> Self {
        Self {
            back,
            current,
            forward,
            position,
            replaced,
            scroll,
            extra: StateData::new(),
        }
    }

    /// Entry synthesized for a slot the host holds no payload for.
    #[must_use]
    pub fn initial(current: HistoryLocation, position: i64) -> Self {
        Self::new(None, current, None, position, true, ScrollSlot::Unset)
    }

    /// Parse a complete entry out of a host payload.
    #[must_use]
    pub fn from_payload(payload: &Value) -> Option<Self> {
        if !payload.is_object() {
            return None;
        }
        serde_json::from_value(payload.clone()).ok()
    }

    /// Flatten into the object stored in the host slot.
    #[must_use]
    pub fn to_state_data(&self) -> StateData {
        let mut map = self.extra.clone();
        map.insert("back".into(), opt_string(&self.back));
        map.insert("current".into(), Value::String(self.current.clone()));
        map.insert("forward".into(), opt_string(&self.forward));
        map.insert("position".into(), Value::from(self.position));
        map.insert("replaced".into(), Value::Bool(self.replaced));
        map.insert("scroll".into(), self.scroll.to_value());
        map
    }

    /// [`Self::to_state_data`] as a JSON value.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        Value::Object(self.to_state_data())
    }

    /// Lay the host's stored payload over this entry.
    ///
    /// Non-object payloads leave the entry untouched.
    #[must_use]
    pub fn overlay(&self, reported: &Value) -> Self {
        let mut merged = self.clone();
        if let Some(fields) = reported.as_object() {
            for (key, value) in fields {
                merged.apply_field(key, value);
            }
        }
        merged
    }

    /// Copy unknown fields of a host payload into `extra`, keeping fields
    /// this entry already carries.
    pub fn absorb_extras(&mut self, payload: &Value) {
        let Some(fields) = payload.as_object() else {
            return;
        };
        for (key, value) in fields {
            if !KNOWN_FIELDS.contains(&key.as_str()) && !self.extra.contains_key(key) {
                self.extra.insert(key.clone(), value.clone());
            }
        }
    }

    /// Merge caller data into this entry; caller fields win.
    pub fn merge_data(&mut self, data: &StateData) {
        for (key, value) in data {
            self.apply_field(key, value);
        }
    }

    /// Set one field from JSON. Returns `false` when a known field was given
    /// a value of the wrong type (the field is left as is).
    pub fn apply_field(&mut self, key: &str, value: &Value) -> bool {
        match key {
            "back" => assign(&mut self.back, value),
            "current" => assign(&mut self.current, value),
            "forward" => assign(&mut self.forward, value),
            "position" => assign(&mut self.position, value),
            "replaced" => assign(&mut self.replaced, value),
            "scroll" => assign(&mut self.scroll, value),
            _ => {
                self.extra.insert(key.to_owned(), value.clone());
                true
            }
        }
    }
}

fn assign<T: for<'de> Deserialize<'de>>(slot: &mut T, value: &Value) -> bool {
    match T::deserialize(value) {
        Ok(parsed) => {
            *slot = parsed;
            true
        }
        Err(_) => false,
    }
}

fn opt_string(value: &Option<String>) -> Value {
    value.clone().map_or(Value::Null, Value::String)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> HistoryEntry {
        HistoryEntry::new(
            Some("/a".into()),
            "/b".into(),
            None,
            4,
            false,
            ScrollSlot::Captured(ScrollMarker::new(0.0, 120.0)),
        )
    }

    #[test]
    fn initial_entry_shape() {
        let entry = HistoryEntry::initial("/foo".into(), 0);
        assert_eq!(entry.back, None);
        assert_eq!(entry.forward, None);
        assert!(entry.replaced);
        assert_eq!(entry.scroll, ScrollSlot::Unset);
    }

    #[test]
    fn payload_has_expected_schema() {
        let mut entry = sample();
        entry.extra.insert("tab".into(), json!("settings"));
        assert_eq!(
            entry.to_payload(),
            json!({
                "back": "/a",
                "current": "/b",
                "forward": null,
                "position": 4,
                "replaced": false,
                "scroll": { "left": 0.0, "top": 120.0 },
                "tab": "settings",
            })
        );
    }

    #[test]
    fn payload_round_trips_through_serde() {
        let mut entry = sample();
        entry.scroll = ScrollSlot::Disabled;
        entry.extra.insert("n".into(), json!(1));
        let payload = entry.to_payload();
        assert_eq!(HistoryEntry::from_payload(&payload), Some(entry.clone()));
        assert_eq!(serde_json::to_value(&entry).ok(), Some(payload));
    }

    #[test]
    fn from_payload_rejects_non_objects_and_partial_entries() {
        assert_eq!(HistoryEntry::from_payload(&json!(null)), None);
        assert_eq!(HistoryEntry::from_payload(&json!("state")), None);
        assert_eq!(HistoryEntry::from_payload(&json!({ "foo": 1 })), None);
    }

    #[test]
    fn from_payload_defaults_optional_fields() {
        let entry = HistoryEntry::from_payload(&json!({ "current": "/x", "position": 2 }));
        let entry = entry.expect("minimal entry parses");
        assert_eq!(entry.back, None);
        assert!(!entry.replaced);
        assert_eq!(entry.scroll, ScrollSlot::Unset);
    }

    #[test]
    fn scroll_true_reads_as_unset() {
        let entry = HistoryEntry::from_payload(&json!({
            "current": "/x", "position": 0, "scroll": true
        }))
        .expect("entry parses");
        assert_eq!(entry.scroll, ScrollSlot::Unset);
    }

    #[test]
    fn overlay_prefers_reported_fields() {
        let cached = sample();
        let merged = cached.overlay(&json!({ "position": 9, "custom": [1, 2] }));
        assert_eq!(merged.position, 9);
        assert_eq!(merged.current, "/b");
        assert_eq!(merged.back.as_deref(), Some("/a"));
        assert_eq!(merged.extra.get("custom"), Some(&json!([1, 2])));
    }

    #[test]
    fn overlay_ignores_mistyped_fields_and_non_objects() {
        let cached = sample();
        assert_eq!(cached.overlay(&json!({ "position": "nine" })), cached);
        assert_eq!(cached.overlay(&json!(42)), cached);
    }

    #[test]
    fn merge_data_lets_caller_override() {
        let mut entry = sample();
        let mut data = StateData::new();
        data.insert("replaced".into(), json!(true));
        data.insert("from".into(), json!("menu"));
        entry.merge_data(&data);
        assert!(entry.replaced);
        assert_eq!(entry.extra.get("from"), Some(&json!("menu")));
    }

    #[test]
    fn absorb_extras_skips_known_and_existing_fields() {
        let mut entry = sample();
        entry.extra.insert("keep".into(), json!("mine"));
        entry.absorb_extras(&json!({
            "current": "/elsewhere",
            "keep": "theirs",
            "added": 1,
        }));
        assert_eq!(entry.current, "/b");
        assert_eq!(entry.extra.get("keep"), Some(&json!("mine")));
        assert_eq!(entry.extra.get("added"), Some(&json!(1)));
    }

    #[test]
    fn apply_field_reports_type_mismatch() {
        let mut entry = sample();
        assert!(!entry.apply_field("back", &json!(5)));
        assert_eq!(entry.back.as_deref(), Some("/a"));
        assert!(entry.apply_field("back", &json!(null)));
        assert_eq!(entry.back, None);
    }
}
