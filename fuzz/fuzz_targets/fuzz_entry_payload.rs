#![no_main]

use fhist_core::entry::{HistoryEntry, StateData};
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    // Cap length to keep fuzzing fast.
    if data.len() > 4096 {
        return;
    }
    let Ok(payload) = serde_json::from_slice::<Value>(data) else {
        return;
    };

    let cached = HistoryEntry::initial("/".to_owned(), 0);
    let merged = cached.overlay(&payload);

    // A parsed entry re-serializes to a payload that parses back to itself.
    if let Some(entry) = HistoryEntry::from_payload(&payload) {
        let again = HistoryEntry::from_payload(&entry.to_payload());
        assert_eq!(again.as_ref(), Some(&entry));
    }

    // Merging arbitrary caller data must never panic.
    if let Value::Object(fields) = payload {
        let mut entry = merged;
        let data: StateData = fields;
        entry.merge_data(&data);
        let _ = entry.to_payload();
    }
});
