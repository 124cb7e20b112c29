use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use super::{OutputSink, Slot};

/// How a [`SlotMap`] treats a write to a slot that already holds text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Concatenate, like appending text to a page element.
    #[default]
    Append,
    /// Overwrite the previous value.
    Replace,
}

// ---------------------------------------------------------------------------
// SlotMap
// ---------------------------------------------------------------------------

/// A fixed set of named text slots, e.g. the cells of a report page.
///
/// Slots must be declared up front; writes to undeclared slots are ignored
/// and [`OutputSink::has_slot`] reports them as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SlotMap {
    slots: BTreeMap<String, String>,
    #[serde(skip)]
    mode: WriteMode,
}

impl SlotMap {
    /// Declare exactly the slots written by [`super::render`], all empty.
    pub fn standard(mode: WriteMode) -> Self {
        Self::with_slots(Slot::all().map(Slot::id), mode)
    }

    pub fn with_slots<I, S>(slots: I, mode: WriteMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slots: slots.into_iter().map(|s| (s.into(), String::new())).collect(),
            mode,
        }
    }

    pub fn get(&self, slot: &str) -> Option<&str> {
        self.slots.get(slot).map(String::as_str)
    }

    /// Slots and their current text, sorted by slot id.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.slots.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl OutputSink for SlotMap {
    fn has_slot(&self, slot: &str) -> bool {
        self.slots.contains_key(slot)
    }

    fn append(&mut self, slot: &str, value: &str) {
        if let Some(text) = self.slots.get_mut(slot) {
            match self.mode {
                WriteMode::Append => text.push_str(value),
                WriteMode::Replace => {
                    text.clear();
                    text.push_str(value);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// AppendLog
// ---------------------------------------------------------------------------

/// Records every write in order. Accepts the standard slots only.
#[derive(Debug, Clone)]
pub struct AppendLog {
    accepted: HashSet<String>,
    entries: Vec<(String, String)>,
}

impl AppendLog {
    pub fn new() -> Self {
        Self {
            accepted: Slot::all().map(Slot::id).collect(),
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }
}

impl Default for AppendLog {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for AppendLog {
    fn has_slot(&self, slot: &str) -> bool {
        self.accepted.contains(slot)
    }

    fn append(&mut self, slot: &str, value: &str) {
        self.entries.push((slot.to_string(), value.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::SLOT_COUNT;

    #[test]
    fn standard_slot_map_declares_every_slot_empty() {
        let map = SlotMap::standard(WriteMode::Append);
        assert_eq!(map.len(), SLOT_COUNT);
        assert!(map.iter().all(|(_, v)| v.is_empty()));
        assert!(map.has_slot("standardDeviationOK"));
        assert!(!map.has_slot("standardDeviationXX"));
    }

    #[test]
    fn append_mode_concatenates() {
        let mut map = SlotMap::with_slots(["a"], WriteMode::Append);
        map.append("a", "1");
        map.append("a", "2");
        assert_eq!(map.get("a"), Some("12"));
    }

    #[test]
    fn replace_mode_overwrites() {
        let mut map = SlotMap::with_slots(["a"], WriteMode::Replace);
        map.append("a", "1");
        map.append("a", "2");
        assert_eq!(map.get("a"), Some("2"));
    }

    #[test]
    fn writes_to_undeclared_slots_are_dropped() {
        let mut map = SlotMap::with_slots(["a"], WriteMode::Append);
        map.append("b", "1");
        assert_eq!(map.get("b"), None);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn slot_map_serializes_as_object() {
        let mut map = SlotMap::with_slots(["numberOfRequests"], WriteMode::Replace);
        map.append("numberOfRequests", "42");
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"numberOfRequests":"42"}"#);
    }

    #[test]
    fn append_log_keeps_order_and_duplicates() {
        let mut log = AppendLog::new();
        log.append("minResponseTime", "0");
        log.append("numberOfRequests", "5");
        log.append("minResponseTime", "0");
        let slots: Vec<&str> = log.entries().iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(slots, vec!["minResponseTime", "numberOfRequests", "minResponseTime"]);
    }

    #[test]
    fn append_log_accepts_only_standard_slots() {
        let log = AppendLog::default();
        assert!(log.has_slot("percentiles2KO"));
        assert!(!log.has_slot("group1"));
    }
}
