//! Tag Store (spec §4.1): the single source of truth for all live
//! values, shared between the control thread and operator consoles.
//!
//! A single coarse lock around the map is sufficient given the tag
//! counts (a few hundred) and cycle periods (≥ 10 ms) this controller
//! runs at (spec §9) — no lock-free structure is warranted.

use lact_common::tag::{Quality, TagValue};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

#[derive(Debug, Clone)]
struct TagCell {
    value: TagValue,
    quality: Quality,
    timestamp: Instant,
}

/// Thread-safe flat tag namespace. Reads of an unregistered tag return
/// `TagValue::Null` rather than failing; writes always succeed and
/// create the tag if it doesn't exist yet.
pub struct TagStore {
    cells: Mutex<HashMap<String, TagCell>>,
}

impl TagStore {
    pub fn new() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }

    pub fn read(&self, tag: &str) -> TagValue {
        let cells = self.cells.lock().expect("tag store lock poisoned");
        cells
            .get(tag)
            .map(|c| c.value.clone())
            .unwrap_or(TagValue::Null)
    }

    pub fn read_full(&self, tag: &str) -> Option<(TagValue, Quality, Instant)> {
        let cells = self.cells.lock().expect("tag store lock poisoned");
        cells.get(tag).map(|c| (c.value.clone(), c.quality, c.timestamp))
    }

    pub fn quality(&self, tag: &str) -> Quality {
        let cells = self.cells.lock().expect("tag store lock poisoned");
        cells.get(tag).map(|c| c.quality).unwrap_or(Quality::Uncertain)
    }

    pub fn write(&self, tag: &str, value: impl Into<TagValue>, quality: Quality) {
        let mut cells = self.cells.lock().expect("tag store lock poisoned");
        cells.insert(
            tag.to_string(),
            TagCell {
                value: value.into(),
                quality,
                timestamp: Instant::now(),
            },
        );
    }

    pub fn write_good(&self, tag: &str, value: impl Into<TagValue>) {
        self.write(tag, value, Quality::Good);
    }

    pub fn read_many(&self, tags: &[&str]) -> HashMap<String, TagValue> {
        let cells = self.cells.lock().expect("tag store lock poisoned");
        tags.iter()
            .map(|&t| {
                let v = cells.get(t).map(|c| c.value.clone()).unwrap_or(TagValue::Null);
                (t.to_string(), v)
            })
            .collect()
    }

    /// Atomic with respect to other store operations: the whole batch
    /// is applied while holding the single lock.
    pub fn write_many(&self, values: &[(&str, TagValue)], quality: Quality) {
        let mut cells = self.cells.lock().expect("tag store lock poisoned");
        let now = Instant::now();
        for (tag, value) in values {
            cells.insert(
                tag.to_string(),
                TagCell {
                    value: value.clone(),
                    quality,
                    timestamp: now,
                },
            );
        }
    }

    /// A consistent view of every registered tag: no torn multi-tag
    /// write is observable since the whole map is read under one lock.
    pub fn snapshot(&self) -> HashMap<String, (TagValue, Quality, Instant)> {
        let cells = self.cells.lock().expect("tag store lock poisoned");
        cells
            .iter()
            .map(|(k, c)| (k.clone(), (c.value.clone(), c.quality, c.timestamp)))
            .collect()
    }

    pub fn tag_exists(&self, tag: &str) -> bool {
        let cells = self.cells.lock().expect("tag store lock poisoned");
        cells.contains_key(tag)
    }
}

impl Default for TagStore {
    fn default() -> Self {
        Self::new()
    }
}
