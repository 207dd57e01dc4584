//! Bounded in-memory buffer of received entries

use crate::viewer::filter::Filter;
use std::collections::VecDeque;
use wirepeek_common::EntryEvent;

/// An entry as held by the viewer
#[derive(Debug, Clone)]
pub struct StoredEntry {
    /// Viewer-local id, increasing in arrival order
    pub id: u64,
    pub event: EntryEvent,
    /// Lowercased summary and serialized data used by the text filter
    search: String,
}

impl StoredEntry {
    pub fn new(id: u64, event: EntryEvent) -> Self {
        let data = serde_json::to_string(&event.data).unwrap_or_default();
        let search = format!("{} {}", event.message, data).to_lowercase();
        Self { id, event, search }
    }

    pub fn search_text(&self) -> &str {
        &self.search
    }
}

/// Ring buffer of entries with an optional active (highlighted) entry
///
/// The capacity bounds stored entries, not visible ones.
#[derive(Debug)]
pub struct MessageStream {
    entries: VecDeque<StoredEntry>,
    capacity: usize,
    next_id: u64,
    active: Option<u64>,
}

impl MessageStream {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 0,
            active: None,
        }
    }

    /// Append an entry, evicting the oldest stored entry when full
    ///
    /// Returns the new entry's id.
    pub fn push(&mut self, event: EntryEvent) -> u64 {
        if self.entries.len() >= self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                if self.active == Some(evicted.id) {
                    self.active = None;
                }
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        self.entries.push_back(StoredEntry::new(id, event));
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, id: u64) -> Option<&StoredEntry> {
        // Ids are contiguous, so the offset from the oldest id is the index
        let first = self.entries.front()?.id;
        let index = usize::try_from(id.checked_sub(first)?).ok()?;
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoredEntry> {
        self.entries.iter()
    }

    /// Entries shown under `filter`, oldest first
    pub fn visible<'a>(&'a self, filter: &'a Filter) -> impl Iterator<Item = &'a StoredEntry> + 'a {
        self.entries.iter().filter(move |entry| filter.matches(entry))
    }

    pub fn active(&self) -> Option<u64> {
        self.active
    }

    pub fn active_entry(&self) -> Option<&StoredEntry> {
        self.active.and_then(|id| self.get(id))
    }

    /// Mark an entry active; ids no longer stored are ignored
    pub fn set_active(&mut self, id: Option<u64>) {
        self.active = id.filter(|id| self.get(*id).is_some());
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::filter::KindFilter;
    use chrono::Utc;
    use wirepeek_common::{CaptureEntry, Direction, FramePayload, HeaderBag, PushMessage};

    fn request(n: usize) -> EntryEvent {
        let entry = CaptureEntry::request("GET", format!("/item/{}", n), HeaderBag::new(), None, Utc::now());
        PushMessage::entry(entry).into_entry().unwrap()
    }

    fn frame(n: usize) -> EntryEvent {
        let entry = CaptureEntry::websocket(
            Direction::ServerToClient,
            &FramePayload::Text(format!("tick {}", n)),
            false,
            Utc::now(),
        );
        PushMessage::entry(entry).into_entry().unwrap()
    }

    #[test]
    fn test_eviction_is_oldest_first_regardless_of_filter() {
        let mut stream = MessageStream::new(200);
        let ws_only = Filter::new(KindFilter::Websocket, "", vec![]);

        for n in 0..250 {
            if n % 2 == 0 {
                stream.push(request(n));
            } else {
                stream.push(frame(n));
            }
        }

        assert_eq!(stream.len(), 200);
        let ids: Vec<u64> = stream.iter().map(|e| e.id).collect();
        assert_eq!(ids.first(), Some(&50));
        assert_eq!(ids.last(), Some(&249));

        // Switching filters only changes visibility
        assert_eq!(stream.visible(&ws_only).count(), 100);
        assert_eq!(stream.visible(&Filter::default()).count(), 200);
        assert_eq!(stream.iter().next().unwrap().id, 50);
    }

    #[test]
    fn test_eviction_clears_active_entry() {
        let mut stream = MessageStream::new(2);
        let first = stream.push(request(0));
        stream.set_active(Some(first));
        assert_eq!(stream.active(), Some(first));

        stream.push(request(1));
        assert_eq!(stream.active(), Some(first));

        stream.push(request(2));
        assert_eq!(stream.active(), None);
        assert!(stream.get(first).is_none());
    }

    #[test]
    fn test_get_and_set_active() {
        let mut stream = MessageStream::new(3);
        for n in 0..5 {
            stream.push(request(n));
        }
        assert!(stream.get(1).is_none());
        assert_eq!(stream.get(3).unwrap().event.message, "Request: GET /item/3");

        stream.set_active(Some(0));
        assert_eq!(stream.active(), None);
        stream.set_active(Some(4));
        assert_eq!(stream.active_entry().unwrap().id, 4);

        stream.clear();
        assert!(stream.is_empty());
        assert_eq!(stream.active(), None);
    }
}
