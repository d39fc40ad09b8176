//! Process-identity cache
//!
//! Remembers, per pid, the uuid of the process's Subject record and of its
//! most recent execute event. Bounded: once full, the least recently touched
//! pid is evicted. A reused pid simply overwrites the older process's entry.

use std::num::NonZeroUsize;
use lru::LruCache;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessInfo {
    pub subject: Option<Uuid>,
    pub exec_event: Option<Uuid>,
}

#[derive(Debug)]
pub struct ProcessCache {
    entries: LruCache<i32, ProcessInfo>,
}

impl ProcessCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub fn put_subject(&mut self, pid: i32, subject: Uuid) {
        self.touch(pid).subject = Some(subject);
    }

    pub fn put_exec_event(&mut self, pid: i32, event: Uuid) {
        self.touch(pid).exec_event = Some(event);
    }

    pub fn subject(&mut self, pid: i32) -> Option<Uuid> {
        self.entries.get(&pid)?.subject
    }

    pub fn exec_event(&mut self, pid: i32) -> Option<Uuid> {
        self.entries.get(&pid)?.exec_event
    }

    /// Look without refreshing recency
    pub fn peek(&self, pid: i32) -> Option<&ProcessInfo> {
        self.entries.peek(&pid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Mark `pid` as most recently used, creating (and evicting for) it if
    /// needed.
    fn touch(&mut self, pid: i32) -> &mut ProcessInfo {
        if !self.entries.contains(&pid) && self.entries.len() >= self.capacity() {
            if let Some((victim, _)) = self.entries.pop_lru() {
                tracing::debug!("Process cache full, evicted pid {}", victim);
            }
        }
        self.entries.get_or_insert_mut(pid, ProcessInfo::default)
    }
}
