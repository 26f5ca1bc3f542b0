//! Decoded-resource lifetime management: reference-counted locking plus a
//! memory-bounded LRU queue.
//!
//! A record's buffer exists exactly while its status is `Allocated`,
//! `Enqueued`, or `Locked`. Enqueued records form the LRU queue, most
//! recent first, and `memory_lru` always equals the sum of their sizes.
//! Locked records are never queue members, so eviction cannot touch them.

use std::collections::{BTreeMap, VecDeque};

use crate::{ids::ResourceId, source::SourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    /// No decoded buffer.
    NoMalloc,
    /// Decoded, not yet queued or locked.
    Allocated,
    /// Member of the LRU queue, eligible for eviction.
    Enqueued,
    /// Pinned by one or more lockers.
    Locked,
}

/// One catalog entry and, when loaded, its decoded bytes.
#[derive(Debug)]
pub(crate) struct Record {
    pub id: ResourceId,
    pub status: Status,
    pub data: Option<Vec<u8>>,
    /// Declared decoded size; meaningful once known from the container.
    pub size: usize,
    pub file_offset: u32,
    /// Bytes of patch-file header between the two-byte prefix and the data.
    pub header_size: u8,
    pub source: SourceId,
    pub lockers: u32,
}

impl Record {
    pub(crate) fn new(id: ResourceId, source: SourceId, file_offset: u32) -> Record {
        Record {
            id,
            status: Status::NoMalloc,
            data: None,
            size: 0,
            file_offset,
            header_size: 0,
            source,
            lockers: 0,
        }
    }

    /// Drops the decoded buffer and returns the record to `NoMalloc`.
    pub(crate) fn unalloc(&mut self) {
        self.data = None;
        self.status = Status::NoMalloc;
    }
}

#[derive(Debug)]
pub(crate) struct LruCache {
    /// Front is most recently used.
    queue: VecDeque<ResourceId>,
    memory_lru: usize,
    memory_locked: usize,
    max_memory: usize,
}

impl LruCache {
    pub(crate) fn new(max_memory: usize) -> LruCache {
        LruCache {
            queue: VecDeque::new(),
            memory_lru: 0,
            memory_locked: 0,
            max_memory,
        }
    }

    pub(crate) fn memory_lru(&self) -> usize {
        self.memory_lru
    }

    pub(crate) fn memory_locked(&self) -> usize {
        self.memory_locked
    }

    pub(crate) fn max_memory(&self) -> usize {
        self.max_memory
    }

    pub(crate) fn contains(&self, id: ResourceId) -> bool {
        self.queue.contains(&id)
    }

    pub(crate) fn enqueue(&mut self, record: &mut Record) {
        if record.status != Status::Allocated {
            log::warn!(
                "Trying to enqueue resource {} with state {:?}",
                record.id,
                record.status
            );
            return;
        }
        self.queue.push_front(record.id);
        self.memory_lru += record.size;
        log::debug!(
            "Adding {} ({} bytes) to lru control: {} bytes total",
            record.id,
            record.size,
            self.memory_lru
        );
        record.status = Status::Enqueued;
    }

    pub(crate) fn remove(&mut self, record: &mut Record) {
        if record.status != Status::Enqueued {
            log::warn!("Trying to remove resource {} that isn't enqueued", record.id);
            return;
        }
        if let Some(pos) = self.queue.iter().position(|id| *id == record.id) {
            self.queue.remove(pos);
        }
        self.memory_lru -= record.size;
        record.status = Status::Allocated;
    }

    pub(crate) fn note_locked(&mut self, size: usize) {
        self.memory_locked += size;
    }

    pub(crate) fn note_unlocked(&mut self, size: usize) {
        self.memory_locked -= size;
    }

    /// Frees queue tails until the budget is met.
    ///
    /// A load-triggered sweep (`keep_last`) never frees the sole remaining
    /// entry; an unlock-triggered sweep may empty the queue entirely.
    pub(crate) fn evict_over_budget(
        &mut self,
        records: &mut BTreeMap<ResourceId, Record>,
        keep_last: bool,
    ) {
        while self.memory_lru > self.max_memory {
            if self.queue.is_empty() {
                debug_assert!(false, "memory_lru nonzero with an empty LRU queue");
                break;
            }
            if keep_last && self.queue.len() == 1 {
                break;
            }
            let id = self.queue.pop_back().expect("queue checked non-empty");
            let record = records.get_mut(&id).expect("enqueued record must exist");
            log::debug!("LRU: freeing {} ({} bytes)", record.id, record.size);
            self.memory_lru -= record.size;
            record.unalloc();
        }
    }
}
