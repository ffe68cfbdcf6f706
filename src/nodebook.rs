//! Node identity cache
//!
//! Resolving a node to a display name means canonicalizing its identifier and
//! asking the node directory for a profile. Busy meshes repeat the same few
//! dozen nodes over and over, so resolved labels are kept in a bounded LRU
//! cache. Labels are handed out as `Arc<NodeLabel>`: repeated lookups of a
//! cached node return the very same allocation.

use crate::directory::{NodeDirectory, UserNames, user_names};
use crate::identifiers::{IdentifierError, NodeId, NodeLabel, to_node_num};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Default maximum number of cached labels.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub current_size: usize,
    pub max_size: usize,
    /// Percentage of lookups served from cache, 0 before any lookup.
    pub hit_rate: f64,
}

/// Bounded cache of resolved node labels backed by an optional directory
///
/// All state sits behind one mutex, so a book can be shared between the
/// packet callback and anything else that wants labels or stats.
pub struct NodeBook {
    directory: Option<Arc<dyn NodeDirectory>>,
    state: Mutex<BookState>,
}

impl NodeBook {
    /// Create a book with the given directory and capacity.
    ///
    /// A capacity of zero disables caching; every lookup is then a miss.
    pub fn new(directory: Option<Arc<dyn NodeDirectory>>, capacity: usize) -> Self {
        Self {
            directory,
            state: Mutex::new(BookState::new(capacity)),
        }
    }

    /// A book without a directory and with the default capacity
    pub fn with_defaults() -> Self {
        Self::new(None, DEFAULT_CACHE_CAPACITY)
    }

    pub fn directory(&self) -> Option<&dyn NodeDirectory> {
        self.directory.as_deref()
    }

    /// Resolve a node identifier to its label.
    ///
    /// Directory misses and directory failures only leave the names unset;
    /// the one error returned is an identifier that cannot be canonicalized.
    pub fn get<'a>(&self, node: impl Into<NodeId<'a>>) -> Result<Arc<NodeLabel>, IdentifierError> {
        let node_num = to_node_num(node)?.masked();
        let mut state = self.lock();

        if let Some(label) = state.lru.get(node_num) {
            state.hits += 1;
            return Ok(label);
        }

        state.misses += 1;
        let names = self.resolve_names(node_num);
        let label = Arc::new(NodeLabel::new(node_num, names.long_name, names.short_name));

        if state.lru.put(node_num, Arc::clone(&label)) {
            state.evictions += 1;
        }

        Ok(label)
    }

    pub fn cache_stats(&self) -> CacheStats {
        let state = self.lock();
        let lookups = state.hits + state.misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            state.hits as f64 / lookups as f64 * 100.0
        };

        CacheStats {
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            current_size: state.lru.len(),
            max_size: state.lru.capacity(),
            hit_rate,
        }
    }

    /// Drop every cached label and reset the counters
    pub fn clear(&self) {
        let mut state = self.lock();
        let capacity = state.lru.capacity();
        *state = BookState::new(capacity);
    }

    fn resolve_names(&self, node_num: u32) -> UserNames {
        let Some(directory) = self.directory.as_deref() else {
            return UserNames::default();
        };

        let user_id = crate::identifiers::to_user_id(u64::from(node_num));
        match directory.lookup(&user_id) {
            Ok(Some(record)) => user_names(&record),
            Ok(None) | Err(_) => UserNames::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BookState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for NodeBook {
    fn default() -> Self {
        Self::with_defaults()
    }
}

struct BookState {
    lru: LruCache,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl BookState {
    fn new(capacity: usize) -> Self {
        Self {
            lru: LruCache::new(capacity),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }
}

/// Hash index over an intrusive doubly linked list stored in a slab.
///
/// `head` is the most recently used slot and `tail` the least recently used;
/// lookups, inserts and evictions are all O(1).
struct LruCache {
    index: HashMap<u32, usize>,
    slots: Vec<Slot>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    capacity: usize,
}

struct Slot {
    key: u32,
    label: Arc<NodeLabel>,
    prev: Option<usize>,
    next: Option<usize>,
}

impl LruCache {
    fn new(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity.min(1024)),
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            capacity,
        }
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    /// Look up a key and mark it most recently used
    fn get(&mut self, key: u32) -> Option<Arc<NodeLabel>> {
        let slot = *self.index.get(&key)?;
        self.unlink(slot);
        self.push_front(slot);
        Some(Arc::clone(&self.slots[slot].label))
    }

    /// Insert a new key as most recently used, returning whether an entry
    /// had to be evicted to make room
    fn put(&mut self, key: u32, label: Arc<NodeLabel>) -> bool {
        if self.capacity == 0 {
            return false;
        }

        let mut evicted = false;
        if self.index.len() >= self.capacity {
            if let Some(lru) = self.tail {
                self.unlink(lru);
                self.index.remove(&self.slots[lru].key);
                self.free.push(lru);
                evicted = true;
            }
        }

        let slot = Slot {
            key,
            label,
            prev: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = slot;
                idx
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        };

        self.index.insert(key, idx);
        self.push_front(idx);
        evicted
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);

        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }

        self.slots[idx].prev = None;
        self.slots[idx].next = None;
    }

    fn push_front(&mut self, idx: usize) {
        self.slots[idx].prev = None;
        self.slots[idx].next = self.head;

        if let Some(h) = self.head {
            self.slots[h].prev = Some(idx);
        }
        self.head = Some(idx);

        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    #[cfg(test)]
    fn keys_mru_first(&self) -> Vec<u32> {
        let mut keys = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            keys.push(self.slots[idx].key);
            cursor = self.slots[idx].next;
        }
        keys
    }
}
