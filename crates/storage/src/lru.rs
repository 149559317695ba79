//! Byte-budgeted LRU tracking for the cache tier.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// In-memory LRU recency tracker with a byte budget.
///
/// The policy only reports eviction intent; the tiered client is responsible
/// for issuing the actual deletes against the cache backend. All operations
/// are O(key count) worst case and never perform I/O, so the single mutex is
/// held only briefly.
pub struct LruPolicy {
    inner: Mutex<LruInner>,
}

struct LruInner {
    max_size_bytes: i64,
    current_size: i64,
    /// Tracked entry sizes by key.
    sizes: HashMap<String, i64>,
    /// Keys ordered by recency, front = most recently used.
    order: VecDeque<String>,
}

impl LruPolicy {
    /// Create a policy with the given byte budget.
    ///
    /// A budget of zero or less disables eviction: entries are still tracked
    /// but `on_add` never reports victims.
    pub fn new(max_size_bytes: i64) -> Self {
        Self {
            inner: Mutex::new(LruInner {
                max_size_bytes,
                current_size: 0,
                sizes: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Record a cache hit, moving the key to the front of the recency list.
    /// No-op for untracked keys.
    pub fn on_access(&self, key: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.sizes.contains_key(key) {
            inner.move_to_front(key);
        }
    }

    /// Record a successful cache write of `size` bytes under `key`.
    ///
    /// Returns the keys that must now be evicted from the cache backend to
    /// stay within budget. A key that is already tracked is treated as an
    /// access: its originally recorded size is kept and nothing is evicted.
    pub fn on_add(&self, key: &str, size: i64) -> Vec<String> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if inner.sizes.contains_key(key) {
            inner.move_to_front(key);
            return Vec::new();
        }

        inner.order.push_front(key.to_string());
        inner.sizes.insert(key.to_string(), size);
        inner.current_size += size;

        inner.evict_if_needed()
    }

    /// Stop tracking `key`, subtracting its size. No-op for untracked keys.
    pub fn on_remove(&self, key: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(size) = inner.sizes.remove(key) {
            inner.current_size -= size;
            inner.order.retain(|k| k != key);
        }
    }

    /// Total tracked bytes.
    pub fn current_size(&self) -> i64 {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .current_size
    }

    /// Whether `key` is currently tracked.
    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .sizes
            .contains_key(key)
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .sizes
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LruInner {
    fn move_to_front(&mut self, key: &str) {
        self.order.retain(|k| k != key);
        self.order.push_front(key.to_string());
    }

    /// Pop least-recently-used entries until the budget holds. Returns the
    /// evicted keys, least recent first.
    fn evict_if_needed(&mut self) -> Vec<String> {
        if self.max_size_bytes <= 0 {
            return Vec::new();
        }

        let mut evicted = Vec::new();
        while self.current_size > self.max_size_bytes && !self.order.is_empty() {
            let Some(victim) = self.order.pop_back() else {
                break;
            };
            if let Some(size) = self.sizes.remove(&victim) {
                self.current_size -= size;
            }
            evicted.push(victim);
        }
        evicted
    }
}
