//! Recency queue with second-chance eviction.
//!
//! Entries sit in a `VecDeque` ordered by recency: the front holds the most
//! recently inserted (or requeued) entry, the back holds the eviction
//! candidate. Each entry carries a referenced bit that grants it one extra
//! pass before eviction.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                     SecondChanceQueue<T>                              │
//!   │                                                                       │
//!   │   front                                                  back         │
//!   │   ┌─────────┐   ┌─────────┐   ┌─────────┐   ┌─────────┐               │
//!   │   │ D ref=0 │ ─ │ C ref=0 │ ─ │ B ref=1 │ ─ │ A ref=1 │  ◄── victim?  │
//!   │   └─────────┘   └─────────┘   └─────────┘   └─────────┘               │
//!   │                                                                       │
//!   │   evict():                                                            │
//!   │   [A ref=1] -> move to front, ref=0                                   │
//!   │   [B ref=1] -> move to front, ref=0                                   │
//!   │   [C ref=0] -> pop, return C                                          │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Entry States
//!
//! ```text
//!   push_front ──► fresh ──mark_referenced──► referenced
//!                    ▲                            │
//!                    └──── requeued by evict() ◄──┘
//!   fresh at the back during evict() ──► removed (terminal)
//! ```
//!
//! ## Termination
//!
//! Requeueing always clears the bit, so after at most `len` requeues every
//! entry that was referenced when the sweep began has become fresh and the
//! back entry must be evicted. [`evict`](SecondChanceQueue::evict) reports
//! how many requeues it performed.
//!
//! ## Performance Characteristics
//!
//! | Operation         | Time   | Notes                                 |
//! |-------------------|--------|---------------------------------------|
//! | `push_front`      | O(1)   | Amortized                             |
//! | `position`        | O(n)   | Linear scan, front to back            |
//! | `mark_referenced` | O(1)   | Sets the bit, no movement             |
//! | `evict`           | O(n)   | At most `len` requeues                |

use std::collections::VecDeque;

#[derive(Debug)]
struct Entry<T> {
    value: T,
    referenced: bool,
}

/// Result of a second-chance sweep.
#[derive(Debug, PartialEq, Eq)]
pub struct Eviction<T> {
    /// The removed entry's value.
    pub value: T,
    /// Number of referenced entries moved to the front before the victim was
    /// found.
    pub requeues: usize,
}

/// Recency-ordered queue implementing second-chance (clock) eviction.
#[derive(Debug)]
pub struct SecondChanceQueue<T> {
    entries: VecDeque<Entry<T>>,
}

impl<T> SecondChanceQueue<T> {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts `value` at the front with the referenced bit clear.
    pub fn push_front(&mut self, value: T) {
        self.entries.push_front(Entry {
            value,
            referenced: false,
        });
    }

    /// Index (from the front) of the first entry whose value satisfies `pred`.
    pub fn position(&self, mut pred: impl FnMut(&T) -> bool) -> Option<usize> {
        self.entries.iter().position(|entry| pred(&entry.value))
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        self.entries.get(idx).map(|entry| &entry.value)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        self.entries.get_mut(idx).map(|entry| &mut entry.value)
    }

    /// Sets the referenced bit of the entry at `idx`; returns `false` if
    /// there is no such entry.
    pub fn mark_referenced(&mut self, idx: usize) -> bool {
        match self.entries.get_mut(idx) {
            Some(entry) => {
                entry.referenced = true;
                true
            },
            None => false,
        }
    }

    pub fn is_referenced(&self, idx: usize) -> Option<bool> {
        self.entries.get(idx).map(|entry| entry.referenced)
    }

    /// Runs the second-chance sweep and removes the victim.
    ///
    /// While the back entry is referenced it is moved to the front with its
    /// bit cleared; the first unreferenced back entry is removed and
    /// returned. Returns `None` only when the queue is empty.
    pub fn evict(&mut self) -> Option<Eviction<T>> {
        let mut requeues = 0;
        loop {
            let back = self.entries.back_mut()?;
            if !back.referenced {
                break;
            }
            back.referenced = false;
            // back_mut() just returned Some, so pop_back cannot fail
            if let Some(entry) = self.entries.pop_back() {
                self.entries.push_front(entry);
            }
            requeues += 1;
            debug_assert!(
                requeues <= self.entries.len(),
                "second-chance sweep exceeded queue length"
            );
        }
        let victim = self.entries.pop_back()?;
        Some(Eviction {
            value: victim.value,
            requeues,
        })
    }

    /// Removes the back entry without consulting the referenced bit.
    pub fn pop_back(&mut self) -> Option<T> {
        self.entries.pop_back().map(|entry| entry.value)
    }

    /// Removes every entry, front to back.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.entries.drain(..).map(|entry| entry.value)
    }

    /// Iterates `(value, referenced)` pairs from front to back.
    pub fn iter(&self) -> impl Iterator<Item = (&T, bool)> {
        self.entries
            .iter()
            .map(|entry| (&entry.value, entry.referenced))
    }
}

impl<T> Default for SecondChanceQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
