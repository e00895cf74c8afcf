//! Readiness collaborators
//!
//! A dispatcher consults two kinds of readiness: a per-task [`ReadyEvent`]
//! (for example a device event recorded after the producing kernel) and a
//! per-stage [`ReadyTable`] counting how many contributors have signalled a
//! key. Both are owned by the surrounding pipeline; the implementations here
//! are the simple in-process versions used by tests and the replay tool.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// Per-task readiness handle
pub trait ReadyEvent: Send + Sync {
    fn ready(&self) -> bool;
}

/// Per-stage table of contributions received for each key
pub trait ReadyTable: Send + Sync {
    /// All expected contributions for `key` have arrived
    fn is_key_ready(&self, key: u64) -> bool;

    /// Acknowledge consumption of `key`
    fn clear_ready_count(&self, key: u64);
}

/// A readiness handle that becomes ready once set
#[derive(Debug, Default)]
pub struct ReadyFlag(AtomicBool);

impl ReadyFlag {
    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }
}

impl ReadyEvent for ReadyFlag {
    fn ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Readiness table that reports a key ready once `expected` contributions
/// have been added
#[derive(Debug)]
pub struct CountingTable {
    expected: usize,
    counts: Mutex<HashMap<u64, usize>>,
}

impl CountingTable {
    pub fn new(expected: usize) -> Self {
        debug!(expected, "CountingTable::new: called");
        Self {
            expected,
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Record one contribution for `key`, returning the new count
    pub fn add_ready_count(&self, key: u64) -> usize {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        let count = counts.entry(key).or_default();
        *count += 1;
        debug!(key, count = *count, "CountingTable::add_ready_count: called");
        *count
    }

    pub fn ready_count(&self, key: u64) -> usize {
        let counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        counts.get(&key).copied().unwrap_or(0)
    }
}

impl ReadyTable for CountingTable {
    fn is_key_ready(&self, key: u64) -> bool {
        self.ready_count(key) == self.expected
    }

    fn clear_ready_count(&self, key: u64) {
        debug!(key, "CountingTable::clear_ready_count: called");
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        counts.remove(&key);
    }
}
