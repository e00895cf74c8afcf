//! Snapshot and statistics types for the dispatcher

use serde::{Deserialize, Serialize};

use crate::config::Strategy;
use crate::task::Stage;

/// Statistics for one dispatcher
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total_submitted: u64,
    pub total_dispatched: u64,
    pub total_finished: u64,
    /// Polls refused because the iteration door was closed
    pub barrier_blocks: u64,
    /// Polls that hit an expired throttle window
    pub window_rolls: u64,
    /// Completed schedule replays
    pub iterations: u64,
    pub peak_pending: usize,
}

/// Point-in-time view of a dispatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueState {
    pub stage: Stage,
    pub strategy: Strategy,
    pub pending: usize,
    pub staged: usize,
    pub credits_enabled: bool,
    pub credits_available: u64,
    pub credits_in_flight: u64,
    /// The boundary tensor of the current replay has been reached
    pub boundary_seen: bool,
    pub barrier_open: bool,
    pub stats: QueueStats,
}

impl QueueState {
    /// Nothing is waiting anywhere in the dispatcher
    pub fn is_idle(&self) -> bool {
        self.pending == 0 && self.staged == 0
    }
}
