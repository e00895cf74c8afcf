//! Schedule-driven reordering for push-stage gradients
//!
//! The backward pass finishes tensors in an order that does not minimise
//! network idle time. `TokenReplay` releases gradient tensors in the order
//! of a precomputed [`ScheduleTable`] instead: each token names the priority
//! of the next tensor to send, and every partition of that tensor is moved
//! into a staging buffer so the partitions go out back to back.
//!
//! The tensor carrying the boundary priority closes the iteration. Once it
//! has been seen, the door closes behind every staged tensor and only
//! completions reported downstream reopen it, so the next iteration cannot
//! race ahead of the synchronization point of the current one.
//!
//! Tensors whose priority never appears in the schedule are not replayed;
//! they fill in whenever the next scheduled tensor is not pending yet, still
//! behind the door.
//!
//! When the schedule has been replayed, `total_tensors` tensors have been
//! staged and the door is open again, the tokens are regenerated for the next
//! iteration.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use super::pending::PendingStore;
use crate::config::{DoorPolicy, ScheduleTable};
use crate::task::Task;

/// Result of trying to stage the next tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StageOutcome {
    /// This many partitions were moved into the staging buffer
    Staged(usize),
    /// The next scheduled tensor has not been submitted yet
    NoMatch,
    /// The next tensor is waiting behind a closed door
    Blocked,
}

#[derive(Debug)]
pub(crate) struct TokenReplay {
    table: ScheduleTable,
    scheduled: HashSet<i64>,
    door: DoorPolicy,
    tokens: VecDeque<i64>,
    staged: VecDeque<Task>,
    boundary_seen: bool,
    permits: u32,
    dispatched_tensors: usize,
    iterations: u64,
}

impl TokenReplay {
    pub fn new(table: ScheduleTable, door: DoorPolicy) -> Self {
        debug!(?table, ?door, "TokenReplay::new: called");
        let tokens = table.tokens.iter().copied().collect();
        let scheduled = table.tokens.iter().copied().collect();
        Self {
            table,
            scheduled,
            door,
            tokens,
            staged: VecDeque::new(),
            boundary_seen: false,
            permits: 1,
            dispatched_tensors: 0,
            iterations: 0,
        }
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    pub fn staged_front(&self) -> Option<&Task> {
        self.staged.front()
    }

    pub fn pop_staged(&mut self) -> Option<Task> {
        self.staged.pop_front()
    }

    pub fn barrier_open(&self) -> bool {
        self.permits > 0
    }

    pub fn boundary_seen(&self) -> bool {
        self.boundary_seen
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Begin the next iteration if this one has been fully replayed and the
    /// door has been reopened downstream
    pub fn maybe_reset(&mut self) -> bool {
        if self.dispatched_tensors < self.table.total_tensors || !self.tokens.is_empty() || !self.staged.is_empty() {
            return false;
        }
        if !self.barrier_open() {
            debug!(iteration = self.iterations, "TokenReplay::maybe_reset: door closed, holding rollover");
            return false;
        }
        debug!(iteration = self.iterations, "TokenReplay::maybe_reset: regenerating tokens");
        self.tokens = self.table.tokens.iter().copied().collect();
        self.boundary_seen = false;
        self.dispatched_tensors = 0;
        self.iterations += 1;
        true
    }

    /// Move the next scheduled tensor from `store` into the staging buffer
    pub fn stage_next(&mut self, store: &mut PendingStore) -> StageOutcome {
        let (priority, scheduled) = match self.tokens.front() {
            Some(&token) if store.contains_priority(token) => (token, true),
            front => match self.next_unscheduled(store) {
                Some(priority) => (priority, false),
                None => {
                    debug!(token = ?front, "TokenReplay::stage_next: scheduled tensor not pending");
                    return StageOutcome::NoMatch;
                }
            },
        };

        if scheduled && priority == self.table.boundary {
            debug!(priority, "TokenReplay::stage_next: boundary tensor reached");
            self.boundary_seen = true;
        }
        if self.boundary_seen && !self.barrier_open() {
            debug!(priority, "TokenReplay::stage_next: door closed");
            return StageOutcome::Blocked;
        }

        let group = store.take_group(priority);
        let staged = group.len();
        self.staged.extend(group);
        if scheduled {
            self.tokens.pop_front();
        }
        self.dispatched_tensors += 1;
        debug!(priority, staged, dispatched = self.dispatched_tensors, "TokenReplay::stage_next: staged tensor");

        if self.boundary_seen {
            self.close_door();
        }
        StageOutcome::Staged(staged)
    }

    /// Highest pending priority that the schedule never names
    fn next_unscheduled(&self, store: &PendingStore) -> Option<i64> {
        store
            .iter()
            .map(|(_, task)| task.priority)
            .find(|priority| !self.scheduled.contains(priority))
    }

    fn close_door(&mut self) {
        match self.door {
            DoorPolicy::Boundary => self.permits = 0,
            DoorPolicy::Counted { .. } => self.permits = self.permits.saturating_sub(1),
        }
    }

    /// Reopen the door for a completion reported after the boundary; returns
    /// false when the completion belongs to credit accounting instead
    ///
    /// The replay never rolls over behind a closed door, so a closed door
    /// always has the boundary behind it.
    pub fn on_finish(&mut self) -> bool {
        if !self.boundary_seen {
            return false;
        }
        self.permits = match self.door {
            DoorPolicy::Boundary => 1,
            DoorPolicy::Counted { limit } => (self.permits + 1).min(limit),
        };
        debug!(permits = self.permits, "TokenReplay::on_finish: door reopened");
        true
    }
}
