//! Ordered storage for pending tasks

use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::task::Task;

/// Position of a task in the store
///
/// Ordered stores sort by descending priority then ascending key; FIFO
/// stores leave both at zero so only the sequence number counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Slot {
    rank: Reverse<i64>,
    key: u64,
    seq: u64,
}

#[derive(Debug)]
pub(crate) struct PendingStore {
    ordered: bool,
    next_seq: u64,
    tasks: BTreeMap<Slot, Task>,
}

impl PendingStore {
    pub fn new(ordered: bool) -> Self {
        Self {
            ordered,
            next_seq: 0,
            tasks: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn insert(&mut self, task: Task) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let slot = if self.ordered {
            Slot {
                rank: Reverse(task.priority),
                key: task.key,
                seq,
            }
        } else {
            Slot {
                rank: Reverse(0),
                key: 0,
                seq,
            }
        };
        self.tasks.insert(slot, task);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Slot, &Task)> {
        self.tasks.iter()
    }

    pub fn remove(&mut self, slot: &Slot) -> Option<Task> {
        self.tasks.remove(slot)
    }

    pub fn first(&self) -> Option<&Task> {
        self.tasks.values().next()
    }

    pub fn pop_first(&mut self) -> Option<Task> {
        self.tasks.pop_first().map(|(_, task)| task)
    }

    fn priority_range(&self, priority: i64) -> impl Iterator<Item = (&Slot, &Task)> {
        debug_assert!(self.ordered);
        let start = Slot {
            rank: Reverse(priority),
            key: 0,
            seq: 0,
        };
        self.tasks.range(start..).take_while(move |(slot, _)| slot.rank == Reverse(priority))
    }

    pub fn contains_priority(&self, priority: i64) -> bool {
        self.priority_range(priority).next().is_some()
    }

    /// Remove up to `total_partnum` tasks of the tensor at `priority`, lowest
    /// key first; the first match decides the partition count
    pub fn take_group(&mut self, priority: i64) -> Vec<Task> {
        let slots: Vec<Slot> = match self.priority_range(priority).next() {
            Some((_, head)) => {
                let want = head.total_partnum.max(1);
                self.priority_range(priority).take(want).map(|(slot, _)| *slot).collect()
            }
            None => Vec::new(),
        };
        slots.iter().filter_map(|slot| self.tasks.remove(slot)).collect()
    }
}
