//! Dispatch-time profiling and clocks

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::task::{Stage, Task};

/// Microsecond wall clock
pub trait Clock: Send + Sync {
    fn now_us(&self) -> i64;
}

/// Clock backed by the system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_us(&self) -> i64 {
        chrono::Utc::now().timestamp_micros()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(start_us: i64) -> Self {
        Self(AtomicI64::new(start_us))
    }

    pub fn advance_us(&self, delta: i64) {
        self.0.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta: i64) {
        self.advance_us(delta * 1_000);
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Start timestamp of one partition on one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommTime {
    pub key: u64,
    pub stage: Stage,
    pub start_us: i64,
}

/// Profiling state shared by every task of a tensor
#[derive(Debug, Default)]
pub struct ProfileContext {
    profile_flag: AtomicBool,
    part_comm_time: Mutex<HashMap<u64, HashMap<Stage, Vec<CommTime>>>>,
}

impl ProfileContext {
    /// Context with profiling switched on
    pub fn enabled() -> Self {
        let ctx = Self::default();
        ctx.set_profiling(true);
        ctx
    }

    pub fn set_profiling(&self, on: bool) {
        self.profile_flag.store(on, Ordering::Relaxed);
    }

    pub fn profiling_enabled(&self) -> bool {
        self.profile_flag.load(Ordering::Relaxed)
    }

    fn push(&self, record: CommTime) {
        let mut log = self.part_comm_time.lock().unwrap_or_else(|e| e.into_inner());
        log.entry(record.key).or_default().entry(record.stage).or_default().push(record);
    }

    /// Recorded start times for `key` on `stage`, oldest first
    pub fn comm_times(&self, key: u64, stage: Stage) -> Vec<CommTime> {
        let log = self.part_comm_time.lock().unwrap_or_else(|e| e.into_inner());
        log.get(&key)
            .and_then(|stages| stages.get(&stage))
            .cloned()
            .unwrap_or_default()
    }
}

/// Timestamp `task` as started on `stage` if its context has profiling on
pub fn record_start(task: &Task, stage: Stage, clock: &dyn Clock) {
    if !task.context.profiling_enabled() {
        return;
    }
    let start_us = clock.now_us();
    debug!(key = task.key, %stage, start_us, "record_start: called");
    task.context.push(CommTime {
        key: task.key,
        stage,
        start_us,
    });
}
