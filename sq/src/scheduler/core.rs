//! Dispatcher implementation

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::config::{QueueConfig, Strategy};
use crate::error::ConfigError;
use crate::profile::{Clock, SystemClock, record_start};
use crate::readiness::ReadyTable;
use crate::task::{Role, Stage, Task};

use super::credit::Credits;
use super::pending::PendingStore;
use super::queue::{QueueState, QueueStats};
use super::replay::{StageOutcome, TokenReplay};
use super::window::{WindowState, WindowThrottle};

/// How push-stage gradients are released
#[derive(Debug)]
enum Policy {
    Plain,
    Replay { store: PendingStore, replay: TokenReplay },
    Window { store: PendingStore, throttle: WindowThrottle },
}

impl Policy {
    fn store_len(&self) -> usize {
        match self {
            Policy::Plain => 0,
            Policy::Replay { store, .. } | Policy::Window { store, .. } => store.len(),
        }
    }
}

/// Internal state protected by mutex
struct QueueInner {
    /// Tasks released by the plain scan
    pending: PendingStore,
    credits: Credits,
    policy: Policy,
    stats: QueueStats,
}

/// The ScheduledQueue decides which pending task of one pipeline stage may
/// run next, honoring readiness, byte credits and the push-stage reorder
/// policy.
///
/// Every operation takes the single internal lock, does a bounded amount of
/// work and returns; `dispatch` never waits for a task to become eligible.
pub struct ScheduledQueue {
    stage: Stage,
    strategy: Strategy,
    table: Option<Arc<dyn ReadyTable>>,
    clock: Arc<dyn Clock>,
    inner: Mutex<QueueInner>,
}

impl ScheduledQueue {
    /// Create the dispatcher for `stage` as seen by a process with `role`
    ///
    /// `table` is only consulted when the stage gates on it for this role.
    pub fn new(
        stage: Stage,
        config: &QueueConfig,
        role: &Role,
        table: Option<Arc<dyn ReadyTable>>,
    ) -> Result<Self, ConfigError> {
        debug!(%stage, ?config, ?role, "ScheduledQueue::new: called");
        config.validate()?;

        let table = if stage.gates_on_table(role) {
            if table.is_none() {
                warn!(%stage, "ScheduledQueue::new: stage gates on a readiness table but none was given");
            }
            table
        } else {
            None
        };

        let budget = (stage.uses_credits(role) && config.credit_multiplier() > 0).then(|| config.credit_budget());
        let credits = Credits::new(budget);
        let ordered = credits.enabled();

        let strategy = if stage == Stage::Push { config.strategy } else { Strategy::Plain };
        let policy = match strategy {
            Strategy::Plain => Policy::Plain,
            Strategy::TokenReplay => {
                let table = config.schedule.clone().ok_or(ConfigError::MissingSchedule { strategy })?;
                Policy::Replay {
                    store: PendingStore::new(true),
                    replay: TokenReplay::new(table, config.door),
                }
            }
            Strategy::TimeWindow => {
                let window = config.window.as_ref().ok_or(ConfigError::MissingWindow { strategy })?;
                Policy::Window {
                    store: PendingStore::new(true),
                    throttle: WindowThrottle::new(window, config.begin_name.clone()),
                }
            }
        };

        Ok(Self {
            stage,
            strategy,
            table,
            clock: Arc::new(SystemClock),
            inner: Mutex::new(QueueInner {
                pending: PendingStore::new(ordered),
                credits,
                policy,
                stats: QueueStats::default(),
            }),
        })
    }

    /// Replace the clock used for profiling and throttle windows
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Hand a task to the dispatcher
    ///
    /// # Panics
    ///
    /// If the task has an empty name.
    pub fn submit(&self, task: Task) {
        debug!(stage = %self.stage, name = %task.name, key = task.key, priority = task.priority, "ScheduledQueue::submit: called");
        assert!(!task.name.is_empty(), "submitted task with key {} has an empty name", task.key);

        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.stats.total_submitted += 1;

        match &mut inner.policy {
            Policy::Replay { store, .. } if task.is_gradient() => store.insert(task),
            Policy::Window { store, throttle } if task.is_gradient() => {
                if throttle.is_iteration_head(&task.name) {
                    debug!(name = %task.name, "ScheduledQueue::submit: iteration head, restarting windows");
                    throttle.restart(self.clock.now_us());
                }
                store.insert(task);
            }
            _ => inner.pending.insert(task),
        }

        let pending = inner.pending.len() + inner.policy.store_len();
        inner.stats.peak_pending = inner.stats.peak_pending.max(pending);
    }

    /// Return the next eligible task, or `None` if nothing may run yet
    pub fn dispatch(&self) -> Option<Task> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let table = self.table.as_deref();

        let task = match &mut inner.policy {
            Policy::Plain => None,
            Policy::Replay { store, replay } => Self::next_replayed(store, replay, &inner.credits, table, &mut inner.stats),
            Policy::Window { store, throttle } => {
                Self::next_throttled(store, throttle, &inner.credits, table, self.clock.now_us(), &mut inner.stats)
            }
        }
        .or_else(|| Self::next_scanned(&mut inner.pending, &inner.credits, table))?;

        Some(self.release(task, inner))
    }

    /// First task of the plain store that passes every admission check
    fn next_scanned(pending: &mut PendingStore, credits: &Credits, table: Option<&dyn ReadyTable>) -> Option<Task> {
        if pending.is_empty() {
            return None;
        }
        let slot = pending
            .iter()
            .find(|(_, task)| admit(task, credits, table))
            .map(|(slot, _)| *slot)?;
        pending.remove(&slot)
    }

    fn next_replayed(
        store: &mut PendingStore,
        replay: &mut TokenReplay,
        credits: &Credits,
        table: Option<&dyn ReadyTable>,
        stats: &mut QueueStats,
    ) -> Option<Task> {
        if replay.maybe_reset() {
            stats.iterations = replay.iterations();
        }
        if replay.staged_len() == 0 {
            match replay.stage_next(store) {
                StageOutcome::Staged(_) => {}
                StageOutcome::NoMatch => return None,
                StageOutcome::Blocked => {
                    stats.barrier_blocks += 1;
                    return None;
                }
            }
        }
        // Staged partitions leave strictly in order; an inadmissible front waits
        if !admit(replay.staged_front()?, credits, table) {
            debug!("ScheduledQueue::next_replayed: staged front not admissible yet");
            return None;
        }
        replay.pop_staged()
    }

    fn next_throttled(
        store: &mut PendingStore,
        throttle: &mut WindowThrottle,
        credits: &Credits,
        table: Option<&dyn ReadyTable>,
        now_us: i64,
        stats: &mut QueueStats,
    ) -> Option<Task> {
        if store.is_empty() {
            return None;
        }
        if throttle.poll(now_us) == WindowState::Rolled {
            stats.window_rolls += 1;
            return None;
        }
        let head = store.first()?;
        if !throttle.admits(head.len) || !admit(head, credits, table) {
            return None;
        }
        let task = store.pop_first()?;
        throttle.consume(task.len);
        Some(task)
    }

    /// Bookkeeping for a task leaving the dispatcher
    fn release(&self, mut task: Task, inner: &mut QueueInner) -> Task {
        inner.credits.acquire(task.len);
        inner.stats.total_dispatched += 1;
        task.ready_event = None;
        record_start(&task, self.stage, self.clock.as_ref());
        debug!(
            stage = %self.stage,
            name = %task.name,
            key = task.key,
            priority = task.priority,
            credits = inner.credits.available(),
            "ScheduledQueue::dispatch: released"
        );
        task
    }

    /// Remove and return the pending task with `key`
    ///
    /// # Panics
    ///
    /// If this dispatcher runs credit control or a push reorder policy, or
    /// if the matching task is not ready yet.
    pub fn dispatch_key(&self, key: u64) -> Option<Task> {
        debug!(stage = %self.stage, key, "ScheduledQueue::dispatch_key: called");
        let mut guard = self.lock();
        let inner = &mut *guard;
        assert!(
            !inner.credits.enabled(),
            "keyed dispatch on credit-controlled {} queue",
            self.stage
        );
        assert!(
            matches!(inner.policy, Policy::Plain),
            "keyed dispatch on {} queue with {} strategy",
            self.stage,
            self.strategy
        );

        let slot = inner
            .pending
            .iter()
            .find(|(_, task)| task.key == key)
            .map(|(slot, _)| *slot)?;
        let task = inner.pending.remove(&slot)?;
        assert!(task.is_ready(), "keyed dispatch of task {} before it is ready", task.name);
        Some(self.release(task, inner))
    }

    /// Number of tasks waiting to be picked, excluding staged partitions
    pub fn pending_size(&self) -> usize {
        let inner = self.lock();
        inner.pending.len() + inner.policy.store_len()
    }

    /// Report that a dispatched task has finished downstream
    pub fn report_finish(&self, task: &Task) {
        debug!(stage = %self.stage, name = %task.name, key = task.key, "ScheduledQueue::report_finish: called");
        self.report_finish_len(task.len);
    }

    /// Report `len` bytes of dispatched work as finished
    ///
    /// After the boundary tensor of a replayed schedule, a completion opens
    /// the iteration door instead of returning credit.
    ///
    /// # Panics
    ///
    /// If more bytes are returned than are in flight.
    pub fn report_finish_len(&self, len: u64) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.stats.total_finished += 1;

        if let Policy::Replay { replay, .. } = &mut inner.policy {
            if replay.on_finish() {
                return;
            }
        }
        inner.credits.release(len);
        debug!(stage = %self.stage, len, credits = inner.credits.available(), "ScheduledQueue::report_finish_len: credit returned");
    }

    /// Current state snapshot
    pub fn state(&self) -> QueueState {
        let inner = self.lock();
        let (staged, boundary_seen, barrier_open) = match &inner.policy {
            Policy::Replay { replay, .. } => (replay.staged_len(), replay.boundary_seen(), replay.barrier_open()),
            _ => (0, false, true),
        };
        QueueState {
            stage: self.stage,
            strategy: self.strategy,
            pending: inner.pending.len() + inner.policy.store_len(),
            staged,
            credits_enabled: inner.credits.enabled(),
            credits_available: inner.credits.available(),
            credits_in_flight: inner.credits.in_flight(),
            boundary_seen,
            barrier_open,
            stats: inner.stats.clone(),
        }
    }

    pub fn stats(&self) -> QueueStats {
        self.lock().stats.clone()
    }
}

/// Readiness, credit and table checks for one candidate
///
/// A passing table check acknowledges the key, so this must only be called
/// for the task that is about to be released.
fn admit(task: &Task, credits: &Credits, table: Option<&dyn ReadyTable>) -> bool {
    if !task.is_ready() || !credits.admits(task.len) {
        return false;
    }
    if let Some(table) = table {
        if !table.is_key_ready(task.key) {
            return false;
        }
        table.clear_ready_count(task.key);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DoorPolicy, ScheduleTable, WindowSchedule};
    use crate::profile::{ManualClock, ProfileContext};
    use crate::readiness::{CountingTable, ReadyFlag};

    fn root() -> Role {
        Role {
            signal_root: true,
            root_device: true,
            ..Default::default()
        }
    }

    fn plain(stage: Stage) -> ScheduledQueue {
        ScheduledQueue::new(stage, &QueueConfig::default(), &Role::default(), None).unwrap()
    }

    fn credited(budget: u64) -> ScheduledQueue {
        let config = QueueConfig {
            partition_bound: budget,
            credit_multiplier: Some(1),
            ..Default::default()
        };
        ScheduledQueue::new(Stage::Reduce, &config, &root(), None).unwrap()
    }

    fn replayed(tokens: Vec<i64>, boundary: i64) -> ScheduledQueue {
        let config = QueueConfig {
            strategy: Strategy::TokenReplay,
            schedule: Some(ScheduleTable::new(tokens, boundary)),
            ..Default::default()
        };
        ScheduledQueue::new(Stage::Push, &config, &Role::default(), None).unwrap()
    }

    fn grad(key: u64, priority: i64) -> Task {
        Task::new(format!("layer{}_gradient", -priority), key, priority, 16)
    }

    fn drain(queue: &ScheduledQueue) -> Vec<i64> {
        std::iter::from_fn(|| queue.dispatch()).map(|t| t.priority).collect()
    }

    #[test]
    fn test_priority_ordering() {
        let queue = credited(1_000);
        queue.submit(Task::new("a", 1, 3, 8));
        queue.submit(Task::new("b", 2, 1, 8));
        queue.submit(Task::new("c", 3, 2, 8));
        assert_eq!(drain(&queue), vec![3, 2, 1]);
    }

    #[test]
    fn test_tie_break_by_key() {
        let queue = credited(1_000);
        queue.submit(Task::new("five", 5, 0, 8));
        queue.submit(Task::new("two", 2, 0, 8));
        let keys: Vec<u64> = std::iter::from_fn(|| queue.dispatch()).map(|t| t.key).collect();
        assert_eq!(keys, vec![2, 5]);
    }

    #[test]
    fn test_unordered_stage_is_fifo() {
        let queue = plain(Stage::Pull);
        queue.submit(Task::new("a", 1, 1, 8));
        queue.submit(Task::new("b", 2, 3, 8));
        assert_eq!(drain(&queue), vec![1, 3]);
    }

    #[test]
    fn test_credit_blocks_until_finish() {
        let queue = credited(100);
        queue.submit(Task::new("a", 1, 2, 60));
        queue.submit(Task::new("b", 2, 1, 60));

        let first = queue.dispatch().unwrap();
        assert_eq!(first.key, 1);
        assert!(queue.dispatch().is_none());
        assert_eq!(queue.state().credits_available, 40);

        queue.report_finish(&first);
        assert_eq!(queue.dispatch().unwrap().key, 2);
    }

    #[test]
    fn test_smaller_task_skips_ahead_of_unaffordable_one() {
        let queue = credited(100);
        queue.submit(Task::new("big", 1, 2, 150));
        queue.submit(Task::new("small", 2, 1, 50));
        assert_eq!(queue.dispatch().unwrap().key, 2);
        assert!(queue.dispatch().is_none());
        assert_eq!(queue.pending_size(), 1);
    }

    #[test]
    fn test_zero_multiplier_disables_credits() {
        let config = QueueConfig {
            partition_bound: 10,
            credit_multiplier: Some(0),
            ..Default::default()
        };
        let queue = ScheduledQueue::new(Stage::Reduce, &config, &root(), None).unwrap();
        queue.submit(Task::new("huge", 1, 0, 1 << 30));
        assert!(queue.dispatch().is_some());
        assert!(!queue.state().credits_enabled);
    }

    #[test]
    fn test_readiness_handle_gates_dispatch() {
        let queue = plain(Stage::CopyD2H);
        let flag = Arc::new(ReadyFlag::default());
        queue.submit(Task::new("a", 1, 0, 8).with_ready_event(flag.clone()));
        for _ in 0..5 {
            assert!(queue.dispatch().is_none());
        }
        flag.set();
        let task = queue.dispatch().unwrap();
        assert!(task.ready_event.is_none());
    }

    #[test]
    fn test_table_gating_clears_count() {
        let table = Arc::new(CountingTable::new(2));
        let queue = ScheduledQueue::new(Stage::Broadcast, &QueueConfig::default(), &root(), Some(table.clone())).unwrap();
        queue.submit(Task::new("a", 9, 0, 8));

        table.add_ready_count(9);
        assert!(queue.dispatch().is_none());
        table.add_ready_count(9);
        assert!(queue.dispatch().is_some());
        assert_eq!(table.ready_count(9), 0);
    }

    #[test]
    fn test_table_ignored_without_role() {
        let table = Arc::new(CountingTable::new(2));
        let queue =
            ScheduledQueue::new(Stage::Broadcast, &QueueConfig::default(), &Role::default(), Some(table)).unwrap();
        queue.submit(Task::new("a", 9, 0, 8));
        assert!(queue.dispatch().is_some());
    }

    #[test]
    fn test_dispatch_key() {
        let queue = plain(Stage::Pull);
        queue.submit(Task::new("a", 1, 0, 8));
        queue.submit(Task::new("b", 2, 0, 8));
        assert_eq!(queue.dispatch_key(2).unwrap().name, "b");
        assert!(queue.dispatch_key(2).is_none());
        assert_eq!(queue.pending_size(), 1);
    }

    #[test]
    #[should_panic(expected = "credit-controlled")]
    fn test_dispatch_key_on_credited_queue_panics() {
        credited(100).dispatch_key(1);
    }

    #[test]
    #[should_panic(expected = "strategy")]
    fn test_dispatch_key_on_replayed_queue_panics() {
        replayed(vec![-1], -1).dispatch_key(1);
    }

    #[test]
    #[should_panic(expected = "before it is ready")]
    fn test_dispatch_key_unready_panics() {
        let queue = plain(Stage::Pull);
        queue.submit(Task::new("a", 1, 0, 8).with_ready_event(Arc::new(ReadyFlag::default())));
        queue.dispatch_key(1);
    }

    #[test]
    #[should_panic(expected = "empty name")]
    fn test_submit_empty_name_panics() {
        plain(Stage::Pull).submit(Task::new("", 1, 0, 8));
    }

    #[test]
    fn test_strategy_ignored_off_push_stage() {
        let config = QueueConfig {
            strategy: Strategy::TokenReplay,
            schedule: Some(ScheduleTable::new(vec![-1], -1)),
            ..Default::default()
        };
        let queue = ScheduledQueue::new(Stage::Pull, &config, &Role::default(), None).unwrap();
        assert_eq!(queue.strategy(), Strategy::Plain);
        queue.submit(grad(1, -7));
        assert!(queue.dispatch().is_some());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = QueueConfig {
            strategy: Strategy::TimeWindow,
            ..Default::default()
        };
        let err = ScheduledQueue::new(Stage::Push, &config, &Role::default(), None).err();
        assert_eq!(
            err,
            Some(ConfigError::MissingWindow {
                strategy: Strategy::TimeWindow
            })
        );
    }

    #[test]
    fn test_overflowing_credit_budget_rejected() {
        let config = QueueConfig {
            partition_bound: u64::MAX / 2,
            credit_multiplier: Some(3),
            ..Default::default()
        };
        let err = ScheduledQueue::new(Stage::Reduce, &config, &root(), None).err();
        assert!(matches!(err, Some(ConfigError::CreditBudgetOverflow { multiplier: 3, .. })));
    }

    #[test]
    fn test_replay_iteration_and_door() {
        let queue = replayed(vec![-1, -2, -3, 0], -3);
        for priority in [-3, 0, -1, -2] {
            queue.submit(grad((priority + 10) as u64, priority));
        }

        assert_eq!(queue.dispatch().unwrap().priority, -1);
        assert_eq!(queue.dispatch().unwrap().priority, -2);
        let boundary = queue.dispatch().unwrap();
        assert_eq!(boundary.priority, -3);
        assert!(!queue.state().barrier_open);

        assert!(queue.dispatch().is_none());
        assert!(queue.dispatch().is_none());
        assert_eq!(queue.stats().barrier_blocks, 2);

        queue.report_finish(&boundary);
        assert_eq!(queue.dispatch().unwrap().priority, 0);
    }

    #[test]
    fn test_replay_stages_all_partitions() {
        let queue = replayed(vec![-1, -2], -2);
        queue.submit(grad(20, -2));
        for key in [12, 10, 11] {
            queue.submit(grad(key, -1).with_partitions(3));
        }

        let keys: Vec<u64> = (0..3).map(|_| queue.dispatch().unwrap().key).collect();
        assert_eq!(keys, vec![10, 11, 12]);
        assert_eq!(queue.dispatch().unwrap().key, 20);
    }

    #[test]
    fn test_replay_waits_for_scheduled_tensor() {
        let queue = replayed(vec![-1, -2], -2);
        queue.submit(grad(2, -2));
        assert!(queue.dispatch().is_none());
        queue.submit(grad(1, -1));
        assert_eq!(drain(&queue), vec![-1, -2]);
    }

    #[test]
    fn test_control_tasks_bypass_replay() {
        let queue = replayed(vec![-1, -4], -4);
        queue.submit(grad(5, -4));
        queue.submit(Task::new("barrier_flag", 1, 0, 4));
        assert_eq!(queue.dispatch().unwrap().name, "barrier_flag");
        assert!(queue.dispatch().is_none());
        assert_eq!(queue.pending_size(), 1);
    }

    #[test]
    fn test_replay_unready_front_waits_in_staging() {
        let queue = replayed(vec![-1], -1);
        let flag = Arc::new(ReadyFlag::default());
        queue.submit(grad(1, -1).with_ready_event(flag.clone()));

        assert!(queue.dispatch().is_none());
        assert_eq!(queue.state().staged, 1);
        assert_eq!(queue.pending_size(), 0);

        flag.set();
        assert_eq!(queue.dispatch().unwrap().key, 1);
    }

    #[test]
    fn test_replay_resets_each_iteration() {
        let queue = replayed(vec![-2, -1], -1);
        for iteration in 0..3u64 {
            queue.submit(grad(1, -1));
            queue.submit(grad(2, -2));
            let order = drain(&queue);
            assert_eq!(order, vec![-2, -1]);
            assert_eq!(queue.stats().iterations, iteration);

            queue.report_finish_len(16);
            assert!(queue.state().barrier_open);
            assert!(queue.dispatch().is_none());
            assert_eq!(queue.stats().iterations, iteration + 1);
            assert!(!queue.state().boundary_seen);
        }
    }

    #[test]
    fn test_next_iteration_held_behind_trailing_boundary() {
        let queue = replayed(vec![-1, -2, -3], -3);
        for priority in [-2, -3, -1] {
            queue.submit(grad(-priority as u64, priority));
        }
        assert_eq!(drain(&queue), vec![-1, -2, -3]);
        assert!(!queue.state().barrier_open);

        queue.submit(grad(11, -1));
        assert!(queue.dispatch().is_none());
        assert!(queue.dispatch().is_none());
        assert_eq!(queue.stats().iterations, 0);
        assert_eq!(queue.pending_size(), 1);

        queue.report_finish_len(16);
        assert_eq!(queue.dispatch().unwrap().key, 11);
        assert_eq!(queue.stats().iterations, 1);
    }

    #[test]
    fn test_unscheduled_tensor_waits_for_door() {
        let queue = replayed(vec![-1, -2, -3], -3);
        for priority in [-3, -1, -2] {
            queue.submit(grad(-priority as u64, priority));
        }
        let boundary = (0..3).filter_map(|_| queue.dispatch()).last().unwrap();
        assert_eq!(boundary.priority, -3);

        queue.submit(grad(20, 0));
        assert!(queue.dispatch().is_none());
        assert!(queue.dispatch().is_none());
        assert_eq!(queue.stats().barrier_blocks, 2);

        queue.report_finish(&boundary);
        assert_eq!(queue.dispatch().unwrap().priority, 0);
    }

    #[test]
    fn test_window_throttles_bytes() {
        let clock = Arc::new(ManualClock::new(0));
        let config = QueueConfig {
            strategy: Strategy::TimeWindow,
            begin_name: Some("head".to_string()),
            window: Some(WindowSchedule::new(vec![1.0, 1.0], 20)),
            ..Default::default()
        };
        let queue = ScheduledQueue::new(Stage::Push, &config, &Role::default(), None)
            .unwrap()
            .with_clock(clock.clone());

        queue.submit(Task::new("head_gradient", 1, 0, 16));
        queue.submit(Task::new("tail_gradient", 2, -1, 16));

        assert_eq!(queue.dispatch().unwrap().key, 1);
        assert!(queue.dispatch().is_none());

        clock.advance_us(1_001);
        assert!(queue.dispatch().is_none());
        assert_eq!(queue.stats().window_rolls, 1);
        assert_eq!(queue.dispatch().unwrap().key, 2);
    }

    #[test]
    fn test_profiling_records_dispatch() {
        let clock = Arc::new(ManualClock::new(42));
        let ctx = Arc::new(ProfileContext::enabled());
        let queue = plain(Stage::Pull).with_clock(clock);
        queue.submit(Task::new("a", 3, 0, 8).with_context(ctx.clone()));
        queue.dispatch().unwrap();

        let times = ctx.comm_times(3, Stage::Pull);
        assert_eq!(times.len(), 1);
        assert_eq!(times[0].start_us, 42);
    }

    #[test]
    fn test_counted_door_variant() {
        let config = QueueConfig {
            strategy: Strategy::TokenReplay,
            schedule: Some(ScheduleTable::new(vec![-1, -2, -3], -1)),
            door: DoorPolicy::Counted { limit: 2 },
            ..Default::default()
        };
        let queue = ScheduledQueue::new(Stage::Push, &config, &Role::default(), None).unwrap();
        for priority in [-1, -2, -3] {
            queue.submit(grad(-priority as u64, priority));
        }

        assert_eq!(queue.dispatch().unwrap().priority, -1);
        assert!(queue.dispatch().is_none());
        queue.report_finish_len(16);
        queue.report_finish_len(16);
        assert_eq!(drain(&queue), vec![-2, -3]);
    }
}
