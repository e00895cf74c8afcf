//! Offline replay of one dispatcher against synthetic tensors
//!
//! Builds a tensor per scheduled priority, submits every partition in a
//! seeded random order and drives the dispatcher the way a pipeline worker
//! would: poll, keep up to `depth` tasks in flight, report completions.
//! Time only advances while the dispatcher is idle, so throttle windows
//! replay deterministically.

use std::collections::VecDeque;
use std::sync::Arc;

use eyre::{Result, eyre};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{Config, QueueConfig};
use crate::profile::ManualClock;
use crate::scheduler::{QueueState, ScheduledQueue};
use crate::task::{Stage, Task};

/// Simulated time per idle poll
const TICK_US: i64 = 100;

/// Idle polls tolerated before the run is declared stalled
const MAX_IDLE_POLLS: usize = 100_000;

/// Knobs for one replay run
#[derive(Debug, Clone)]
pub struct ReplayOptions {
    pub stage: Stage,
    pub iterations: usize,
    /// Partitions per tensor
    pub partitions: usize,
    /// Bytes per partition
    pub len: u64,
    /// Dispatched tasks kept in flight before the oldest is finished
    pub depth: usize,
    pub seed: u64,
    /// Tensor count when the config carries no schedule
    pub tensors: usize,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            stage: Stage::Push,
            iterations: 1,
            partitions: 1,
            len: 1024,
            depth: 2,
            seed: 0,
            tensors: 8,
        }
    }
}

/// One task leaving the dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emission {
    pub iteration: usize,
    pub seq: usize,
    pub name: String,
    pub key: u64,
    pub priority: i64,
    pub partition: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    pub emissions: Vec<Emission>,
    pub state: QueueState,
}

impl ReplayReport {
    /// Distinct tensor priorities of `iteration` in emission order
    pub fn tensor_order(&self, iteration: usize) -> Vec<i64> {
        let mut order: Vec<i64> = Vec::new();
        for emission in self.emissions.iter().filter(|e| e.iteration == iteration) {
            if order.last() != Some(&emission.priority) {
                order.push(emission.priority);
            }
        }
        order
    }
}

/// Priorities of the tensors of one iteration
///
/// Scheduled tokens come first; tensors beyond the token list get fresh
/// priorities below the lowest token.
pub fn tensor_priorities(config: &QueueConfig, fallback: usize) -> Vec<i64> {
    let Some(schedule) = &config.schedule else {
        return (0..fallback as i64).map(|i| -i).collect();
    };
    let mut priorities = schedule.tokens.clone();
    let floor = priorities.iter().copied().min().unwrap_or(0);
    let extra = schedule.total_tensors.saturating_sub(priorities.len());
    priorities.extend((1..=extra as i64).map(|i| floor - i));
    priorities
}

/// Every partition of every tensor, in pipeline order
pub fn synthesize(priorities: &[i64], opts: &ReplayOptions, begin_name: Option<&str>) -> Vec<Task> {
    let partitions = opts.partitions.max(1);
    priorities
        .iter()
        .enumerate()
        .flat_map(|(index, &priority)| {
            let name = match begin_name {
                Some(begin) if index == 0 => format!("{}_gradient", begin),
                _ => format!("tensor{}_gradient", index),
            };
            (0..partitions).map(move |part| {
                Task::new(name.clone(), ((index as u64) << 16) | part as u64, priority, opts.len)
                    .with_partitions(partitions)
            })
        })
        .collect()
}

/// Drive a dispatcher built from `config` through `opts.iterations` iterations
pub fn run(config: &Config, opts: &ReplayOptions) -> Result<ReplayReport> {
    debug!(?opts, "harness::run: called");
    let clock = Arc::new(ManualClock::new(0));
    let queue = ScheduledQueue::new(opts.stage, &config.queue, &config.role, None)?.with_clock(clock.clone());
    let priorities = tensor_priorities(&config.queue, opts.tensors);
    let mut rng = StdRng::seed_from_u64(opts.seed);
    let depth = opts.depth.max(1);

    let mut emissions = Vec::new();
    let mut in_flight: VecDeque<Task> = VecDeque::new();

    for iteration in 0..opts.iterations {
        let mut tasks = synthesize(&priorities, opts, config.queue.begin_name.as_deref());
        let expected = tasks.len();
        tasks.shuffle(&mut rng);
        for task in tasks {
            queue.submit(task);
        }

        let mut emitted = 0;
        let mut idle = 0;
        while emitted < expected {
            if let Some(task) = queue.dispatch() {
                idle = 0;
                emissions.push(Emission {
                    iteration,
                    seq: emitted,
                    name: task.name.clone(),
                    key: task.key,
                    priority: task.priority,
                    partition: task.key & 0xffff,
                });
                emitted += 1;
                in_flight.push_back(task);
                if in_flight.len() > depth {
                    if let Some(done) = in_flight.pop_front() {
                        queue.report_finish(&done);
                    }
                }
                continue;
            }
            if let Some(done) = in_flight.pop_front() {
                queue.report_finish(&done);
                continue;
            }
            idle += 1;
            clock.advance_us(TICK_US);
            if idle > MAX_IDLE_POLLS {
                return Err(eyre!(
                    "dispatcher stalled in iteration {} with {} tasks pending",
                    iteration,
                    queue.pending_size()
                ));
            }
        }
        while let Some(done) = in_flight.pop_front() {
            queue.report_finish(&done);
        }
        info!(iteration, emitted, "harness::run: iteration complete");
    }

    Ok(ReplayReport {
        emissions,
        state: queue.state(),
    })
}
