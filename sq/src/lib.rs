//! StageQueue - per-stage task dispatcher for gradient synchronization
//!
//! Training produces one communication task per tensor partition, and each
//! task flows through the pipeline stages (reduce, copy, push, pull,
//! broadcast). Every stage owns a [`ScheduledQueue`] that decides when a
//! pending task may run.
//!
//! # Core Concepts
//!
//! - **Readiness**: a task runs only once its [`ReadyEvent`] fires and, for
//!   coordinating roles, the stage's [`ReadyTable`] has every contribution
//! - **Credits**: in-flight bytes on the reduce stage are bounded by
//!   `partition_bound * credit_multiplier`
//! - **Replay**: push-stage gradients follow a precomputed [`ScheduleTable`],
//!   with a door that holds the next iteration behind the boundary tensor
//! - **Throttle**: alternatively, push-stage bytes are metered per window of a
//!   profiled backward timeline
//!
//! # Example
//!
//! ```
//! use stagequeue::{QueueConfig, Role, ScheduledQueue, Stage, Task};
//!
//! let queue = ScheduledQueue::new(Stage::Pull, &QueueConfig::default(), &Role::default(), None)?;
//! queue.submit(Task::new("fc1000_gradient", 7, -3, 4096));
//! let task = queue.dispatch().expect("nothing blocks a pull task");
//! queue.report_finish(&task);
//! # Ok::<(), stagequeue::ConfigError>(())
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod harness;
pub mod profile;
pub mod readiness;
pub mod scheduler;
pub mod task;

pub use config::{Config, DoorPolicy, QueueConfig, ScheduleTable, Strategy, WindowSchedule};
pub use error::ConfigError;
pub use profile::{Clock, CommTime, ManualClock, ProfileContext, SystemClock};
pub use readiness::{CountingTable, ReadyEvent, ReadyFlag, ReadyTable};
pub use scheduler::{QueueState, QueueStats, ScheduledQueue};
pub use task::{Payload, Role, Stage, Task};
