//! Per-stage dispatcher
//!
//! Holds the pending tasks of one pipeline stage and releases them one at a
//! time, honoring readiness, byte credits and, on the push stage, the
//! configured reorder policy.

mod core;
mod credit;
mod pending;
mod queue;
mod replay;
mod window;

pub use self::core::ScheduledQueue;
pub use queue::{QueueState, QueueStats};
