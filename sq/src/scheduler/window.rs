//! Time-windowed throttle for push-stage gradients

use tracing::debug;

use crate::config::WindowSchedule;

/// Whether the current window is still accepting work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WindowState {
    Open,
    /// The window just expired; the budget has been refilled for the next one
    Rolled,
}

/// Meters bytes per window of the profiled backward timeline
///
/// The timeline starts when the first tensor of an iteration is submitted.
/// Within a window at most `budget` bytes are released; once every window
/// has elapsed the throttle lets everything through until the next
/// iteration head arrives.
#[derive(Debug)]
pub(crate) struct WindowThrottle {
    windows_us: Vec<i64>,
    max_budget: u64,
    budget: u64,
    index: usize,
    deadline_us: i64,
    begin_name: Option<String>,
}

impl WindowThrottle {
    pub fn new(schedule: &WindowSchedule, begin_name: Option<String>) -> Self {
        let windows_us = schedule.windows_us();
        debug!(?windows_us, budget = schedule.budget, "WindowThrottle::new: called");
        Self {
            index: windows_us.len(),
            windows_us,
            max_budget: schedule.budget,
            budget: schedule.budget,
            deadline_us: 0,
            begin_name,
        }
    }

    pub fn is_iteration_head(&self, name: &str) -> bool {
        self.begin_name
            .as_deref()
            .is_some_and(|begin| !begin.is_empty() && name.contains(begin))
    }

    /// Restart the timeline at `now_us`
    pub fn restart(&mut self, now_us: i64) {
        self.index = 0;
        self.budget = self.max_budget;
        self.deadline_us = now_us + self.windows_us.first().copied().unwrap_or(0);
        debug!(now_us, deadline_us = self.deadline_us, "WindowThrottle::restart: timeline started");
    }

    pub fn exhausted(&self) -> bool {
        self.index >= self.windows_us.len()
    }

    pub fn poll(&mut self, now_us: i64) -> WindowState {
        if now_us <= self.deadline_us || self.exhausted() {
            return WindowState::Open;
        }
        self.budget = self.max_budget;
        self.index += 1;
        if let Some(window) = self.windows_us.get(self.index) {
            self.deadline_us += window;
        }
        debug!(index = self.index, deadline_us = self.deadline_us, "WindowThrottle::poll: window rolled");
        WindowState::Rolled
    }

    pub fn admits(&self, len: u64) -> bool {
        self.exhausted() || len <= self.budget
    }

    pub fn consume(&mut self, len: u64) {
        self.budget = self.budget.saturating_sub(len);
    }

    #[cfg(test)]
    pub fn budget(&self) -> u64 {
        self.budget
    }
}
