//! Byte-credit admission control

use tracing::debug;

use crate::config::UNBOUNDED_CREDITS;

/// Bounded byte budget for in-flight tasks of one stage
#[derive(Debug, Clone)]
pub struct Credits {
    enabled: bool,
    cap: u64,
    available: u64,
}

impl Credits {
    /// `None` disables credit control
    pub fn new(budget: Option<u64>) -> Self {
        debug!(?budget, "Credits::new: called");
        match budget {
            Some(cap) => Self {
                enabled: true,
                cap,
                available: cap,
            },
            None => Self {
                enabled: false,
                cap: UNBOUNDED_CREDITS,
                available: UNBOUNDED_CREDITS,
            },
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn available(&self) -> u64 {
        self.available
    }

    /// Bytes dispatched and not yet reported finished
    pub fn in_flight(&self) -> u64 {
        self.cap - self.available
    }

    pub fn admits(&self, len: u64) -> bool {
        !self.enabled || len <= self.available
    }

    pub fn acquire(&mut self, len: u64) {
        if !self.enabled {
            return;
        }
        assert!(
            len <= self.available,
            "acquiring {} bytes with only {} available",
            len,
            self.available
        );
        self.available -= len;
    }

    pub fn release(&mut self, len: u64) {
        if !self.enabled {
            return;
        }
        assert!(
            len <= self.in_flight(),
            "returning {} bytes but only {} are in flight",
            len,
            self.in_flight()
        );
        self.available += len;
    }
}
