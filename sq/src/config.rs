//! Dispatcher configuration types and loading

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::task::Role;

/// Default upper bound on a partition's byte length
pub const DEFAULT_PARTITION_BOUND: u64 = 4_096_000;

/// Credit budget used when credit control is off (32 GiB)
pub const UNBOUNDED_CREDITS: u64 = 32 * 1024 * 1024 * 1024;

/// Batch size the backward timeline was profiled at
pub const REFERENCE_BATCH_SIZE: u32 = 64;

/// Permit cap of the counted door
pub const DEFAULT_DOOR_LIMIT: u32 = 11;

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub queue: QueueConfig,
    pub role: Role,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: .stagequeue.yml
        let local_config = PathBuf::from(".stagequeue.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/stagequeue/stagequeue.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("stagequeue").join("stagequeue.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.queue.validate().context("Invalid queue configuration")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Dispatch strategy for push-stage gradient tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Plain priority scan, same as every other stage
    #[default]
    Plain,
    /// Replay a precomputed token sequence behind the iteration door
    TokenReplay,
    /// Meter bytes per window of a profiled backward timeline
    TimeWindow,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::TokenReplay => write!(f, "token-replay"),
            Self::TimeWindow => write!(f, "time-window"),
        }
    }
}

/// When the iteration door reopens after the boundary tensor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "mode")]
pub enum DoorPolicy {
    /// One completion reopens the door for one more tensor group
    #[default]
    Boundary,
    /// Each completion banks a permit, up to `limit`
    Counted {
        #[serde(default = "default_door_limit")]
        limit: u32,
    },
}

fn default_door_limit() -> u32 {
    DEFAULT_DOOR_LIMIT
}

/// Static emission order for one training iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTable {
    /// Expected priorities, consumed front to back
    pub tokens: Vec<i64>,

    /// Priority of the tensor that ends the iteration
    pub boundary: i64,

    /// Distinct tensors dispatched per iteration
    #[serde(rename = "total-tensors")]
    pub total_tensors: usize,
}

impl ScheduleTable {
    /// A table whose total is its token count
    pub fn new(tokens: Vec<i64>, boundary: i64) -> Self {
        let total_tensors = tokens.len();
        Self {
            tokens,
            boundary,
            total_tensors,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tokens.is_empty() {
            return Err(ConfigError::EmptySchedule);
        }
        if self.total_tensors == 0 {
            return Err(ConfigError::ZeroTensorCount);
        }
        if self.total_tensors < self.tokens.len() {
            return Err(ConfigError::TensorCountTooSmall {
                total: self.total_tensors,
                tokens: self.tokens.len(),
            });
        }
        if !self.tokens.contains(&self.boundary) {
            return Err(ConfigError::BoundaryNotScheduled { boundary: self.boundary });
        }
        Ok(())
    }
}

/// Profiled backward timeline driving the time-windowed throttle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSchedule {
    /// Backward execution time of each window in milliseconds
    #[serde(rename = "backward-ms")]
    pub backward_ms: Vec<f64>,

    /// Training batch size; timings scale linearly from the reference batch
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: u32,

    /// Extra scaling factor applied to every window
    #[serde(default = "default_scale")]
    pub scale: f64,

    /// Bytes admitted per window
    #[serde(default = "default_window_budget")]
    pub budget: u64,
}

fn default_batch_size() -> u32 {
    REFERENCE_BATCH_SIZE
}

fn default_scale() -> f64 {
    1.0
}

fn default_window_budget() -> u64 {
    4 * DEFAULT_PARTITION_BOUND
}

impl WindowSchedule {
    pub fn new(backward_ms: Vec<f64>, budget: u64) -> Self {
        Self {
            backward_ms,
            batch_size: default_batch_size(),
            scale: default_scale(),
            budget,
        }
    }

    /// Window lengths in microseconds after batch and scale adjustment
    pub fn windows_us(&self) -> Vec<i64> {
        let factor = f64::from(self.batch_size) / f64::from(REFERENCE_BATCH_SIZE) * self.scale;
        self.backward_ms
            .iter()
            .map(|ms| (ms * factor * 1_000.0).round() as i64)
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backward_ms.is_empty() {
            return Err(ConfigError::EmptyWindow);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        Ok(())
    }
}

/// Per-dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Upper bound on a partition's byte length
    #[serde(rename = "partition-bound")]
    pub partition_bound: u64,

    /// Devices in the local reduction group
    #[serde(rename = "group-size")]
    pub group_size: usize,

    /// Partitions of credit in flight; `None` means `group_size + 1`, zero
    /// disables credit control
    #[serde(rename = "credit-multiplier")]
    pub credit_multiplier: Option<usize>,

    /// Push-stage gradient strategy
    pub strategy: Strategy,

    /// Name fragment of the first tensor of an iteration
    #[serde(rename = "begin-name")]
    pub begin_name: Option<String>,

    /// Required by `token-replay`
    pub schedule: Option<ScheduleTable>,

    /// Required by `time-window`
    pub window: Option<WindowSchedule>,

    pub door: DoorPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            partition_bound: DEFAULT_PARTITION_BOUND,
            group_size: 8,
            credit_multiplier: None,
            strategy: Strategy::Plain,
            begin_name: None,
            schedule: None,
            window: None,
            door: DoorPolicy::Boundary,
        }
    }
}

impl QueueConfig {
    /// Effective credit multiplier
    pub fn credit_multiplier(&self) -> usize {
        self.credit_multiplier.unwrap_or(self.group_size.saturating_add(1))
    }

    /// Byte budget when credit control is on, `None` if it overflows
    pub fn checked_credit_budget(&self) -> Option<u64> {
        u64::try_from(self.credit_multiplier())
            .ok()
            .and_then(|multiplier| self.partition_bound.checked_mul(multiplier))
    }

    /// Byte budget when credit control is on
    ///
    /// Saturates for configurations that `validate` rejects.
    pub fn credit_budget(&self) -> u64 {
        self.checked_credit_budget().unwrap_or(u64::MAX)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.checked_credit_budget().is_none() {
            return Err(ConfigError::CreditBudgetOverflow {
                partition_bound: self.partition_bound,
                multiplier: self.credit_multiplier(),
            });
        }
        match self.strategy {
            Strategy::Plain => {}
            Strategy::TokenReplay => self
                .schedule
                .as_ref()
                .ok_or(ConfigError::MissingSchedule {
                    strategy: self.strategy,
                })?
                .validate()?,
            Strategy::TimeWindow => self
                .window
                .as_ref()
                .ok_or(ConfigError::MissingWindow {
                    strategy: self.strategy,
                })?
                .validate()?,
        }
        Ok(())
    }
}
