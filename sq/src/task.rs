//! Task descriptors and pipeline stages

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::profile::ProfileContext;
use crate::readiness::ReadyEvent;

/// One phase of the communication pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Intra-node reduction onto the signal root
    Reduce,
    /// Reduction across PCIe switches on the host
    PcieReduce,
    /// Device to host copy
    #[serde(rename = "copy-d2h")]
    CopyD2H,
    /// Send to the aggregator
    Push,
    /// Receive updated values from the aggregator
    Pull,
    /// Host to device copy
    #[serde(rename = "copy-h2d")]
    CopyH2D,
    /// Intra-node broadcast from the signal root
    Broadcast,
}

impl Stage {
    /// All stages in pipeline order
    pub const ALL: [Stage; 7] = [
        Stage::Reduce,
        Stage::PcieReduce,
        Stage::CopyD2H,
        Stage::Push,
        Stage::Pull,
        Stage::CopyH2D,
        Stage::Broadcast,
    ];

    /// Whether a dispatcher for this stage consults the readiness table
    /// given this process's role
    pub fn gates_on_table(self, role: &Role) -> bool {
        match self {
            Stage::Reduce | Stage::Broadcast => role.signal_root,
            Stage::PcieReduce => role.cross_pcie_switch && role.cpu_reducer_root,
            Stage::Push => role.root_device,
            Stage::CopyH2D => !role.root_device,
            Stage::CopyD2H | Stage::Pull => false,
        }
    }

    /// Whether this stage runs credit-based admission for this role
    pub fn uses_credits(self, role: &Role) -> bool {
        self == Stage::Reduce && role.signal_root
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reduce => write!(f, "reduce"),
            Self::PcieReduce => write!(f, "pcie-reduce"),
            Self::CopyD2H => write!(f, "copy-d2h"),
            Self::Push => write!(f, "push"),
            Self::Pull => write!(f, "pull"),
            Self::CopyH2D => write!(f, "copy-h2d"),
            Self::Broadcast => write!(f, "broadcast"),
        }
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.to_string() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown stage: {}", s))
    }
}

/// Topology role of this process, injected at construction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Role {
    /// Coordinates reduce and broadcast within the node
    #[serde(rename = "signal-root")]
    pub signal_root: bool,

    /// Owns the push stage for this node
    #[serde(rename = "root-device")]
    pub root_device: bool,

    /// Node spans more than one PCIe switch
    #[serde(rename = "cross-pcie-switch")]
    pub cross_pcie_switch: bool,

    /// Root of the host-side CPU reducer
    #[serde(rename = "cpu-reducer-root")]
    pub cpu_reducer_root: bool,
}

/// Kind of data a task carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Payload {
    Gradient,
    Control,
}

impl Payload {
    /// Infer the payload from a tensor name
    pub fn from_name(name: &str) -> Self {
        if name.contains("gradient") {
            Self::Gradient
        } else {
            Self::Control
        }
    }
}

/// A schedulable partition of one tensor moving through one stage
pub struct Task {
    /// Tensor name; also the dependency name matched against the iteration head
    pub name: String,
    /// Partition key, unique per partition
    pub key: u64,
    /// Ordering key; all partitions of a tensor share it
    pub priority: i64,
    /// Byte length of the partition
    pub len: u64,
    /// Number of partitions of the parent tensor
    pub total_partnum: usize,
    pub payload: Payload,
    /// `None` means immediately eligible
    pub ready_event: Option<Arc<dyn ReadyEvent>>,
    pub context: Arc<ProfileContext>,
}

impl Task {
    /// Create a single-partition task with no readiness handle
    pub fn new(name: impl Into<String>, key: u64, priority: i64, len: u64) -> Self {
        let name = name.into();
        let payload = Payload::from_name(&name);
        Self {
            name,
            key,
            priority,
            len,
            total_partnum: 1,
            payload,
            ready_event: None,
            context: Arc::new(ProfileContext::default()),
        }
    }

    pub fn with_partitions(mut self, total_partnum: usize) -> Self {
        self.total_partnum = total_partnum;
        self
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_ready_event(mut self, event: Arc<dyn ReadyEvent>) -> Self {
        self.ready_event = Some(event);
        self
    }

    pub fn with_context(mut self, context: Arc<ProfileContext>) -> Self {
        self.context = context;
        self
    }

    pub fn is_gradient(&self) -> bool {
        self.payload == Payload::Gradient
    }

    /// Whether the readiness handle (if any) reports ready
    pub fn is_ready(&self) -> bool {
        self.ready_event.as_ref().is_none_or(|event| event.ready())
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("priority", &self.priority)
            .field("len", &self.len)
            .field("total_partnum", &self.total_partnum)
            .field("payload", &self.payload)
            .field("has_ready_event", &self.ready_event.is_some())
            .finish()
    }
}
