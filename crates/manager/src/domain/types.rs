//! Core types and the manager's unified error enum.

use std::collections::HashMap;
use std::fmt;

use cpuset::CpuSet;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::platform::BackendError;

/// Unified error type for cpuset manager operations.
#[derive(Debug, Error)]
pub enum CpusetError {
    /// The parent cgroup entry could not be prepared; the node's resource
    /// hierarchy is unusable. Fatal to `init`.
    #[error("cgroup backend unavailable: {0}")]
    BackendUnavailable(#[source] BackendError),

    /// Malformed cpulist text.
    #[error(transparent)]
    InvalidFormat(#[from] cpuset::ParseError),

    /// A path wait was cancelled by the caller.
    #[error("cgroup path wait cancelled")]
    Cancelled,

    /// A path wait outlived its deadline.
    #[error("cgroup path wait deadline exceeded")]
    DeadlineExceeded,
}

/// Result type for cpuset manager operations.
pub type Result<T> = std::result::Result<T, CpusetError>;

/// Uniquely identifies one task instance within the flat scope namespace:
/// one task of one allocation.
///
/// Removal matches on the `alloc_id` field, so allocation IDs can never
/// shadow each other the way string-prefix matching would allow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId {
    alloc_id: String,
    task: String,
}

impl InstanceId {
    /// Build an instance identifier.
    ///
    /// # Panics
    ///
    /// Panics on an empty allocation ID or task name; an ambiguous key here
    /// is a programmer error, not a runtime condition.
    pub fn new(alloc_id: impl Into<String>, task: impl Into<String>) -> Self {
        let alloc_id = alloc_id.into();
        let task = task.into();
        assert!(
            !alloc_id.is_empty() && !task.is_empty(),
            "empty allocation id or task name"
        );
        Self { alloc_id, task }
    }

    pub fn alloc_id(&self) -> &str {
        &self.alloc_id
    }

    pub fn task(&self) -> &str {
        &self.task
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.alloc_id, self.task)
    }
}

/// Per-task CPU resources as handed down by the placement layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskResources {
    /// Cores this task demands exclusively. Empty means the task runs on
    /// the shared pool.
    #[serde(default)]
    pub reserved_cores: CpuSet,
}

/// A group of task instances scheduled together onto this machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub id: String,
    /// Task name to its resources. An empty map is a valid, speculative
    /// allocation and a no-op for tracking.
    #[serde(default)]
    pub tasks: HashMap<String, TaskResources>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_id_display_is_alloc_dot_task() {
        let id = InstanceId::new("a1b2", "web");
        assert_eq!(id.to_string(), "a1b2.web");
        assert_eq!(id.alloc_id(), "a1b2");
        assert_eq!(id.task(), "web");
    }

    #[test]
    #[should_panic(expected = "empty allocation id or task name")]
    fn instance_id_rejects_empty_alloc() {
        let _ = InstanceId::new("", "web");
    }

    #[test]
    #[should_panic(expected = "empty allocation id or task name")]
    fn instance_id_rejects_empty_task() {
        let _ = InstanceId::new("a1b2", "");
    }
}
