//! Contract between the manager and the cgroup filesystem.
//!
//! The manager never touches cgroupfs directly; everything goes through
//! [`CgroupBackend`] so the reconciliation logic can run against the real
//! hierarchy (v1 or v2) or an in-memory test double.

use std::io;
use std::path::Path;
use std::path::PathBuf;

use cpuset::CpuSet;
use thiserror::Error;

/// Errors surfaced by a cgroup backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("cgroup io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unreadable cpu list in {path}: {source}")]
    InvalidCpuList {
        path: PathBuf,
        #[source]
        source: cpuset::ParseError,
    },
}

impl BackendError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Operations the manager needs from the host's cgroup hierarchy.
///
/// Every operation is idempotent from the caller's point of view: creating
/// an entry that exists and destroying one that is already gone both
/// succeed, which lets reconciliation retry blindly.
pub trait CgroupBackend: Send + Sync {
    /// Create the entry at `path`, including missing ancestors.
    fn create(&self, path: &Path) -> Result<(), BackendError>;

    /// Restrict the entry at `path` to the given cores.
    fn set_cpus(&self, path: &Path, cpus: &CpuSet) -> Result<(), BackendError>;

    /// Whether an entry exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// PIDs currently attached to the entry at `path`.
    fn attached_pids(&self, path: &Path) -> Result<Vec<u32>, BackendError>;

    /// Remove the entry at `path`. Removing a missing entry is not an error.
    fn destroy(&self, path: &Path) -> Result<(), BackendError>;

    /// Immediate child entries of `parent`.
    fn list_children(&self, parent: &Path) -> Result<Vec<PathBuf>, BackendError>;

    /// The cores the entry at `path` may actually run on.
    fn read_effective_cpus(&self, path: &Path) -> Result<CpuSet, BackendError>;
}

/// Read the usable cores of a cgroup as a plain list, for wiring the
/// manager's `init` from whatever the host grants the parent entry.
pub fn usable_cores(
    backend: &dyn CgroupBackend,
    path: &Path,
) -> Result<Vec<u16>, BackendError> {
    Ok(backend.read_effective_cpus(path)?.to_vec())
}
