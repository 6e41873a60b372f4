//! In-memory backend test double.
//!
//! Keeps the whole hierarchy as a path-keyed map so reconciliation tests
//! can assert on the exact projected state, inject attached PIDs, and flip
//! on a failure mode to exercise the best-effort write paths.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use cpuset::CpuSet;

use super::backend::BackendError;
use super::backend::CgroupBackend;

/// One simulated cgroup entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockEntry {
    /// Last core set written, if any.
    pub cpus: Option<CpuSet>,
    /// PIDs attached to the entry.
    pub pids: Vec<u32>,
}

#[derive(Debug, Default)]
struct MockState {
    entries: BTreeMap<PathBuf, MockEntry>,
    fail_writes: bool,
}

/// Mock cgroup backend for testing.
#[derive(Debug, Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed an entry, as if some earlier agent run had created it.
    pub fn seed(&self, path: impl Into<PathBuf>) {
        let mut state = self.state.lock().unwrap();
        state.entries.entry(path.into()).or_default();
    }

    /// Attach a PID to an existing entry.
    pub fn attach_pid(&self, path: &Path, pid: u32) {
        let mut state = self.state.lock().unwrap();
        state
            .entries
            .get_mut(path)
            .expect("attach_pid on missing entry")
            .pids
            .push(pid);
    }

    /// Make create/set_cpus/destroy fail until disabled again.
    pub fn set_fail_writes(&self, enabled: bool) {
        self.state.lock().unwrap().fail_writes = enabled;
    }

    /// Full copy of the simulated hierarchy, for idempotence assertions.
    pub fn snapshot(&self) -> BTreeMap<PathBuf, MockEntry> {
        self.state.lock().unwrap().entries.clone()
    }

    /// Core set last written to an entry, if the entry exists and has one.
    pub fn cpus_of(&self, path: &Path) -> Option<CpuSet> {
        let state = self.state.lock().unwrap();
        state.entries.get(path).and_then(|entry| entry.cpus.clone())
    }

    fn write_error(path: &Path) -> BackendError {
        BackendError::io(
            path,
            io::Error::new(io::ErrorKind::PermissionDenied, "injected write failure"),
        )
    }
}

impl CgroupBackend for MockBackend {
    fn create(&self, path: &Path) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(Self::write_error(path));
        }
        state.entries.entry(path.to_path_buf()).or_default();
        Ok(())
    }

    fn set_cpus(&self, path: &Path, cpus: &CpuSet) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(Self::write_error(path));
        }
        let entry = state.entries.get_mut(path).ok_or_else(|| {
            BackendError::io(path, io::Error::from(io::ErrorKind::NotFound))
        })?;
        entry.cpus = Some(cpus.clone());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.state.lock().unwrap().entries.contains_key(path)
    }

    fn attached_pids(&self, path: &Path) -> Result<Vec<u32>, BackendError> {
        let state = self.state.lock().unwrap();
        let entry = state.entries.get(path).ok_or_else(|| {
            BackendError::io(path, io::Error::from(io::ErrorKind::NotFound))
        })?;
        Ok(entry.pids.clone())
    }

    fn destroy(&self, path: &Path) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(Self::write_error(path));
        }
        if let Some(entry) = state.entries.get(path) {
            // the kernel refuses to remove a cgroup with attached processes
            if !entry.pids.is_empty() {
                return Err(BackendError::io(
                    path,
                    io::Error::new(io::ErrorKind::ResourceBusy, "cgroup not empty"),
                ));
            }
            state.entries.remove(path);
        }
        Ok(())
    }

    fn list_children(&self, parent: &Path) -> Result<Vec<PathBuf>, BackendError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .entries
            .keys()
            .filter(|path| path.parent() == Some(parent))
            .cloned()
            .collect())
    }

    fn read_effective_cpus(&self, path: &Path) -> Result<CpuSet, BackendError> {
        let state = self.state.lock().unwrap();
        let entry = state.entries.get(path).ok_or_else(|| {
            BackendError::io(path, io::Error::from(io::ErrorKind::NotFound))
        })?;
        Ok(entry.cpus.clone().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_set_and_list() {
        let backend = MockBackend::new();
        let parent = PathBuf::from("/sys/fs/cgroup/agent.slice");
        let scope = parent.join("a1.web.scope");

        backend.create(&scope).unwrap();
        assert!(backend.exists(&scope));

        backend.set_cpus(&scope, &CpuSet::new([0, 1])).unwrap();
        assert_eq!(backend.cpus_of(&scope), Some(CpuSet::new([0, 1])));

        assert_eq!(backend.list_children(&parent).unwrap(), vec![scope]);
    }

    #[test]
    fn destroy_refuses_busy_entries() {
        let backend = MockBackend::new();
        let scope = PathBuf::from("/sys/fs/cgroup/agent.slice/a1.web.scope");
        backend.create(&scope).unwrap();
        backend.attach_pid(&scope, 42);

        assert!(backend.destroy(&scope).is_err());
        assert!(backend.exists(&scope));
    }

    #[test]
    fn fail_writes_mode() {
        let backend = MockBackend::new();
        let scope = PathBuf::from("/sys/fs/cgroup/agent.slice/a1.web.scope");

        backend.set_fail_writes(true);
        assert!(backend.create(&scope).is_err());

        backend.set_fail_writes(false);
        backend.create(&scope).unwrap();
    }
}
