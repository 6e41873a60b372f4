//! The public manager facade.
//!
//! Mutations take the write lock, recompute the pool, release the lock,
//! and only then reconcile under the read lock: reconciliation does
//! blocking backend I/O and must never hold up other tracker mutations.
//! Two back-to-back reconcile passes may interleave their writes, which is
//! safe because each pass rewrites full state and the last completed pass
//! wins per scope.

use std::sync::Arc;
use std::sync::RwLock;

use cpuset::CpuSet;
use tracing::debug;
use tracing::info;

use super::reconciler::Reconciler;
use super::tracker::AllocationTracker;
use super::types::Allocation;
use super::types::CpusetError;
use super::types::InstanceId;
use super::types::Result;
use super::waiter::CgroupPathGetter;
use crate::config::CgroupVersion;
use crate::config::Config;
use crate::platform::CgroupBackend;
use crate::platform::CgroupFsV1;
use crate::platform::CgroupFsV2;
use crate::platform::PathScheme;

pub struct CpusetManager {
    backend: Arc<dyn CgroupBackend>,
    scheme: PathScheme,
    reconciler: Reconciler,
    state: RwLock<AllocationTracker>,
}

impl CpusetManager {
    /// Build a manager on an explicit backend. Test entry point, and the
    /// seam for anything that is not a plain cgroup filesystem.
    pub fn new(backend: Arc<dyn CgroupBackend>, scheme: PathScheme) -> Self {
        let reconciler = Reconciler::new(backend.clone(), scheme.clone());
        Self {
            backend,
            scheme,
            reconciler,
            state: RwLock::new(AllocationTracker::new()),
        }
    }

    /// Build a manager for the host's cgroup hierarchy. `version` comes
    /// from a one-time [`CgroupVersion::detect`] at process start and is
    /// threaded in explicitly.
    pub fn from_config(config: &Config, version: CgroupVersion) -> Self {
        let scheme = PathScheme::new(config, version);
        let backend: Arc<dyn CgroupBackend> = match version {
            CgroupVersion::V2 => Arc::new(CgroupFsV2::new()),
            CgroupVersion::V1 => Arc::new(CgroupFsV1::new(&config.cgroup_root)),
        };
        Self::new(backend, scheme)
    }

    /// Prepare the parent entry and record the machine's usable cores.
    /// Must be called once before any allocation mutation; failing fast
    /// here is the one place tracker setup talks to the backend directly.
    pub fn init(&self, cores: &[u16]) -> Result<()> {
        info!(parent = %self.scheme.parent(), ?cores, "initializing cpuset manager");

        self.backend
            .create(self.scheme.parent_abs())
            .map_err(CpusetError::BackendUnavailable)?;

        let mut state = self.state.write().expect("poisoning");
        state.set_initial(CpuSet::new(cores.iter().copied()));
        Ok(())
    }

    /// Track an allocation's tasks and project the result onto the cgroup
    /// tree. Reconciliation runs even when the allocation adds nothing:
    /// an add can follow a crash restart where on-disk state is stale.
    pub fn add_alloc(&self, alloc: &Allocation) {
        debug!(alloc_id = %alloc.id, tasks = alloc.tasks.len(), "add allocation");

        {
            let mut state = self.state.write().expect("poisoning");
            state.add_allocation(alloc);
        }

        self.reconcile();
    }

    /// Stop tracking every task of an allocation; the subsequent sweep
    /// removes their scopes. Removing an unknown allocation still
    /// reconciles, for the same self-healing reason as `add_alloc`.
    pub fn remove_alloc(&self, alloc_id: &str) {
        info!(alloc_id, "remove allocation");

        {
            let mut state = self.state.write().expect("poisoning");
            state.remove_allocation(alloc_id);
        }

        self.reconcile();
    }

    /// Deferred lookup of the scope path for one task instance. Safe to
    /// call before the corresponding `add_alloc`; the getter polls until a
    /// later reconciliation materializes the scope.
    pub fn cgroup_path_for(&self, alloc_id: &str, task: &str) -> CgroupPathGetter {
        let id = InstanceId::new(alloc_id, task);
        CgroupPathGetter::new(self.backend.clone(), self.scheme.path_for(&id))
    }

    fn reconcile(&self) {
        let state = self.state.read().expect("poisoning");
        self.reconciler.reconcile(&state);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;

    use super::*;
    use crate::domain::types::TaskResources;
    use crate::platform::MockBackend;

    fn manager() -> (Arc<MockBackend>, CpusetManager) {
        let backend = Arc::new(MockBackend::new());
        let scheme = PathScheme::new(&Config::default(), CgroupVersion::V2);
        let manager = CpusetManager::new(backend.clone(), scheme);
        (backend, manager)
    }

    fn alloc(id: &str, task: &str, reserved: &[u16]) -> Allocation {
        Allocation {
            id: id.to_string(),
            tasks: HashMap::from([(
                task.to_string(),
                TaskResources {
                    reserved_cores: CpuSet::new(reserved.iter().copied()),
                },
            )]),
        }
    }

    #[test]
    fn init_creates_the_parent_entry() {
        let (backend, manager) = manager();
        manager.init(&[0, 1, 2, 3]).unwrap();
        assert!(backend.exists(Path::new("/sys/fs/cgroup/agent.slice")));
    }

    #[test]
    fn init_surfaces_backend_unavailable() {
        let (backend, manager) = manager();
        backend.set_fail_writes(true);

        let err = manager.init(&[0, 1]).unwrap_err();
        assert!(matches!(err, CpusetError::BackendUnavailable(_)));
    }

    #[test]
    fn add_alloc_writes_scopes_immediately() {
        let (backend, manager) = manager();
        manager.init(&[0, 1, 2, 3]).unwrap();

        manager.add_alloc(&alloc("a", "x", &[2, 3]));
        manager.add_alloc(&alloc("b", "y", &[]));

        let parent = Path::new("/sys/fs/cgroup/agent.slice");
        assert_eq!(
            backend.cpus_of(&parent.join("a.x.scope")),
            Some(CpuSet::new([0, 1, 2, 3]))
        );
        assert_eq!(
            backend.cpus_of(&parent.join("b.y.scope")),
            Some(CpuSet::new([0, 1]))
        );
    }

    #[test]
    fn remove_alloc_sweeps_the_scope_and_regrows_the_pool() {
        let (backend, manager) = manager();
        manager.init(&[0, 1, 2, 3]).unwrap();
        manager.add_alloc(&alloc("a", "x", &[2, 3]));
        manager.add_alloc(&alloc("b", "y", &[]));

        manager.remove_alloc("a");

        let parent = Path::new("/sys/fs/cgroup/agent.slice");
        assert!(!backend.exists(&parent.join("a.x.scope")));
        assert_eq!(
            backend.cpus_of(&parent.join("b.y.scope")),
            Some(CpuSet::new([0, 1, 2, 3]))
        );
    }

    #[test]
    fn remove_of_unknown_allocation_still_sweeps_orphans() {
        let (backend, manager) = manager();
        manager.init(&[0, 1]).unwrap();

        let orphan = Path::new("/sys/fs/cgroup/agent.slice").join("stale.task.scope");
        backend.seed(&orphan);

        manager.remove_alloc("nothing-tracked-here");
        assert!(!backend.exists(&orphan));
    }
}
