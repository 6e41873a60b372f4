//! In-memory tracking of which instances share the pool and which hold
//! exclusive cores.
//!
//! The tracker is authoritative for intent only; the cgroup tree is a
//! convergent projection of it, rebuilt on every reconciliation. Locking
//! belongs to the owner (the facade), so this struct stays plain and
//! directly unit-testable.

use std::collections::HashMap;
use std::collections::HashSet;

use cpuset::CpuSet;

use super::types::Allocation;
use super::types::InstanceId;

#[derive(Debug, Default)]
pub struct AllocationTracker {
    /// Cores the manager was initialized with. Set once, never mutated.
    initial: CpuSet,
    /// Cores currently available to sharing instances. Derived; recomputed
    /// on every mutation.
    pool: CpuSet,
    /// Instances that consume only the pool.
    sharing: HashSet<InstanceId>,
    /// Instances that each exclusively own a set of cores.
    ///
    /// Overlap between two reservations is a contract violation by the
    /// placement layer and is not detected here; the recalculation simply
    /// subtracts the union, shrinking the pool accordingly.
    isolating: HashMap<InstanceId, CpuSet>,
}

impl AllocationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the machine's usable cores. Called exactly once from `init`.
    pub fn set_initial(&mut self, cores: CpuSet) {
        self.initial = cores;
        self.recalculate();
    }

    pub fn initial(&self) -> &CpuSet {
        &self.initial
    }

    pub fn pool(&self) -> &CpuSet {
        &self.pool
    }

    pub fn sharing(&self) -> impl Iterator<Item = &InstanceId> {
        self.sharing.iter()
    }

    pub fn isolating(&self) -> impl Iterator<Item = (&InstanceId, &CpuSet)> {
        self.isolating.iter()
    }

    /// All tracked instance identifiers, for the cleanup sweep.
    pub fn tracked_ids(&self) -> impl Iterator<Item = &InstanceId> {
        self.sharing.iter().chain(self.isolating.keys())
    }

    /// Track every task of an allocation. A task with a non-empty reserved
    /// set isolates on it (overwriting any previous reservation); every
    /// other task joins the pool. An allocation without tasks is a valid
    /// speculative call and leaves tracking unchanged.
    pub fn add_allocation(&mut self, alloc: &Allocation) {
        for (task, resources) in &alloc.tasks {
            let id = InstanceId::new(&alloc.id, task);
            if resources.reserved_cores.is_empty() {
                self.isolating.remove(&id);
                self.sharing.insert(id);
            } else {
                self.sharing.remove(&id);
                self.isolating.insert(id, resources.reserved_cores.clone());
            }
        }
        self.recalculate();
    }

    /// Drop every tracked instance belonging to `alloc_id`. Unknown
    /// allocations are an idempotent no-op.
    pub fn remove_allocation(&mut self, alloc_id: &str) {
        self.sharing.retain(|id| id.alloc_id() != alloc_id);
        self.isolating.retain(|id, _| id.alloc_id() != alloc_id);
        self.recalculate();
    }

    /// pool = initial − union of all exclusive reservations.
    fn recalculate(&mut self) {
        let mut remaining = self.initial.clone();
        for reserved in self.isolating.values() {
            remaining = remaining.difference(reserved);
        }
        self.pool = remaining;
    }
}
