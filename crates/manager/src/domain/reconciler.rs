//! Projection of tracker state onto the cgroup tree.
//!
//! One write per tracked instance, then a sweep that removes scopes the
//! tracker no longer knows about. Every backend call is best-effort: a
//! failed write or removal is logged and retried implicitly on the next
//! reconciliation trigger, so a single bad scope never blocks the batch.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use cpuset::CpuSet;
use tracing::error;
use tracing::warn;

use super::tracker::AllocationTracker;
use super::types::InstanceId;
use crate::platform::CgroupBackend;
use crate::platform::PathScheme;

pub struct Reconciler {
    backend: Arc<dyn CgroupBackend>,
    scheme: PathScheme,
}

impl Reconciler {
    pub fn new(backend: Arc<dyn CgroupBackend>, scheme: PathScheme) -> Self {
        Self { backend, scheme }
    }

    /// Write out the entire scope space from the given tracker snapshot,
    /// then sweep for orphans. Idempotent: repeating it with an unchanged
    /// tracker leaves the backend state unchanged.
    ///
    /// Isolating instances receive their reservation plus the pool, so a
    /// brief burst above the pinned allocation is served from shared cores
    /// instead of throttling. This is policy, not an accident.
    pub fn reconcile(&self, tracker: &AllocationTracker) {
        for id in tracker.sharing() {
            self.write(id, tracker.pool());
        }

        for (id, reserved) in tracker.isolating() {
            self.write(id, &tracker.pool().union(reserved));
        }

        self.cleanup(tracker);
    }

    fn write(&self, id: &InstanceId, cpus: &CpuSet) {
        let path = self.scheme.path_for(id);

        if let Err(err) = self.backend.create(&path) {
            error!(instance = %id, path = %path.display(), %err, "failed to create scope");
        }

        if let Err(err) = self.backend.set_cpus(&path, cpus) {
            error!(instance = %id, path = %path.display(), %err, "failed to set cpuset");
        }
    }

    /// Remove scopes under the parent that no tracked instance accounts
    /// for, leaving alone anything that still has a process attached: an
    /// agent restart with running tasks reaches here before those tasks
    /// are re-registered.
    fn cleanup(&self, tracker: &AllocationTracker) {
        let tracked: HashSet<String> = tracker
            .tracked_ids()
            .map(|id| self.scheme.scope_name(id))
            .collect();

        let children = match self.backend.list_children(self.scheme.parent_abs()) {
            Ok(children) => children,
            Err(err) => {
                error!(%err, "failed to list scopes for cleanup");
                return;
            }
        };

        for child in children {
            let Some(name) = child.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if !self.scheme.is_scope(name) || tracked.contains(name) {
                continue;
            }
            self.remove(&child);
        }
    }

    fn remove(&self, path: &Path) {
        let pids = match self.backend.attached_pids(path) {
            Ok(pids) => pids,
            Err(_) => Vec::new(),
        };
        if !pids.is_empty() {
            return;
        }

        if let Err(err) = self.backend.destroy(path) {
            warn!(path = %path.display(), %err, "failed to remove orphaned scope");
        }
    }
}
