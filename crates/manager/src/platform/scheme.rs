//! Mapping from instance identifiers to cgroup paths.
//!
//! The two hierarchy flavors name scopes differently: the unified
//! hierarchy nests `<allocID>.<taskName>.scope` directly under the parent
//! slice, while the legacy hierarchy nests `<taskName>.<allocID>` under a
//! version-specific parent inside the cpuset controller mount. External
//! tooling inspects these names, so they are fixed.

use std::path::Path;
use std::path::PathBuf;

use crate::config::CgroupVersion;
use crate::config::Config;
use crate::domain::types::InstanceId;

/// Scope suffix used by the unified hierarchy.
const SCOPE_SUFFIX: &str = ".scope";

/// Renders instance identifiers into scope directory names and back.
#[derive(Debug, Clone)]
pub struct PathScheme {
    version: CgroupVersion,
    parent: String,
    parent_abs: PathBuf,
}

impl PathScheme {
    pub fn new(config: &Config, version: CgroupVersion) -> Self {
        let parent = config.parent_for(version);
        let parent_abs = match version {
            CgroupVersion::V2 => config.cgroup_root.join(&parent),
            // v1 scopes live inside the cpuset controller mount
            CgroupVersion::V1 => config.cgroup_root.join("cpuset").join(&parent),
        };
        Self {
            version,
            parent,
            parent_abs,
        }
    }

    /// Parent entry name, relative to the hierarchy root.
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// Absolute path of the parent entry.
    pub fn parent_abs(&self) -> &Path {
        &self.parent_abs
    }

    /// Directory name of the scope for one task instance.
    pub fn scope_name(&self, id: &InstanceId) -> String {
        match self.version {
            CgroupVersion::V2 => format!("{}.{}{SCOPE_SUFFIX}", id.alloc_id(), id.task()),
            CgroupVersion::V1 => format!("{}.{}", id.task(), id.alloc_id()),
        }
    }

    /// Absolute path of the scope for one task instance.
    pub fn path_for(&self, id: &InstanceId) -> PathBuf {
        self.parent_abs.join(self.scope_name(id))
    }

    /// Whether a directory name under the parent looks like a scope this
    /// manager owns. Anything else under the parent is left alone by the
    /// cleanup sweep.
    pub fn is_scope(&self, name: &str) -> bool {
        match self.version {
            CgroupVersion::V2 => name.ends_with(SCOPE_SUFFIX),
            CgroupVersion::V1 => name.contains('.'),
        }
    }
}
