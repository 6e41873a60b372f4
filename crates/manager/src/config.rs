//! Manager configuration and one-shot cgroup hierarchy detection.

use std::path::PathBuf;

use serde::Deserialize;

/// Root of the cgroup filesystem, fixed by the kernel.
pub const DEFAULT_CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// Default parent slice under which all task scopes live (v2).
pub const DEFAULT_PARENT_V2: &str = "agent.slice";

/// Default parent directory for the legacy split hierarchy (v1).
pub const DEFAULT_PARENT_V1: &str = "agent";

/// Which cgroup hierarchy flavor the host runs.
///
/// Detected once at process start and threaded explicitly into whichever
/// manager constructor is chosen; there is no process-wide global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum CgroupVersion {
    /// Legacy split hierarchy (one mount per controller).
    V1,
    /// Unified hierarchy.
    V2,
}

impl CgroupVersion {
    /// Detect the hierarchy flavor of the host by checking whether the
    /// cgroup root is a cgroup2 mount. Hybrid hosts report `V1`.
    #[cfg(target_os = "linux")]
    pub fn detect() -> Self {
        let mut stat: libc::statfs = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::statfs(c"/sys/fs/cgroup".as_ptr(), &mut stat) };
        if rc == 0 && stat.f_type as i64 == libc::CGROUP2_SUPER_MAGIC as i64 {
            CgroupVersion::V2
        } else {
            CgroupVersion::V1
        }
    }

    #[cfg(not(target_os = "linux"))]
    pub fn detect() -> Self {
        CgroupVersion::V2
    }

    /// Default parent entry name for this hierarchy flavor.
    pub fn default_parent(&self) -> &'static str {
        match self {
            CgroupVersion::V1 => DEFAULT_PARENT_V1,
            CgroupVersion::V2 => DEFAULT_PARENT_V2,
        }
    }
}

/// Static configuration for the cpuset manager.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Mount point of the cgroup filesystem.
    pub cgroup_root: PathBuf,

    /// Parent entry name under which all task scopes are managed. When
    /// unset, the version-appropriate default is used. Overriding this lets
    /// the agent's tasks be further constrained by an externally configured
    /// slice.
    pub parent: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cgroup_root: PathBuf::from(DEFAULT_CGROUP_ROOT),
            parent: None,
        }
    }
}

impl Config {
    /// The effective parent entry name for the given hierarchy flavor.
    pub fn parent_for(&self, version: CgroupVersion) -> String {
        match &self.parent {
            Some(parent) if !parent.is_empty() => parent.clone(),
            _ => version.default_parent().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_falls_back_to_version_default() {
        let config = Config::default();
        assert_eq!(config.parent_for(CgroupVersion::V2), "agent.slice");
        assert_eq!(config.parent_for(CgroupVersion::V1), "agent");

        let config = Config {
            parent: Some("batch.slice".to_string()),
            ..Config::default()
        };
        assert_eq!(config.parent_for(CgroupVersion::V2), "batch.slice");
    }

    #[test]
    fn empty_parent_override_is_ignored() {
        let config = Config {
            parent: Some(String::new()),
            ..Config::default()
        };
        assert_eq!(config.parent_for(CgroupVersion::V2), "agent.slice");
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.cgroup_root, PathBuf::from("/sys/fs/cgroup"));
        assert!(config.parent.is_none());
    }
}
