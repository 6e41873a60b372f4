//! Unified-hierarchy (cgroup v2) filesystem backend.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use cpuset::CpuSet;
use tracing::debug;

use super::backend::BackendError;
use super::backend::CgroupBackend;

const CPUSET_CPUS: &str = "cpuset.cpus";
const CPUSET_CPUS_EFFECTIVE: &str = "cpuset.cpus.effective";
const CGROUP_PROCS: &str = "cgroup.procs";
const SUBTREE_CONTROL: &str = "cgroup.subtree_control";

/// Backend for hosts running the unified hierarchy. Paths arrive absolute
/// (composed by the path scheme), so the backend itself is stateless and
/// works equally against the real mount or a scratch directory tree.
#[derive(Debug, Default)]
pub struct CgroupFsV2;

impl CgroupFsV2 {
    pub fn new() -> Self {
        Self
    }

    fn read_file(path: &Path, name: &str) -> Result<String, BackendError> {
        let file = path.join(name);
        fs::read_to_string(&file).map_err(|source| BackendError::io(file, source))
    }

    fn write_file(path: &Path, name: &str, contents: &str) -> Result<(), BackendError> {
        let file = path.join(name);
        fs::write(&file, contents).map_err(|source| BackendError::io(file, source))
    }
}

impl CgroupBackend for CgroupFsV2 {
    fn create(&self, path: &Path) -> Result<(), BackendError> {
        fs::create_dir_all(path).map_err(|source| BackendError::io(path, source))?;

        // The cpuset controller must be delegated by the parent before a
        // child scope can be restricted. The write fails on kernels without
        // the controller and on scratch trees; the subsequent set_cpus
        // reports the real problem in that case.
        if let Some(parent) = path.parent() {
            if let Err(err) = Self::write_file(parent, SUBTREE_CONTROL, "+cpuset") {
                debug!(path = %parent.display(), %err, "could not enable cpuset controller");
            }
        }
        Ok(())
    }

    fn set_cpus(&self, path: &Path, cpus: &CpuSet) -> Result<(), BackendError> {
        Self::write_file(path, CPUSET_CPUS, &cpus.to_string())
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn attached_pids(&self, path: &Path) -> Result<Vec<u32>, BackendError> {
        let contents = Self::read_file(path, CGROUP_PROCS)?;
        Ok(contents
            .lines()
            .filter_map(|line| line.trim().parse().ok())
            .collect())
    }

    fn destroy(&self, path: &Path) -> Result<(), BackendError> {
        match fs::remove_dir(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(BackendError::io(path, source)),
        }
    }

    fn list_children(&self, parent: &Path) -> Result<Vec<PathBuf>, BackendError> {
        let entries =
            fs::read_dir(parent).map_err(|source| BackendError::io(parent, source))?;

        let mut children = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| BackendError::io(parent, source))?;
            if entry.path().is_dir() {
                children.push(entry.path());
            }
        }
        Ok(children)
    }

    fn read_effective_cpus(&self, path: &Path) -> Result<CpuSet, BackendError> {
        let contents = Self::read_file(path, CPUSET_CPUS_EFFECTIVE)?;
        contents.parse().map_err(|source| BackendError::InvalidCpuList {
            path: path.join(CPUSET_CPUS_EFFECTIVE),
            source,
        })
    }
}
