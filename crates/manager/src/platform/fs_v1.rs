//! Legacy split-hierarchy (cgroup v1) filesystem backend.
//!
//! The cpuset controller mount does not inherit restrictions natively: a
//! newly created directory starts with empty `cpuset.cpus`/`cpuset.mems`
//! files and rejects attached processes until both are populated. Creation
//! therefore walks down from the controller root, copying both files from
//! each ancestor wherever the child's own file is empty. Task runners on
//! these hosts additionally expect a companion freezer cgroup with the
//! same relative path, created here alongside the cpuset entry.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use cpuset::CpuSet;
use tracing::debug;

use super::backend::BackendError;
use super::backend::CgroupBackend;

const CPUSET_CPUS: &str = "cpuset.cpus";
const CPUSET_MEMS: &str = "cpuset.mems";
const CGROUP_PROCS: &str = "cgroup.procs";

/// An unpopulated cpuset file reads as empty or a single newline.
fn is_empty_cpuset(contents: &str) -> bool {
    contents.is_empty() || contents == "\n"
}

#[derive(Debug)]
pub struct CgroupFsV1 {
    cpuset_root: PathBuf,
    freezer_root: PathBuf,
}

impl CgroupFsV1 {
    pub fn new(cgroup_root: impl AsRef<Path>) -> Self {
        let root = cgroup_root.as_ref();
        Self {
            cpuset_root: root.join("cpuset"),
            freezer_root: root.join("freezer"),
        }
    }

    /// The freezer entry mirroring a cpuset entry, if the path is inside
    /// the cpuset mount at all.
    fn companion_freezer(&self, path: &Path) -> Option<PathBuf> {
        path.strip_prefix(&self.cpuset_root)
            .ok()
            .map(|rel| self.freezer_root.join(rel))
    }

    fn read_optional(dir: &Path, name: &str) -> Result<Option<String>, BackendError> {
        let file = dir.join(name);
        match fs::read_to_string(&file) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(BackendError::io(file, source)),
        }
    }

    /// Copy `cpuset.cpus` and `cpuset.mems` from `parent` into `current`
    /// wherever `current`'s own file is still unpopulated.
    fn inherit_if_needed(current: &Path, parent: &Path) -> Result<(), BackendError> {
        for name in [CPUSET_CPUS, CPUSET_MEMS] {
            let own = Self::read_optional(current, name)?.unwrap_or_default();
            if !is_empty_cpuset(&own) {
                continue;
            }
            if let Some(inherited) = Self::read_optional(parent, name)? {
                if !is_empty_cpuset(&inherited) {
                    let file = current.join(name);
                    fs::write(&file, &inherited)
                        .map_err(|source| BackendError::io(file, source))?;
                }
            }
        }
        Ok(())
    }

    /// Create every missing directory between the controller root and
    /// `path`, propagating the cpus/mems restriction one level at a time.
    fn ensure_chain(&self, path: &Path) -> Result<(), BackendError> {
        let rel = path.strip_prefix(&self.cpuset_root).map_err(|_| {
            BackendError::io(
                path,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "path outside the cpuset controller mount",
                ),
            )
        })?;

        let mut current = self.cpuset_root.clone();
        for component in rel.components() {
            let parent = current.clone();
            current.push(component);
            if !current.is_dir() {
                fs::create_dir(&current)
                    .map_err(|source| BackendError::io(current.clone(), source))?;
            }
            Self::inherit_if_needed(&current, &parent)?;
        }
        Ok(())
    }
}

impl CgroupBackend for CgroupFsV1 {
    fn create(&self, path: &Path) -> Result<(), BackendError> {
        self.ensure_chain(path)?;

        if let Some(freezer) = self.companion_freezer(path) {
            fs::create_dir_all(&freezer)
                .map_err(|source| BackendError::io(freezer, source))?;
        }
        Ok(())
    }

    fn set_cpus(&self, path: &Path, cpus: &CpuSet) -> Result<(), BackendError> {
        let file = path.join(CPUSET_CPUS);
        fs::write(&file, cpus.to_string()).map_err(|source| BackendError::io(file, source))
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn attached_pids(&self, path: &Path) -> Result<Vec<u32>, BackendError> {
        let file = path.join(CGROUP_PROCS);
        let contents =
            fs::read_to_string(&file).map_err(|source| BackendError::io(file, source))?;
        Ok(contents
            .lines()
            .filter_map(|line| line.trim().parse().ok())
            .collect())
    }

    fn destroy(&self, path: &Path) -> Result<(), BackendError> {
        if let Some(freezer) = self.companion_freezer(path) {
            if let Err(err) = fs::remove_dir(&freezer) {
                if err.kind() != io::ErrorKind::NotFound {
                    debug!(path = %freezer.display(), %err, "freezer companion not removed");
                }
            }
        }

        match fs::remove_dir(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(_) => {
                // On real cgroupfs the cpus/mems interface files are
                // kernel-owned and vanish with the directory; on a scratch
                // tree they are regular files this backend wrote and block
                // rmdir. Drop them and retry.
                for name in [CPUSET_CPUS, CPUSET_MEMS] {
                    let _ = fs::remove_file(path.join(name));
                }
                match fs::remove_dir(path) {
                    Ok(()) => Ok(()),
                    Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                    Err(source) => Err(BackendError::io(path, source)),
                }
            }
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

    /// v1 has no `cpuset.cpus.effective`; the populated `cpuset.cpus` file
    /// is the effective view.
    fn read_effective_cpus(&self, path: &Path) -> Result<CpuSet, BackendError> {
        let contents = Self::read_optional(path, CPUSET_CPUS)?.unwrap_or_default();
        contents.parse().map_err(|source| BackendError::InvalidCpuList {
            path: path.join(CPUSET_CPUS),
            source,
        })
    }
}
