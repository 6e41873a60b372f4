//! Host-facing bindings: the cgroup backend contract, its v1/v2
//! filesystem implementations, the instance-to-path naming schemes, and
//! an in-memory test double.

pub mod backend;
pub mod fs_v1;
pub mod fs_v2;
pub mod mock;
pub mod scheme;

pub use backend::usable_cores;
pub use backend::BackendError;
pub use backend::CgroupBackend;
pub use fs_v1::CgroupFsV1;
pub use fs_v2::CgroupFsV2;
pub use mock::MockBackend;
pub use scheme::PathScheme;
