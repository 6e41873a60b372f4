//! CPU-set partitioning for a cluster-node agent.
//!
//! Task instances placed on this machine either reserve cores exclusively
//! or share a common pool of whatever remains. This crate tracks those
//! reservations, recomputes the shared pool on every change, and projects
//! the result onto the host's cgroup hierarchy (v1 or v2) through an
//! idempotent reconciliation pass with an orphan-cleanup sweep.
//!
//! It is a library boundary only: the host agent constructs a
//! [`CpusetManager`], calls `init` with the machine's usable cores, and
//! feeds it allocation add/remove events. Task runners obtain their scope
//! path through the polling [`CgroupPathGetter`].

pub mod config;
pub mod domain;
pub mod logging;
pub mod platform;

pub use config::CgroupVersion;
pub use config::Config;
pub use domain::manager::CpusetManager;
pub use domain::types::Allocation;
pub use domain::types::CpusetError;
pub use domain::types::InstanceId;
pub use domain::types::TaskResources;
pub use domain::waiter::CgroupPathGetter;
pub use platform::BackendError;
pub use platform::CgroupBackend;
pub use platform::MockBackend;
pub use platform::PathScheme;
