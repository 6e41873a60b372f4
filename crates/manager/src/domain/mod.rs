//! Core partitioning logic: allocation tracking, reconciliation, the
//! path waiter, and the public facade.

pub mod manager;
pub mod reconciler;
pub mod tracker;
pub mod types;
pub mod waiter;

pub use manager::CpusetManager;
pub use reconciler::Reconciler;
pub use tracker::AllocationTracker;
pub use types::Allocation;
pub use types::CpusetError;
pub use types::InstanceId;
pub use types::TaskResources;
pub use waiter::CgroupPathGetter;
