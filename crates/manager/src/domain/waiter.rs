//! Deferred, polling lookup of a task scope's path.
//!
//! The kernel gives no creation signal for cgroup directories, so the only
//! way to learn that reconciliation has materialized a scope is to poll
//! for it. The getter is handed out before the scope is guaranteed to
//! exist; the caller invokes it with its own cancellation token (and
//! usually a deadline) when it actually needs the path.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use super::types::CpusetError;
use super::types::Result;
use crate::platform::CgroupBackend;

/// How often the backend is asked whether the scope exists yet.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Deferred lookup for one instance's cgroup path.
#[derive(Clone)]
pub struct CgroupPathGetter {
    backend: Arc<dyn CgroupBackend>,
    path: PathBuf,
}

impl CgroupPathGetter {
    pub(crate) fn new(backend: Arc<dyn CgroupBackend>, path: PathBuf) -> Self {
        Self { backend, path }
    }

    /// The deterministic target path. The scope may not exist yet.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until the scope exists, checking every [`POLL_INTERVAL`].
    /// There is no retry bound: cancelling the token is the only way out,
    /// and returns [`CpusetError::Cancelled`] within one interval.
    pub async fn get(&self, token: &CancellationToken) -> Result<PathBuf> {
        loop {
            if self.backend.exists(&self.path) {
                return Ok(self.path.clone());
            }

            tokio::select! {
                _ = token.cancelled() => return Err(CpusetError::Cancelled),
                _ = time::sleep(POLL_INTERVAL) => {}
            }
        }
    }

    /// Like [`get`](Self::get), but also gives up after `deadline` with
    /// [`CpusetError::DeadlineExceeded`].
    pub async fn get_with_deadline(
        &self,
        token: &CancellationToken,
        deadline: Duration,
    ) -> Result<PathBuf> {
        match time::timeout(deadline, self.get(token)).await {
            Ok(result) => result,
            Err(_) => Err(CpusetError::DeadlineExceeded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MockBackend;

    fn getter(backend: &Arc<MockBackend>, path: &str) -> CgroupPathGetter {
        CgroupPathGetter::new(backend.clone(), PathBuf::from(path))
    }

    #[tokio::test(start_paused = true)]
    async fn returns_immediately_when_scope_exists() {
        let backend = Arc::new(MockBackend::new());
        let path = "/sys/fs/cgroup/agent.slice/a.x.scope";
        backend.seed(path);

        let token = CancellationToken::new();
        let found = getter(&backend, path).get(&token).await.unwrap();
        assert_eq!(found, PathBuf::from(path));
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_polling_until_scope_appears() {
        let backend = Arc::new(MockBackend::new());
        let path = "/sys/fs/cgroup/agent.slice/a.x.scope";

        let token = CancellationToken::new();
        let wait = {
            let getter = getter(&backend, path);
            let token = token.clone();
            tokio::spawn(async move { getter.get(&token).await })
        };

        // let the getter go through a few empty polls first
        time::sleep(POLL_INTERVAL * 3).await;
        backend.seed(path);

        let found = wait.await.unwrap().unwrap();
        assert_eq!(found, PathBuf::from(path));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_the_wait() {
        let backend = Arc::new(MockBackend::new());
        let token = CancellationToken::new();

        let wait = {
            let getter = getter(&backend, "/sys/fs/cgroup/agent.slice/never.scope");
            let token = token.clone();
            tokio::spawn(async move { getter.get(&token).await })
        };

        time::sleep(POLL_INTERVAL).await;
        token.cancel();

        let result = wait.await.unwrap();
        assert!(matches!(result, Err(CpusetError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_maps_to_deadline_exceeded() {
        let backend = Arc::new(MockBackend::new());
        let token = CancellationToken::new();
        let getter = getter(&backend, "/sys/fs/cgroup/agent.slice/never.scope");

        let result = getter
            .get_with_deadline(&token, Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(CpusetError::DeadlineExceeded)));
    }
}
