use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// How long a deleted project's lock instance is kept around after removal
/// is scheduled, to protect against in-flight readers/writers that grabbed
/// the instance just before the tombstone was set.
const DATABASE_MAX_LAG: Duration = Duration::from_secs(30);

/// Per-project reader/writer lock with try-semantics and a tombstone.
///
/// At any instant the number of holders is either zero, any number of
/// readers, or exactly one writer.
pub struct ProjectLock {
    inner: Arc<RwLock<()>>,
    pub deleted: AtomicBool,
}

impl ProjectLock {
    fn new() -> Self {
        ProjectLock {
            inner: Arc::new(RwLock::new(())),
            deleted: AtomicBool::new(false),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::SeqCst)
    }

    pub fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::SeqCst);
    }

    /// Blocking writer acquisition. Rules should prefer `try_exclusive_lock`;
    /// this exists for the rare caller that genuinely must wait.
    pub async fn exclusive_lock(&self) -> OwnedRwLockWriteGuard<()> {
        self.inner.clone().write_owned().await
    }

    pub fn try_exclusive_lock(&self) -> Option<OwnedRwLockWriteGuard<()>> {
        self.inner.clone().try_write_owned().ok()
    }

    pub async fn shared_lock(&self) -> OwnedRwLockReadGuard<()> {
        self.inner.clone().read_owned().await
    }

    pub fn try_shared_lock(&self) -> Option<OwnedRwLockReadGuard<()>> {
        self.inner.clone().try_read_owned().ok()
    }
}

/// Maps project id to its `ProjectLock`, allowing in-memory per-project
/// communication (e.g. preventing deletion while a project is being
/// queried).
pub struct ProjectLocker {
    map: Mutex<HashMap<i64, Arc<ProjectLock>>>,
}

impl ProjectLocker {
    pub fn new() -> Self {
        ProjectLocker {
            map: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the lock for a project, creating one on first use.
    pub async fn get(&self, project_id: i64) -> Arc<ProjectLock> {
        let mut map = self.map.lock().await;
        map.entry(project_id)
            .or_insert_with(|| Arc::new(ProjectLock::new()))
            .clone()
    }

    /// Schedules removal of a project's lock entry after a conservative
    /// replication-lag delay. Must only be called after the database write
    /// marking the project deleted has been committed.
    pub fn delete(self: &Arc<Self>, project_id: i64) {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(DATABASE_MAX_LAG).await;
            this.map.lock().await.remove(&project_id);
        });
    }
}

impl Default for ProjectLocker {
    fn default() -> Self {
        Self::new()
    }
}
