use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::utils::{self, DateTime};

// Grants not refreshed for this long are stale.
pub const LOCK_VALIDITY_DURATION: Duration = Duration::from_secs(60);
// Interval between two sweeps of stale grants.
pub const LOCK_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);
// Interval between two refreshes of a held guard.
const LOCK_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// One lock request on the local table.
#[derive(Debug, Clone, Default)]
pub struct LockArgs {
    // Request uid, shared by the lock and its release.
    pub uid: String,
    // Resources locked together, `bucket/object` each.
    pub resources: Vec<String>,
    // Call site that asked for the lock.
    pub source: String,
    // Node that asked for the lock. Used to spot orphaned locks.
    pub owner: String,
    // Nodes that must grant the lock.
    pub quorum: usize,
}

impl LockArgs {
    pub fn new(uid: &str, resources: Vec<String>, source: &str, owner: &str, quorum: usize) -> Self {
        LockArgs {
            uid: uid.to_owned(),
            resources,
            source: source.to_owned(),
            owner: owner.to_owned(),
            quorum,
        }
    }
}

/// One grant held by the local lock table.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LockRequesterInfo {
    pub name: String,
    // Bool whether write or read lock.
    pub writer: bool,
    // UID to uniquely identify request of client.
    pub uid: String,
    // Timestamp set at the time of initialization.
    pub timestamp: DateTime,
    pub time_last_refresh: DateTime,
    // Contains line, function and filename requesting the lock.
    pub source: String,
    // Indicates if it was a group lock.
    pub group: bool,
    // Owner represents the UUID of the owner who originally requested the lock.
    pub owner: String,
    // Quorum represents the quorum required for this lock to be active.
    pub quorum: usize,
}

pub type LockMap = HashMap<String, Vec<LockRequesterInfo>>;

/// Lock table of this node.
pub struct LocalLocker {
    endpoint: String,
    lock_map: Mutex<LockMap>,
}

impl fmt::Display for LocalLocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.endpoint)
    }
}

impl LocalLocker {
    pub fn new(endpoint: &str) -> LocalLocker {
        LocalLocker {
            endpoint: endpoint.to_owned(),
            lock_map: Mutex::new(HashMap::new()),
        }
    }

    fn locks(&self) -> MutexGuard<'_, LockMap> {
        self.lock_map.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write lock on every resource of `args`, granted only when none of
    /// them is held.
    pub fn try_lock(&self, args: &LockArgs) -> bool {
        let mut locks = self.locks();
        if args.resources.iter().any(|r| locks.contains_key(r)) {
            return false;
        }
        let now = utils::now();
        for resource in &args.resources {
            let info = LockRequesterInfo {
                name: resource.clone(),
                writer: true,
                uid: args.uid.clone(),
                timestamp: now,
                time_last_refresh: now,
                source: args.source.clone(),
                group: args.resources.len() > 1,
                owner: args.owner.clone(),
                quorum: args.quorum,
            };
            locks.insert(resource.clone(), vec![info]);
        }
        true
    }

    pub fn unlock_now(&self, args: &LockArgs) -> bool {
        let mut locks = self.locks();
        let mut released = false;
        for resource in &args.resources {
            if let Some(holders) = locks.get_mut(resource) {
                let before = holders.len();
                holders.retain(|l| l.uid != args.uid);
                released |= holders.len() != before;
                if holders.is_empty() {
                    locks.remove(resource);
                }
            }
        }
        released
    }

    /// Marks the grants of `args.uid` as alive. False once they are gone.
    pub fn refresh_now(&self, args: &LockArgs) -> bool {
        let now = utils::now();
        let mut locks = self.locks();
        let mut refreshed = false;
        for holders in locks.values_mut() {
            for l in holders.iter_mut().filter(|l| l.uid == args.uid) {
                l.time_last_refresh = now;
                refreshed = true;
            }
        }
        refreshed
    }

    /// Drops every grant on the resources of `args`, or only the grants of
    /// `args.uid` when one is given.
    pub fn force_unlock_now(&self, args: &LockArgs) -> bool {
        let mut locks = self.locks();
        if args.uid.is_empty() {
            let mut released = false;
            for resource in &args.resources {
                released |= locks.remove(resource).is_some();
            }
            return released;
        }

        let mut released = false;
        locks.retain(|_, holders| {
            let before = holders.len();
            holders.retain(|l| l.uid != args.uid);
            released |= holders.len() != before;
            !holders.is_empty()
        });
        released
    }

    /// Removes grants not refreshed within `validity`. Returns how many
    /// were removed.
    pub fn expire_old_locks(&self, validity: Duration) -> usize {
        let validity = chrono::Duration::from_std(validity)
            .unwrap_or_else(|_| chrono::Duration::max_value());
        let now = utils::now();
        let mut locks = self.locks();
        let mut expired = 0;
        locks.retain(|resource, holders| {
            let before = holders.len();
            holders.retain(|l| l.time_last_refresh + validity >= now);
            if holders.len() != before {
                warn!(
                    "Expired {} stale locks on '{}'",
                    before - holders.len(),
                    resource
                );
            }
            expired += before - holders.len();
            !holders.is_empty()
        });
        expired
    }

    /// Sweeps stale grants every `interval` until `cancel` fires.
    pub fn spawn_maintenance(
        self: Arc<Self>,
        interval: Duration,
        validity: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let expired = self.expire_old_locks(validity);
                        if expired > 0 {
                            debug!("Lock maintenance removed {} grants on {}", expired, self);
                        }
                    }
                }
            }
        })
    }

    /// Snapshot of the lock table.
    pub fn dup_lock_map(&self) -> LockMap {
        self.locks().clone()
    }

    /// Write lock held until the returned guard is dropped. The grant is
    /// refreshed in the background so maintenance never expires it.
    pub fn lock_guard(self: &Arc<Self>, resource: &str, owner: &str) -> Option<LocalLockGuard> {
        let args = LockArgs::new(
            &uuid::Uuid::new_v4().to_string(),
            vec![resource.to_owned()],
            concat!(file!(), ":", line!()),
            owner,
            1,
        );
        if !self.try_lock(&args) {
            return None;
        }

        let refresh = CancellationToken::new();
        let locker = self.clone();
        let refresh_args = args.clone();
        let stop = refresh.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(
                tokio::time::Instant::now() + LOCK_REFRESH_INTERVAL,
                LOCK_REFRESH_INTERVAL,
            );
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        // Force unlocked by an admin.
                        if !locker.refresh_now(&refresh_args) {
                            break;
                        }
                    }
                }
            }
        });

        Some(LocalLockGuard {
            locker: self.clone(),
            args,
            refresh,
        })
    }
}

pub struct LocalLockGuard {
    locker: Arc<LocalLocker>,
    args: LockArgs,
    refresh: CancellationToken,
}

impl Drop for LocalLockGuard {
    fn drop(&mut self) {
        self.refresh.cancel();
        self.locker.unlock_now(&self.args);
    }
}
