use std::collections::HashMap;

use super::*;
use crate::admin::{LockEntry, LockType};

/// Lock table snapshot reported by one node.
#[derive(Clone, Debug, Default)]
pub struct PeerLocks {
    pub addr: String,
    pub locks: LockMap,
}

/// Merges the lock tables of every node into one entry per lock. Entries
/// held by fewer nodes than their quorum are dropped unless `stale` is set.
pub fn top_lock_entries(peer_locks: &[PeerLocks], stale: bool) -> Vec<LockEntry> {
    let mut entries: HashMap<String, LockEntry> = HashMap::new();
    for peer in peer_locks {
        for holders in peer.locks.values() {
            for info in holders {
                match entries.get_mut(&info.name) {
                    Some(entry) => {
                        if !entry.server_list.contains(&peer.addr) {
                            entry.server_list.push(peer.addr.clone());
                        }
                    }
                    None => {
                        entries.insert(
                            info.name.clone(),
                            LockEntry {
                                timestamp: info.timestamp,
                                resource: info.name.clone(),
                                type_: if info.writer {
                                    LockType::Write
                                } else {
                                    LockType::Read
                                },
                                source: info.source.clone(),
                                server_list: vec![peer.addr.clone()],
                                owner: info.owner.clone(),
                                id: info.uid.clone(),
                                quorum: info.quorum,
                            },
                        );
                    }
                }
            }
        }
    }

    let mut entries: Vec<LockEntry> = entries
        .into_iter()
        .map(|(_, entry)| entry)
        .filter(|entry| stale || !entry.is_stale())
        .collect();
    entries.sort_by(LockEntry::presentation_cmp);
    entries
}

/// Keeps the first `count` entries. A non positive count keeps them all.
pub fn truncate_lock_entries(mut entries: Vec<LockEntry>, count: i64) -> Vec<LockEntry> {
    if count > 0 && (count as usize) < entries.len() {
        entries.truncate(count as usize);
    }
    entries
}
