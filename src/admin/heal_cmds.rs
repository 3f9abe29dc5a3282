use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use strum::Display;

use crate::utils::{self, DateTime};

/// How deep a heal pass inspects each object.
#[derive(Serialize_repr, Deserialize_repr, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum HealScanMode {
    Unknown = 0,
    Normal = 1,
    Deep = 2,
}

impl Default for HealScanMode {
    fn default() -> Self {
        HealScanMode::Normal
    }
}

/// Settings of a heal sequence, sent by the client as the request body.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct HealOpts {
    pub recursive: bool,
    pub dry_run: bool,
    pub remove: bool,
    pub recreate: bool,
    pub scan_mode: HealScanMode,
    #[serde(rename = "nolock")]
    pub no_lock: bool,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum HealItemType {
    #[serde(rename = "metadata")]
    #[strum(serialize = "metadata")]
    Metadata,
    #[serde(rename = "bucket")]
    #[strum(serialize = "bucket")]
    Bucket,
    #[serde(rename = "bucket-metadata")]
    #[strum(serialize = "bucket-metadata")]
    BucketMetadata,
    #[serde(rename = "object")]
    #[strum(serialize = "object")]
    Object,
}

impl Default for HealItemType {
    fn default() -> Self {
        HealItemType::Object
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct HealDriveInfo {
    pub uuid: String,
    pub endpoint: String,
    pub state: String,
}

/// Outcome of healing one item, as reported back to the polling client.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct HealResultItem {
    #[serde(rename = "resultId")]
    pub result_index: u64,
    #[serde(rename = "type")]
    pub heal_item_type: HealItemType,
    pub bucket: String,
    pub object: String,
    pub version_id: String,
    pub detail: String,
    pub parity_blocks: usize,
    pub data_blocks: usize,
    pub disk_count: usize,
    pub set_count: usize,
    pub before: Vec<HealDriveInfo>,
    pub after: Vec<HealDriveInfo>,
    pub object_size: u64,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum HealStatusSummary {
    #[serde(rename = "not started")]
    #[strum(serialize = "not started")]
    NotStarted,
    #[serde(rename = "running")]
    #[strum(serialize = "running")]
    Running,
    #[serde(rename = "stopped")]
    #[strum(serialize = "stopped")]
    Stopped,
    #[serde(rename = "finished")]
    #[strum(serialize = "finished")]
    Finished,
}

impl Default for HealStatusSummary {
    fn default() -> Self {
        HealStatusSummary::NotStarted
    }
}

/// Reply to a heal start request.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealStartSuccess {
    pub client_token: String,
    pub client_address: String,
    pub start_time: DateTime,
}

/// Reply to a heal status poll. `items` holds only what was appended since
/// the previous poll.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealTaskStatus {
    pub summary: HealStatusSummary,
    #[serde(rename = "detail")]
    pub failure_detail: String,
    pub start_time: DateTime,
    #[serde(rename = "settings")]
    pub heal_settings: HealOpts,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub items: Vec<HealResultItem>,
}

impl Default for HealTaskStatus {
    fn default() -> Self {
        HealTaskStatus {
            summary: HealStatusSummary::NotStarted,
            failure_detail: String::new(),
            start_time: utils::zero_time(),
            heal_settings: HealOpts::default(),
            items: Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealingDisk {
    pub id: String,
    pub endpoint: String,
    pub path: String,
    pub pool_index: usize,
    pub set_index: usize,
    pub disk_index: usize,
    pub started: DateTime,
    pub last_update: DateTime,
    pub objects_healed: u64,
    pub objects_failed: u64,
    pub bytes_done: u64,
    pub bytes_failed: u64,
    pub finished: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SetStatus {
    pub pool_index: usize,
    pub set_index: usize,
    pub healing_disks: Vec<HealingDisk>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct MrfStatus {
    pub bytes_healed: u64,
    pub items_healed: u64,
}

/// Background heal progress of one node, or of the whole cluster once
/// merged.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct BgHealState {
    #[serde(rename = "offline_nodes", default)]
    pub offline_endpoints: Vec<String>,
    #[serde(default)]
    pub scanned_items_count: u64,
    #[serde(default)]
    pub heal_disks: Vec<String>,
    #[serde(default)]
    pub sets: Vec<SetStatus>,
    #[serde(default)]
    pub mrf: HashMap<String, MrfStatus>,
}

impl BgHealState {
    /// Folds peer states into this one: counters are summed, endpoint lists
    /// unioned, and a disk reported by several nodes keeps its freshest
    /// record.
    pub fn merge<'a, I>(&mut self, others: I)
    where
        I: IntoIterator<Item = &'a BgHealState>,
    {
        let mut sets: BTreeMap<(usize, usize), BTreeMap<String, HealingDisk>> = BTreeMap::new();
        for set in self.sets.drain(..) {
            let disks = sets.entry((set.pool_index, set.set_index)).or_default();
            for disk in set.healing_disks {
                merge_healing_disk(disks, disk);
            }
        }

        for other in others {
            self.scanned_items_count += other.scanned_items_count;
            self.offline_endpoints
                .extend(other.offline_endpoints.iter().cloned());
            self.heal_disks.extend(other.heal_disks.iter().cloned());
            for (endpoint, status) in other.mrf.iter() {
                self.mrf.insert(endpoint.clone(), *status);
            }
            for set in other.sets.iter() {
                let disks = sets.entry((set.pool_index, set.set_index)).or_default();
                for disk in set.healing_disks.iter() {
                    merge_healing_disk(disks, disk.clone());
                }
            }
        }

        self.offline_endpoints.sort();
        self.offline_endpoints.dedup();
        self.heal_disks.sort();
        self.heal_disks.dedup();
        self.sets = sets
            .into_iter()
            .map(|((pool_index, set_index), disks)| SetStatus {
                pool_index,
                set_index,
                healing_disks: disks.into_iter().map(|(_, disk)| disk).collect(),
            })
            .collect();
    }
}

fn merge_healing_disk(disks: &mut BTreeMap<String, HealingDisk>, disk: HealingDisk) {
    match disks.get(&disk.endpoint) {
        Some(existing) if existing.last_update >= disk.last_update => {}
        _ => {
            disks.insert(disk.endpoint.clone(), disk);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn healing_disk(endpoint: &str, healed: u64, last_update: DateTime) -> HealingDisk {
        HealingDisk {
            id: endpoint.to_owned(),
            endpoint: endpoint.to_owned(),
            path: "/data".to_owned(),
            pool_index: 0,
            set_index: 0,
            disk_index: 0,
            started: utils::zero_time(),
            last_update,
            objects_healed: healed,
            objects_failed: 0,
            bytes_done: 0,
            bytes_failed: 0,
            finished: false,
        }
    }

    #[test]
    fn test_heal_opts_decode() {
        let opts: HealOpts =
            serde_json::from_str(r#"{"recursive":true,"dryRun":true,"scanMode":2}"#).unwrap();
        assert!(opts.recursive);
        assert!(opts.dry_run);
        assert!(!opts.remove);
        assert_eq!(opts.scan_mode, HealScanMode::Deep);

        let opts: HealOpts = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, HealOpts::default());
        assert_eq!(opts.scan_mode, HealScanMode::Normal);
    }

    #[test]
    fn test_heal_task_status_encode() {
        let status = HealTaskStatus {
            summary: HealStatusSummary::Running,
            ..Default::default()
        };
        let v = serde_json::to_value(&status).unwrap();
        assert_eq!(v["summary"], "running");
        assert_eq!(v["detail"], "");
        assert_eq!(v["settings"]["scanMode"], 1);
        assert!(v.get("items").is_none());
        assert_eq!(HealStatusSummary::NotStarted.to_string(), "not started");
    }

    #[test]
    fn test_heal_result_item_encode() {
        let item = HealResultItem {
            result_index: 3,
            heal_item_type: HealItemType::BucketMetadata,
            bucket: "photos".to_owned(),
            ..Default::default()
        };
        let v = serde_json::to_value(&item).unwrap();
        assert_eq!(v["resultId"], 3);
        assert_eq!(v["type"], "bucket-metadata");
        assert_eq!(v["bucket"], "photos");
    }

    #[test]
    fn test_bg_heal_state_merge() {
        let t0 = utils::now();
        let t1 = t0 + Duration::seconds(5);
        let mut local = BgHealState {
            offline_endpoints: vec!["node3".to_owned()],
            scanned_items_count: 10,
            heal_disks: vec!["node1/d1".to_owned()],
            sets: vec![SetStatus {
                pool_index: 0,
                set_index: 0,
                healing_disks: vec![healing_disk("node1/d1", 1, t0)],
            }],
            mrf: HashMap::new(),
        };
        let peer1 = BgHealState {
            scanned_items_count: 5,
            heal_disks: vec!["node2/d1".to_owned(), "node1/d1".to_owned()],
            sets: vec![SetStatus {
                pool_index: 0,
                set_index: 0,
                healing_disks: vec![
                    healing_disk("node1/d1", 7, t1),
                    healing_disk("node2/d1", 2, t0),
                ],
            }],
            ..Default::default()
        };
        let peer2 = BgHealState {
            offline_endpoints: vec!["node3".to_owned()],
            scanned_items_count: 1,
            sets: vec![SetStatus {
                pool_index: 1,
                set_index: 0,
                healing_disks: vec![healing_disk("node4/d1", 0, t0)],
            }],
            ..Default::default()
        };

        local.merge(vec![&peer1, &peer2]);

        assert_eq!(local.scanned_items_count, 16);
        assert_eq!(local.offline_endpoints, vec!["node3".to_owned()]);
        assert_eq!(
            local.heal_disks,
            vec!["node1/d1".to_owned(), "node2/d1".to_owned()]
        );
        assert_eq!(local.sets.len(), 2);
        let first = &local.sets[0];
        assert_eq!(first.healing_disks.len(), 2);
        assert_eq!(first.healing_disks[0].endpoint, "node1/d1");
        assert_eq!(first.healing_disks[0].objects_healed, 7);
        assert_eq!(local.sets[1].pool_index, 1);
    }
}
