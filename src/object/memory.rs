use std::collections::{BTreeMap, HashSet};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::*;
use crate::admin::{
    BackendDisks, BackendInfo, BackendType, BgHealState, Disk, HealDriveInfo, HealItemType,
    HealOpts, HealResultItem, StorageInfo,
};
use crate::errors::StorageError;
use crate::utils::{self, DateTime};

const DRIVE_STATE_OK: &str = "ok";
const DRIVE_STATE_CORRUPT: &str = "corrupt";
const DRIVE_TOTAL_SPACE: u64 = 1 << 40;

struct StoredObject {
    data: Bytes,
    mod_time: DateTime,
    version_id: String,
}

struct Bucket {
    created: DateTime,
    objects: BTreeMap<String, StoredObject>,
}

/// In-process backend holding buckets and objects in memory. Serves the
/// standalone binary and the tests.
pub struct MemoryObjectLayer {
    backend: BackendType,
    endpoints: Vec<String>,
    parity: usize,
    buckets: RwLock<BTreeMap<String, Bucket>>,
    corrupt: RwLock<HashSet<String>>,
    bg_heal: RwLock<Option<BgHealState>>,
    heal_delay: Duration,
    raw_data_enabled: bool,
}

impl MemoryObjectLayer {
    /// Erasure coded backend spread over `endpoints`.
    pub fn erasure(endpoints: Vec<String>, parity: usize) -> MemoryObjectLayer {
        let parity = parity.min(endpoints.len() / 2);
        Self::new(BackendType::Erasure, endpoints, parity, Some(BgHealState::default()))
    }

    /// Single drive backend. It has no background heal state.
    pub fn fs(endpoint: &str) -> MemoryObjectLayer {
        Self::new(BackendType::Fs, vec![endpoint.to_owned()], 0, None)
    }

    fn new(
        backend: BackendType,
        endpoints: Vec<String>,
        parity: usize,
        bg_heal: Option<BgHealState>,
    ) -> MemoryObjectLayer {
        MemoryObjectLayer {
            backend,
            endpoints,
            parity,
            buckets: RwLock::new(BTreeMap::new()),
            corrupt: RwLock::new(HashSet::new()),
            bg_heal: RwLock::new(bg_heal),
            heal_delay: Duration::ZERO,
            raw_data_enabled: false,
        }
    }

    /// Every object heal takes at least `delay`.
    pub fn with_heal_delay(mut self, delay: Duration) -> Self {
        self.heal_delay = delay;
        self
    }

    pub fn with_raw_data(mut self) -> Self {
        self.raw_data_enabled = true;
        self
    }

    pub fn set_background_heal_state(&self, state: Option<BgHealState>) {
        *self.bg_heal.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn make_bucket(&self, bucket: &str) {
        self.buckets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(bucket.to_owned())
            .or_insert_with(|| Bucket {
                created: utils::now(),
                objects: BTreeMap::new(),
            });
    }

    pub fn put_object(&self, bucket: &str, object: &str, data: Bytes) -> anyhow::Result<()> {
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        let b = buckets.get_mut(bucket).ok_or(StorageError::VolumeNotFound)?;
        b.objects.insert(
            object.to_owned(),
            StoredObject {
                data,
                mod_time: utils::now(),
                version_id: uuid::Uuid::new_v4().to_string(),
            },
        );
        Ok(())
    }

    /// Marks the object as damaged on every drive until it gets healed.
    pub fn mark_corrupt(&self, bucket: &str, object: &str) {
        self.corrupt
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(utils::path_join(&[bucket, object]));
    }

    pub fn is_corrupt(&self, bucket: &str, object: &str) -> bool {
        self.corrupt
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&utils::path_join(&[bucket, object]))
    }

    fn drive_infos(&self, state: &str) -> Vec<HealDriveInfo> {
        self.endpoints
            .iter()
            .enumerate()
            .map(|(i, endpoint)| HealDriveInfo {
                uuid: format!("drive-{}", i),
                endpoint: endpoint.clone(),
                state: state.to_owned(),
            })
            .collect()
    }

    fn base_item(&self, heal_item_type: HealItemType, bucket: &str, object: &str) -> HealResultItem {
        HealResultItem {
            heal_item_type,
            bucket: bucket.to_owned(),
            object: object.to_owned(),
            disk_count: self.endpoints.len(),
            set_count: 1,
            parity_blocks: self.parity,
            data_blocks: self.endpoints.len() - self.parity,
            before: self.drive_infos(DRIVE_STATE_OK),
            after: self.drive_infos(DRIVE_STATE_OK),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ObjectLayer for MemoryObjectLayer {
    fn backend_info(&self) -> BackendInfo {
        let mut online = std::collections::HashMap::new();
        for endpoint in &self.endpoints {
            *online.entry(endpoint.clone()).or_insert(0) += 1;
        }
        match self.backend {
            BackendType::Erasure => BackendInfo {
                type_: BackendType::Erasure,
                online_disks: BackendDisks(online),
                offline_disks: BackendDisks::default(),
                standard_sc_data: vec![self.endpoints.len() - self.parity],
                standard_sc_parity: self.parity,
            },
            backend => BackendInfo {
                type_: backend,
                ..Default::default()
            },
        }
    }

    async fn storage_info(&self) -> StorageInfo {
        let used: u64 = {
            let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
            buckets
                .values()
                .flat_map(|b| b.objects.values())
                .map(|o| o.data.len() as u64)
                .sum()
        };
        let disks = self
            .endpoints
            .iter()
            .enumerate()
            .map(|(i, endpoint)| Disk {
                endpoint: endpoint.clone(),
                drive_path: format!("/data{}", i),
                state: DRIVE_STATE_OK.to_owned(),
                uuid: format!("drive-{}", i),
                total_space: DRIVE_TOTAL_SPACE,
                used_space: used,
                available_space: DRIVE_TOTAL_SPACE - used.min(DRIVE_TOTAL_SPACE),
                disk_index: i,
                ..Default::default()
            })
            .collect();
        StorageInfo {
            disks,
            backend: self.backend_info(),
        }
    }

    async fn list_buckets(&self) -> anyhow::Result<Vec<BucketInfo>> {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        Ok(buckets
            .iter()
            .map(|(name, b)| BucketInfo {
                name: name.clone(),
                created: b.created,
            })
            .collect())
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> anyhow::Result<Vec<ObjectInfo>> {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        let b = buckets.get(bucket).ok_or(StorageError::VolumeNotFound)?;
        Ok(b.objects
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, o)| ObjectInfo {
                bucket: bucket.to_owned(),
                name: name.clone(),
                mod_time: o.mod_time,
                size: o.data.len() as u64,
                version_id: o.version_id.clone(),
            })
            .collect())
    }

    async fn heal_format(&self, _dry_run: bool) -> anyhow::Result<HealResultItem> {
        let mut item = self.base_item(HealItemType::Metadata, "", "");
        item.detail = "disk-format".to_owned();
        Ok(item)
    }

    async fn heal_bucket(&self, bucket: &str, _opts: &HealOpts) -> anyhow::Result<HealResultItem> {
        let exists = self
            .buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(bucket);
        if !exists {
            return Err(StorageError::VolumeNotFound.into());
        }
        Ok(self.base_item(HealItemType::Bucket, bucket, ""))
    }

    async fn heal_object(
        &self,
        bucket: &str,
        object: &str,
        version_id: &str,
        opts: &HealOpts,
    ) -> anyhow::Result<HealResultItem> {
        if self.heal_delay > Duration::ZERO {
            tokio::time::sleep(self.heal_delay).await;
        }

        let (size, stored_version) = {
            let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
            let b = buckets.get(bucket).ok_or(StorageError::VolumeNotFound)?;
            let o = b.objects.get(object).ok_or(StorageError::FileNotFound)?;
            (o.data.len() as u64, o.version_id.clone())
        };
        if !version_id.is_empty() && version_id != stored_version {
            return Err(StorageError::FileVersionNotFound.into());
        }

        let mut item = self.base_item(HealItemType::Object, bucket, object);
        item.version_id = stored_version;
        item.object_size = size;
        if self.is_corrupt(bucket, object) {
            item.before = self.drive_infos(DRIVE_STATE_CORRUPT);
            if opts.dry_run {
                item.after = self.drive_infos(DRIVE_STATE_CORRUPT);
            } else {
                self.corrupt
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&utils::path_join(&[bucket, object]));
            }
        }
        Ok(item)
    }

    async fn background_heal_status(&self) -> Option<BgHealState> {
        self.bg_heal
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn raw_data(&self) -> Option<&dyn RawDataReader> {
        if self.raw_data_enabled {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl RawDataReader for MemoryObjectLayer {
    async fn read_raw(&self, volume: &str, file: &str) -> anyhow::Result<Vec<RawFileInfo>> {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        let b = buckets.get(volume).ok_or(StorageError::VolumeNotFound)?;
        let o = b.objects.get(file).ok_or(StorageError::FileNotFound)?;
        Ok(self
            .endpoints
            .iter()
            .map(|endpoint| RawFileInfo {
                endpoint: endpoint.clone(),
                path: utils::path_join(&[volume, file]),
                data: o.data.clone(),
            })
            .collect())
    }
}
