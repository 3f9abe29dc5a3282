use async_trait::async_trait;

use super::*;
use crate::admin::{BackendInfo, BgHealState, HealOpts, HealResultItem, StorageInfo};

/// Storage backend as seen by the admin control plane.
#[async_trait]
pub trait ObjectLayer: Send + Sync {
    // Backend related metrics.

    fn backend_info(&self) -> BackendInfo;

    async fn storage_info(&self) -> StorageInfo;

    // Bucket operations.

    async fn list_buckets(&self) -> anyhow::Result<Vec<BucketInfo>>;

    async fn list_objects(&self, bucket: &str, prefix: &str) -> anyhow::Result<Vec<ObjectInfo>>;

    // Healing operations.

    async fn heal_format(&self, dry_run: bool) -> anyhow::Result<HealResultItem>;

    async fn heal_bucket(&self, bucket: &str, opts: &HealOpts) -> anyhow::Result<HealResultItem>;

    async fn heal_object(
        &self,
        bucket: &str,
        object: &str,
        version_id: &str,
        opts: &HealOpts,
    ) -> anyhow::Result<HealResultItem>;

    /// Background heal progress of the local drives, `None` while the local
    /// heal state is not initialized.
    async fn background_heal_status(&self) -> Option<BgHealState>;

    // Optional capabilities.

    fn raw_data(&self) -> Option<&dyn RawDataReader> {
        None
    }
}

/// Direct access to the files of every drive, bypassing the object layer.
#[async_trait]
pub trait RawDataReader: Send + Sync {
    async fn read_raw(&self, volume: &str, file: &str) -> anyhow::Result<Vec<RawFileInfo>>;
}
