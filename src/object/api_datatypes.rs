use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::utils;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BucketInfo {
    // Name of the bucket.
    pub name: String,
    // Date and time when the bucket was created.
    pub created: utils::DateTime,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ObjectInfo {
    // Name of the bucket.
    pub bucket: String,
    // Name of the object.
    pub name: String,
    // Date and time when the object was last modified.
    pub mod_time: utils::DateTime,
    // Total object size.
    pub size: u64,
    // Version ID of this object.
    pub version_id: String,
}

/// Raw copy of one file as found on one drive.
#[derive(Clone, Debug, PartialEq)]
pub struct RawFileInfo {
    pub endpoint: String,
    pub path: String,
    pub data: Bytes,
}
