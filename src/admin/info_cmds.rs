use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum BackendType {
    Unknown,
    #[serde(rename = "FS")]
    #[strum(serialize = "FS")]
    Fs,
    Erasure,
}

impl Default for BackendType {
    fn default() -> Self {
        BackendType::Unknown
    }
}

// Contains info of the underlying backend.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct BackendInfo {
    // Represents various backend types, currently on FS and Erasure.
    #[serde(rename = "backendType")]
    pub type_: BackendType,

    // Following fields are only meaningful if BackendType is Erasure.
    pub online_disks: BackendDisks, // Online disks during server startup.
    pub offline_disks: BackendDisks, // Offline disks during server startup.

    // Following fields are only meaningful if BackendType is Erasure.
    pub standard_sc_data: Vec<usize>, // Data disks for currently configured Standard storage class.
    pub standard_sc_parity: usize, // Parity disks for currently configured Standard storage class.
}

/// Disk count per endpoint.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct BackendDisks(pub HashMap<String, usize>);

impl BackendDisks {
    pub fn sum(&self) -> usize {
        self.0.values().sum()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Disk {
    pub endpoint: String,
    pub root_disk: bool,
    #[serde(rename = "path")]
    pub drive_path: String,
    pub healing: bool,
    pub state: String,
    pub uuid: String,
    pub total_space: u64,
    pub used_space: u64,
    pub available_space: u64,
    pub pool_index: usize,
    pub set_index: usize,
    pub disk_index: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct StorageInfo {
    pub disks: Vec<Disk>,
    pub backend: BackendInfo,
}

impl StorageInfo {
    /// Flags every disk whose endpoint is in `healing`.
    pub fn mark_healing<'a, I>(&mut self, healing: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        let healing: std::collections::HashSet<&String> = healing.into_iter().collect();
        for disk in self.disks.iter_mut() {
            if healing.contains(&disk.endpoint) {
                disk.healing = true;
            }
        }
    }
}

/// One file returned by inspect-data, contents base64 encoded.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InspectDataFrame {
    pub endpoint: String,
    pub path: String,
    pub data: String,
}
