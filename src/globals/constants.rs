use std::time::Duration;

use const_format::concatcp;

use crate::utils::SLASH_SEPARATOR;

// Configuration related constants.
pub const GLOBAL_DEFAULT_HOST: &str = "::";
pub const GLOBAL_DEFAULT_PORT: &str = "9000";

// Reserved bucket.
pub const SYSTEM_RESERVED_BUCKET: &str = "hulk";
pub const SYSTEM_RESERVED_BUCKET_PATH: &str = concatcp!(SLASH_SEPARATOR, SYSTEM_RESERVED_BUCKET);
pub const SYSTEM_RESERVED_BUCKET_PATH_WITH_SLASH: &str =
    concatcp!(SYSTEM_RESERVED_BUCKET_PATH, SLASH_SEPARATOR);

// System meta bucket.
pub const SYSTEM_META_BUCKET: &str = ".hulk.sys";

// Keep-alive filler intervals of the long-lived admin responses.
pub const HEAL_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(10);
pub const STREAM_KEEP_ALIVE_INTERVAL: Duration = Duration::from_millis(500);
pub const HEALTH_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(5);
pub const HEALTH_DEFAULT_DEADLINE: Duration = Duration::from_secs(3600);

// Buffered events per streaming admin client.
pub const STREAM_QUEUE_CAPACITY: usize = 4000;

// Held on the local lock table while a health info session runs.
pub const HEALTH_CHECK_LOCK_RESOURCE: &str =
    concatcp!(SYSTEM_META_BUCKET, SLASH_SEPARATOR, "health-check-in-progress");
