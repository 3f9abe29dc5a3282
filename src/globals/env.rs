pub const ENV_ADDRESS: &str = "HULK_ADDRESS";
pub const ENV_NODE_NAME: &str = "HULK_NODE_NAME";
pub const ENV_PEERS: &str = "HULK_PEERS";
pub const ENV_ADMIN_TOKEN: &str = "HULK_ADMIN_TOKEN";
pub const ENV_ERASURE: &str = "HULK_ERASURE";
pub const ENV_HEAL_KEEP_DURATION: &str = "HULK_HEAL_KEEP_DURATION";
pub const ENV_HEAL_CLEANUP_INTERVAL: &str = "HULK_HEAL_CLEANUP_INTERVAL";
pub const ENV_HEAL_MAX_ITEMS: &str = "HULK_HEAL_MAX_ITEMS";
pub const ENV_PEER_TIMEOUT: &str = "HULK_PEER_TIMEOUT";
pub const ENV_PROFILING: &str = "HULK_PROFILING";
pub const ENV_CONSOLE_LOG_SIZE: &str = "HULK_CONSOLE_LOG_SIZE";
pub const ENV_LOG_LEVEL: &str = "HULK_LOG_LEVEL";
