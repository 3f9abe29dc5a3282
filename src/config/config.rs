use std::time::Duration;

use slog::Level;

use crate::globals::*;
use crate::heal::{
    DEFAULT_HEAL_CLEANUP_INTERVAL, DEFAULT_HEAL_KEEP_DURATION, DEFAULT_STATUS_QUEUE_CAPACITY,
};
use crate::logger::DEFAULT_CONSOLE_LOG_SIZE;
use crate::utils;

const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(15);

/// Settings of one admin node. Defaults are overridden by `HULK_*`
/// environment variables, then by command line flags.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    // Listen address, `host:port`.
    pub address: String,
    // Name of this node as known by its peers.
    pub node_name: String,
    // Peer addresses, `host:port`.
    pub peers: Vec<String>,
    // Bearer token required on admin and peer routes, none to allow all.
    pub admin_token: Option<String>,
    // Serve an erasure coded in-memory backend instead of a single drive.
    pub erasure: bool,
    pub heal_keep_duration: Duration,
    pub heal_cleanup_interval: Duration,
    pub heal_max_items: usize,
    pub peer_timeout: Duration,
    pub profiling: bool,
    pub console_log_size: usize,
    pub log_level: Level,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            address: format!("[{}]:{}", GLOBAL_DEFAULT_HOST, GLOBAL_DEFAULT_PORT),
            node_name: format!("localhost:{}", GLOBAL_DEFAULT_PORT),
            peers: Vec::new(),
            admin_token: None,
            erasure: true,
            heal_keep_duration: DEFAULT_HEAL_KEEP_DURATION,
            heal_cleanup_interval: DEFAULT_HEAL_CLEANUP_INTERVAL,
            heal_max_items: DEFAULT_STATUS_QUEUE_CAPACITY,
            peer_timeout: DEFAULT_PEER_TIMEOUT,
            profiling: false,
            console_log_size: DEFAULT_CONSOLE_LOG_SIZE,
            log_level: Level::Info,
        }
    }
}

/// Reads the configuration from the process environment.
pub fn lookup_config() -> anyhow::Result<Config> {
    lookup_config_with(|key| std::env::var(key).ok())
}

/// Reads the configuration through `lookup`, falling back to defaults for
/// unset keys.
pub fn lookup_config_with<F>(lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut cfg = Config::default();
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(address) = get(ENV_ADDRESS) {
        cfg.address = address;
    }
    if let Some(node_name) = get(ENV_NODE_NAME) {
        cfg.node_name = node_name;
    }
    if let Some(peers) = get(ENV_PEERS) {
        cfg.peers = parse_peers(&peers);
    }
    cfg.admin_token = get(ENV_ADMIN_TOKEN);

    if let Some(erasure) = get(ENV_ERASURE) {
        cfg.erasure = utils::parse_bool_ext(&erasure)
            .map_err(|e| anyhow::anyhow!("'{}' value invalid: {}", ENV_ERASURE, e))?;
    }
    if let Some(profiling) = get(ENV_PROFILING) {
        cfg.profiling = utils::parse_bool_ext(&profiling)
            .map_err(|e| anyhow::anyhow!("'{}' value invalid: {}", ENV_PROFILING, e))?;
    }

    if let Some(keep) = get(ENV_HEAL_KEEP_DURATION) {
        cfg.heal_keep_duration = humantime::parse_duration(&keep)
            .map_err(|e| anyhow::anyhow!("'{}' value invalid: {}", ENV_HEAL_KEEP_DURATION, e))?;
    }
    if let Some(interval) = get(ENV_HEAL_CLEANUP_INTERVAL) {
        cfg.heal_cleanup_interval = humantime::parse_duration(&interval).map_err(|e| {
            anyhow::anyhow!("'{}' value invalid: {}", ENV_HEAL_CLEANUP_INTERVAL, e)
        })?;
    }
    if let Some(timeout) = get(ENV_PEER_TIMEOUT) {
        cfg.peer_timeout = humantime::parse_duration(&timeout)
            .map_err(|e| anyhow::anyhow!("'{}' value invalid: {}", ENV_PEER_TIMEOUT, e))?;
    }

    if let Some(max_items) = get(ENV_HEAL_MAX_ITEMS) {
        cfg.heal_max_items = max_items
            .parse::<usize>()
            .map_err(|e| anyhow::anyhow!("'{}' value invalid: {}", ENV_HEAL_MAX_ITEMS, e))?;
    }
    if let Some(size) = get(ENV_CONSOLE_LOG_SIZE) {
        cfg.console_log_size = size
            .parse::<usize>()
            .map_err(|e| anyhow::anyhow!("'{}' value invalid: {}", ENV_CONSOLE_LOG_SIZE, e))?;
    }
    if let Some(level) = get(ENV_LOG_LEVEL) {
        cfg.log_level = level
            .parse::<Level>()
            .map_err(|_| anyhow::anyhow!("'{}' value invalid: {}", ENV_LOG_LEVEL, level))?;
    }

    Ok(cfg)
}

/// Parses a comma separated peer list, skipping blanks.
pub fn parse_peers(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
        .collect()
}
