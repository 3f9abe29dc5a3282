mod client;
mod notification;
mod rest;

pub use client::*;
pub use notification::*;
pub use rest::*;

pub const PEER_PATH_PREFIX: &str = "/hulk/peer/v1";

pub const PEER_METHOD_GET_LOCKS: &str = "/locks";
pub const PEER_METHOD_FORCE_UNLOCK: &str = "/forceunlock";
pub const PEER_METHOD_BACKGROUND_HEAL_STATUS: &str = "/bghealstatus";
pub const PEER_METHOD_SIGNAL_SERVICE: &str = "/signalservice";
pub const PEER_METHOD_START_PROFILING: &str = "/startprofiling";
pub const PEER_METHOD_DOWNLOAD_PROFILING: &str = "/downloadprofiling";
pub const PEER_METHOD_SERVER_HEALTH: &str = "/health";
pub const PEER_METHOD_TRACE: &str = "/trace";
pub const PEER_METHOD_CONSOLE_LOG: &str = "/log";
