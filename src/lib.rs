pub mod admin;
pub mod auth;
pub mod config;
pub mod errors;
pub mod globals;
pub mod heal;
pub mod http;
pub mod lock;
pub mod logger;
pub mod object;
pub mod peer;
pub mod pubsub;
pub mod router;
pub mod s3utils;
pub mod signals;
pub mod utils;
pub mod version;
