mod listener;
mod service;

pub use listener::*;
pub use service::*;
