pub use admin_router::*;
pub use peer_router::*;
pub use router::*;

mod admin_handlers;
mod admin_router;
pub mod middlewares;
mod peer_router;
mod router;
mod streams;
mod utils;
