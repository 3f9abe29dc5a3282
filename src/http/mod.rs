mod api_response;
mod headers;
mod keepalive;
mod request_extensions;
mod stats;

pub use api_response::*;
pub use headers::*;
pub use keepalive::*;
pub use request_extensions::*;
pub use stats::*;
