mod background;
mod handler;
mod manager;
mod params;
mod sequence;
mod status_queue;

pub use background::*;
pub use handler::*;
pub use manager::*;
pub use params::*;
pub use sequence::*;
pub use status_queue::*;
