mod api_datatypes;
mod api_trait;
mod memory;

pub use api_datatypes::*;
pub use api_trait::*;
pub use memory::*;
