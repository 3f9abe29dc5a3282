mod constants;
mod env;
mod state;

pub use constants::*;
pub use env::*;
pub use state::*;
