mod console_sys;
mod drain;
mod entry;
mod logger;
mod reqinfo;

pub use console_sys::*;
pub use drain::*;
pub use entry::*;
pub use logger::*;
pub use reqinfo::*;
pub use slog::Level;

