mod local_locker;
mod top_locks;

pub use local_locker::*;
pub use top_locks::*;
