mod heal_cmds;
mod health_cmds;
mod info_cmds;
mod lock_cmds;
mod log_cmds;
mod profiling;
mod stream;
mod trace;

pub use heal_cmds::*;
pub use health_cmds::*;
pub use info_cmds::*;
pub use lock_cmds::*;
pub use log_cmds::*;
pub use profiling::*;
pub use stream::*;
pub use trace::*;
