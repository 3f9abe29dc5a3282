use std::sync::Arc;

use slog::{Drain, Duplicate, Level, OwnedKVList, Record};

use super::{ConsoleLogSys, ErrKind};
use crate::admin::LogInfo;
use crate::utils;

/// Keeps the global slog logger and the `log` bridge installed.
pub struct LogGuard {
    _scope_guard: slog_scope::GlobalLoggerGuard,
}

/// Installs the process logger: a terminal drain plus, when given, the
/// console log system, behind one async drain. Records from the `log` macros
/// are bridged through `slog-stdlog`.
pub fn init(level: Level, console: Option<Arc<ConsoleLogSys>>) -> anyhow::Result<LogGuard> {
    let decorator = slog_term::TermDecorator::new().build();
    let term = slog_term::FullFormat::new(decorator)
        .use_file_location()
        .build()
        .fuse();

    let drain = match console {
        Some(sys) => {
            let drain = Duplicate::new(term, ConsoleSysDrain::new(sys)).ignore_res();
            slog_async::Async::new(drain).build().fuse()
        }
        None => slog_async::Async::new(term).build().fuse(),
    };
    let drain = drain.filter_level(level).ignore_res();
    let logger = slog::Logger::root(drain, slog::o!());

    let scope_guard = slog_scope::set_global_logger(logger);
    slog_stdlog::init()?;
    Ok(LogGuard {
        _scope_guard: scope_guard,
    })
}

/// Forwards every record into the console log system.
pub struct ConsoleSysDrain {
    sys: Arc<ConsoleLogSys>,
}

impl ConsoleSysDrain {
    pub fn new(sys: Arc<ConsoleLogSys>) -> Self {
        ConsoleSysDrain { sys }
    }
}

impl Drain for ConsoleSysDrain {
    type Ok = ();
    type Err = slog::Never;

    fn log(&self, record: &Record, _: &OwnedKVList) -> Result<Self::Ok, Self::Err> {
        self.sys.send(LogInfo {
            node_name: self.sys.node_name().to_owned(),
            time: utils::now(),
            level: level_name(record.level()).to_owned(),
            kind: ErrKind::Hulk,
            message: record.msg().to_string(),
            api: None,
            source: Some(format!("{}:{}", record.file(), record.line())),
        });
        Ok(())
    }
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::Critical => "FATAL",
        Level::Error => "ERROR",
        Level::Warning => "WARNING",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_sys_drain() {
        let sys = Arc::new(ConsoleLogSys::new("node1:9000", 8));
        let logger = slog::Logger::root(ConsoleSysDrain::new(sys.clone()).fuse(), slog::o!());
        slog::warn!(logger, "drive {} is offline", "/data1");

        let records = sys.replay("", 10, ErrKind::All);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, "WARNING");
        assert_eq!(records[0].message, "drive /data1 is offline");
        assert_eq!(records[0].node_name, "node1:9000");
    }
}
