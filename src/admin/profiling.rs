use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use log::warn;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::errors::TypedError;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProfilerType {
    Cpu,
    Mem,
    Block,
    Mutex,
    Trace,
    Threads,
}

/// Parses a comma separated `profilerType` value.
pub fn parse_profiler_types(s: &str) -> anyhow::Result<Vec<ProfilerType>> {
    let mut kinds = Vec::new();
    for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let kind = ProfilerType::from_str(name)
            .map_err(|_| TypedError::UnsupportedProfiler(name.to_owned()))?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartProfilingResult {
    pub node_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub error: String,
}

/// One profile collected on a node, base64 encoded.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileData {
    pub profiler_type: ProfilerType,
    pub data: String,
}

/// Profiles downloaded from one node, one JSON frame per node.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeProfiles {
    pub node_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub profiles: Vec<ProfileData>,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub error: String,
}

pub trait Profiler: Send {
    /// Stops profiling and returns the collected profile.
    fn stop(self: Box<Self>) -> anyhow::Result<Vec<u8>>;
}

pub trait ProfilerFactory: Send + Sync {
    fn start(&self, kind: ProfilerType) -> anyhow::Result<Box<dyn Profiler>>;
}

/// Table of the profilers running on this node.
pub struct ProfilerRegistry {
    factory: Option<Arc<dyn ProfilerFactory>>,
    active: Mutex<HashMap<ProfilerType, Box<dyn Profiler>>>,
}

impl ProfilerRegistry {
    pub fn new(factory: Option<Arc<dyn ProfilerFactory>>) -> ProfilerRegistry {
        ProfilerRegistry {
            factory,
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.factory.is_some()
    }

    /// Starts every requested profiler. A profiler of the same type that is
    /// already running is stopped and its profile discarded.
    pub fn start(&self, kinds: &[ProfilerType]) -> anyhow::Result<()> {
        let factory = self.factory.as_ref().ok_or(TypedError::ProfilerNotEnabled)?;
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        for kind in kinds {
            if let Some(running) = active.remove(kind) {
                if let Err(err) = running.stop() {
                    warn!("stopping {} profiler failed: {}", kind, err);
                }
            }
            let profiler = factory.start(*kind)?;
            active.insert(*kind, profiler);
        }
        Ok(())
    }

    /// Stops every running profiler and returns the collected profiles
    /// ordered by type. A profiler failing to stop is logged and skipped.
    pub fn stop_all(&self) -> Vec<ProfileData> {
        let running = {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *active)
        };
        let mut profiles = Vec::with_capacity(running.len());
        for (kind, profiler) in running {
            match profiler.stop() {
                Ok(data) => profiles.push(ProfileData {
                    profiler_type: kind,
                    data: base64::encode(&data),
                }),
                Err(err) => warn!("stopping {} profiler failed: {}", kind, err),
            }
        }
        profiles.sort_by_key(|p| p.profiler_type.to_string());
        profiles
    }
}

#[cfg(unix)]
pub use self::cpu::*;

#[cfg(unix)]
mod cpu {
    use super::*;

    const CPU_PROFILE_FREQUENCY: i32 = 100;

    /// Sampling CPU profiler backed by `pprof`. Other profile types are not
    /// available in this process.
    pub struct PprofFactory;

    impl ProfilerFactory for PprofFactory {
        fn start(&self, kind: ProfilerType) -> anyhow::Result<Box<dyn Profiler>> {
            match kind {
                ProfilerType::Cpu => {
                    let guard = pprof::ProfilerGuard::new(CPU_PROFILE_FREQUENCY)?;
                    Ok(Box::new(CpuProfiler { guard }))
                }
                _ => Err(TypedError::UnsupportedProfiler(kind.to_string()).into()),
            }
        }
    }

    struct CpuProfiler {
        guard: pprof::ProfilerGuard<'static>,
    }

    impl Profiler for CpuProfiler {
        fn stop(self: Box<Self>) -> anyhow::Result<Vec<u8>> {
            let report = self.guard.report().build()?;
            Ok(format!("{:?}", report).into_bytes())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::errors::AsError;

    #[derive(Default)]
    struct CountingFactory {
        started: AtomicUsize,
        stopped: Arc<AtomicUsize>,
    }

    struct CountingProfiler(Arc<AtomicUsize>);

    impl Profiler for CountingProfiler {
        fn stop(self: Box<Self>) -> anyhow::Result<Vec<u8>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(b"profile".to_vec())
        }
    }

    impl ProfilerFactory for CountingFactory {
        fn start(&self, _: ProfilerType) -> anyhow::Result<Box<dyn Profiler>> {
            self.started.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingProfiler(self.stopped.clone())))
        }
    }

    #[test]
    fn test_parse_profiler_types() {
        assert_eq!(
            parse_profiler_types("cpu, mem,cpu").unwrap(),
            vec![ProfilerType::Cpu, ProfilerType::Mem]
        );
        let err = parse_profiler_types("cpu,goroutines").unwrap_err();
        assert!(matches!(
            err.as_error::<TypedError>(),
            Some(TypedError::UnsupportedProfiler(name)) if name == "goroutines"
        ));
    }

    #[test]
    fn test_restart_stops_previous() {
        let factory = Arc::new(CountingFactory::default());
        let stopped = factory.stopped.clone();
        let registry = ProfilerRegistry::new(Some(factory.clone()));

        registry.start(&[ProfilerType::Cpu]).unwrap();
        registry.start(&[ProfilerType::Cpu, ProfilerType::Block]).unwrap();
        assert_eq!(factory.started.load(Ordering::SeqCst), 3);
        assert_eq!(stopped.load(Ordering::SeqCst), 1);

        let profiles = registry.stop_all();
        assert_eq!(stopped.load(Ordering::SeqCst), 3);
        let kinds: Vec<ProfilerType> = profiles.iter().map(|p| p.profiler_type).collect();
        assert_eq!(kinds, vec![ProfilerType::Block, ProfilerType::Cpu]);
        assert_eq!(base64::decode(&profiles[1].data).unwrap(), b"profile");
        assert!(registry.stop_all().is_empty());
    }

    #[test]
    fn test_disabled_registry() {
        let registry = ProfilerRegistry::new(None);
        let err = registry.start(&[ProfilerType::Cpu]).unwrap_err();
        assert!(matches!(
            err.as_error::<TypedError>(),
            Some(TypedError::ProfilerNotEnabled)
        ));
    }
}
