use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::admin::{HealStartSuccess, HealTaskStatus, TraceInfo};
use crate::errors::{ApiError, GenericApiError};
use crate::object::ObjectLayer;
use crate::pubsub::PubSub;
use crate::utils::{self, DateTime, SLASH_SEPARATOR};

/// How long an ended sequence stays pollable after its last activity.
pub const DEFAULT_HEAL_KEEP_DURATION: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_HEAL_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

// Format of the start time quoted in the already-running error.
const HTTP_TIME_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Registry of heal sequences of this node, at most one live sequence per
/// path.
pub struct HealSequenceManager {
    sequences: Mutex<HashMap<String, Arc<HealSequence>>>,
    keep_duration: Duration,
    traces: PubSub<TraceInfo>,
    node_name: String,
}

impl HealSequenceManager {
    pub fn new(node_name: &str, traces: PubSub<TraceInfo>) -> HealSequenceManager {
        HealSequenceManager {
            sequences: Mutex::new(HashMap::new()),
            keep_duration: DEFAULT_HEAL_KEEP_DURATION,
            traces,
            node_name: node_name.to_owned(),
        }
    }

    pub fn with_keep_duration(mut self, keep_duration: Duration) -> HealSequenceManager {
        self.keep_duration = keep_duration;
        self
    }

    pub async fn get_heal_sequence(&self, path: &str) -> Option<Arc<HealSequence>> {
        self.sequences.lock().await.get(path).cloned()
    }

    /// Registers `seq` and spawns its execution task. Replies with the
    /// token the client polls with.
    pub async fn launch_new_heal_sequence(
        &self,
        seq: HealSequence,
        backend: Arc<dyn ObjectLayer>,
    ) -> Result<Vec<u8>, GenericApiError> {
        let mut sequences = self.sequences.lock().await;

        if seq.force_started {
            if let Some(existing) = sequences.remove(&seq.path) {
                info!(
                    "Heal on '{}' force started, stopping sequence {}",
                    seq.path, existing.client_token
                );
                existing.stop();
            }
        } else if let Some(existing) = sequences.get(&seq.path) {
            if !existing.has_ended() {
                return Err(ApiError::HealAlreadyRunning.to_with_description(format!(
                    "Heal is already running on the given path (use force-start option to stop and start afresh). \
                     The heal was started by IP {} at {}, token is {}",
                    existing.client_address,
                    existing.start_time.format(HTTP_TIME_FORMAT),
                    existing.client_token
                )));
            }
        }

        for (path, other) in sequences.iter() {
            if !other.has_ended() && paths_overlap(path, &seq.path) {
                return Err(ApiError::HealOverlappingPaths.to_with_description(format!(
                    "The provided heal sequence path overlaps with an existing heal path: {}",
                    path
                )));
            }
        }

        let resp = HealStartSuccess {
            client_token: seq.client_token.clone(),
            client_address: seq.client_address.clone(),
            start_time: seq.start_time,
        };
        let body = serde_json::to_vec(&resp)
            .map_err(|e| ApiError::InternalError.to_with_description(e.to_string()))?;

        let seq = Arc::new(seq);
        sequences.insert(seq.path.clone(), seq.clone());
        drop(sequences);

        debug!(
            "Launching heal sequence {} on '{}'",
            seq.client_token, seq.path
        );
        tokio::spawn(seq.run(backend, self.traces.clone(), self.node_name.clone()));
        Ok(body)
    }

    /// Drains the result items of the sequence at `path`. An unknown path
    /// and a wrong token are reported the same way, a poll racing another
    /// poll of the same sequence is `Busy`.
    pub async fn pop_heal_status_json(
        &self,
        path: &str,
        client_token: &str,
    ) -> Result<Vec<u8>, GenericApiError> {
        let seq = match self.get_heal_sequence(path).await {
            Some(seq) if seq.client_token == client_token => seq,
            _ => return Err(ApiError::HealNoSuchProcess.to()),
        };
        let pop = seq.begin_pop().ok_or_else(|| ApiError::Busy.to())?;

        // A stop or a force start may have replaced the sequence meanwhile.
        let current = self.get_heal_sequence(path).await;
        if !current.map_or(false, |current| Arc::ptr_eq(&current, &seq)) {
            return Err(ApiError::HealNoSuchProcess.to());
        }
        let status = seq.pop_status(&pop);
        encode_status(&status)
    }

    /// Stops and forgets the sequence at `path`.
    pub async fn stop_heal_sequence(&self, path: &str) -> Result<Vec<u8>, GenericApiError> {
        let seq = self.sequences.lock().await.remove(path);
        let status = match seq {
            Some(seq) => {
                info!("Heal sequence {} on '{}' stopped", seq.client_token, path);
                seq.stop()
            }
            None => HealTaskStatus::default(),
        };
        encode_status(&status)
    }

    /// Evicts ended sequences idle longer than the keep duration. Returns
    /// how many were removed.
    pub async fn clean_expired(&self, now: DateTime) -> usize {
        let keep = chrono::Duration::from_std(self.keep_duration)
            .unwrap_or_else(|_| chrono::Duration::max_value());
        let mut sequences = self.sequences.lock().await;
        let before = sequences.len();
        sequences.retain(|_, seq| {
            !(seq.has_ended() && seq.last_activity() + keep < now)
        });
        before - sequences.len()
    }

    pub fn spawn_cleanup(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = self.clean_expired(utils::now()).await;
                        if removed > 0 {
                            debug!("Evicted {} expired heal sequences", removed);
                        }
                    }
                }
            }
        })
    }

    pub async fn live_sequences(&self) -> usize {
        let sequences = self.sequences.lock().await;
        sequences.values().filter(|s| !s.has_ended()).count()
    }

    /// Cancels every sequence still running, used on shutdown.
    pub async fn stop_all(&self) {
        let sequences = self.sequences.lock().await;
        for seq in sequences.values().filter(|s| !s.has_ended()) {
            seq.stop();
        }
    }
}

fn encode_status(status: &HealTaskStatus) -> Result<Vec<u8>, GenericApiError> {
    serde_json::to_vec(status).map_err(|e| ApiError::InternalError.to_with_description(e.to_string()))
}

/// Whether one heal path contains the other, compared by whole path
/// components. The root path overlaps everything.
pub fn paths_overlap(a: &str, b: &str) -> bool {
    fn contains(parent: &str, child: &str) -> bool {
        let parent = parent.trim_end_matches(SLASH_SEPARATOR);
        if parent.is_empty() || parent == child.trim_end_matches(SLASH_SEPARATOR) {
            return true;
        }
        child
            .strip_prefix(parent)
            .map_or(false, |rest| rest.starts_with(SLASH_SEPARATOR))
    }
    contains(a, b) || contains(b, a)
}
