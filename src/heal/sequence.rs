use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::admin::{
    HealItemType, HealOpts, HealResultItem, HealStatusSummary, HealTaskStatus, StorageTrace,
    TraceInfo,
};
use crate::errors::TypedError;
use crate::object::ObjectLayer;
use crate::pubsub::PubSub;
use crate::utils::{self, DateTime};

pub type PopGuard<'a> = tokio::sync::MutexGuard<'a, ()>;

#[derive(Debug)]
struct SequenceState {
    summary: HealStatusSummary,
    failure_detail: String,
    end_time: Option<DateTime>,
    queue: StatusQueue,
    last_activity: DateTime,
}

/// One heal job over `bucket[/object]`, from creation until it is evicted
/// from the manager.
#[derive(Debug)]
pub struct HealSequence {
    pub bucket: String,
    pub object: String,
    pub path: String,
    pub client_token: String,
    pub client_address: String,
    pub start_time: DateTime,
    pub settings: HealOpts,
    pub force_started: bool,

    cancel: CancellationToken,
    state: Mutex<SequenceState>,
    // Serializes status polls, see `begin_pop`.
    pop_lock: tokio::sync::Mutex<()>,
}

impl HealSequence {
    pub fn new(
        bucket: &str,
        object: &str,
        client_address: &str,
        settings: HealOpts,
        force_started: bool,
    ) -> HealSequence {
        let now = utils::now();
        HealSequence {
            bucket: bucket.to_owned(),
            object: object.to_owned(),
            path: utils::path_join(&[bucket, object]),
            client_token: uuid::Uuid::new_v4().to_string(),
            client_address: client_address.to_owned(),
            start_time: now,
            settings,
            force_started,
            cancel: CancellationToken::new(),
            state: Mutex::new(SequenceState {
                summary: HealStatusSummary::NotStarted,
                failure_detail: String::new(),
                end_time: None,
                queue: StatusQueue::default(),
                last_activity: now,
            }),
            pop_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> HealSequence {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .queue = StatusQueue::new(capacity);
        self
    }

    fn lock_state(&self) -> MutexGuard<'_, SequenceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn has_ended(&self) -> bool {
        self.lock_state().end_time.is_some()
    }

    pub fn summary(&self) -> HealStatusSummary {
        self.lock_state().summary
    }

    pub fn last_activity(&self) -> DateTime {
        self.lock_state().last_activity
    }

    fn push_item(&self, item: HealResultItem) {
        let mut state = self.lock_state();
        state.queue.push(item);
        state.last_activity = utils::now();
    }

    fn set_running(&self) {
        let mut state = self.lock_state();
        if state.end_time.is_none() {
            state.summary = HealStatusSummary::Running;
        }
    }

    /// Marks the sequence ended. An already ended sequence keeps its final
    /// state.
    fn finish(&self, summary: HealStatusSummary, failure_detail: String) {
        let mut state = self.lock_state();
        if state.end_time.is_some() {
            return;
        }
        let now = utils::now();
        state.summary = summary;
        state.failure_detail = failure_detail;
        state.end_time = Some(now);
        state.last_activity = now;
    }

    fn drain_status(&self) -> HealTaskStatus {
        let mut state = self.lock_state();
        state.last_activity = utils::now();
        HealTaskStatus {
            summary: state.summary,
            failure_detail: state.failure_detail.clone(),
            start_time: self.start_time,
            heal_settings: self.settings.clone(),
            items: state.queue.drain(),
        }
    }

    /// Claims the status poll of this sequence. `None` while another poll
    /// holds it.
    pub fn begin_pop(&self) -> Option<PopGuard<'_>> {
        self.pop_lock.try_lock().ok()
    }

    /// Drains the buffered items for the poll holding `_pop`.
    pub fn pop_status(&self, _pop: &PopGuard<'_>) -> HealTaskStatus {
        self.drain_status()
    }

    /// Cancels the execution task and returns the final status with every
    /// item not polled yet.
    pub fn stop(&self) -> HealTaskStatus {
        self.cancel.cancel();
        self.finish(
            HealStatusSummary::Stopped,
            TypedError::HealStopped.to_string(),
        );
        self.drain_status()
    }

    /// Execution task of the sequence.
    pub async fn run(
        self: Arc<Self>,
        backend: Arc<dyn ObjectLayer>,
        traces: PubSub<TraceInfo>,
        node_name: String,
    ) {
        self.set_running();
        let tracer = Tracer {
            traces: &traces,
            node_name: &node_name,
        };
        match self.heal_path(backend.as_ref(), &tracer).await {
            Ok(()) => {
                debug!("Heal sequence on '{}' finished", self.path);
                self.finish(HealStatusSummary::Finished, String::new());
            }
            Err(err) => {
                warn!("Heal sequence on '{}' stopped: {}", self.path, err);
                self.finish(HealStatusSummary::Stopped, err.to_string());
            }
        }
    }

    async fn heal_path(
        &self,
        backend: &dyn ObjectLayer,
        tracer: &Tracer<'_>,
    ) -> anyhow::Result<()> {
        if !self.bucket.is_empty() {
            return self.heal_bucket(backend, tracer, &self.bucket).await;
        }

        self.heal_item(
            tracer,
            "heal_format",
            HealItemType::Metadata,
            "",
            "",
            backend.heal_format(self.settings.dry_run),
        )
        .await?;

        let buckets = self.guard(backend.list_buckets()).await?;
        for bucket in buckets {
            self.heal_bucket(backend, tracer, &bucket.name).await?;
        }
        Ok(())
    }

    async fn heal_bucket(
        &self,
        backend: &dyn ObjectLayer,
        tracer: &Tracer<'_>,
        bucket: &str,
    ) -> anyhow::Result<()> {
        self.heal_item(
            tracer,
            "heal_bucket",
            HealItemType::Bucket,
            bucket,
            "",
            backend.heal_bucket(bucket, &self.settings),
        )
        .await?;

        if !self.settings.recursive {
            if !self.object.is_empty() {
                self.heal_item(
                    tracer,
                    "heal_object",
                    HealItemType::Object,
                    bucket,
                    &self.object,
                    backend.heal_object(bucket, &self.object, "", &self.settings),
                )
                .await?;
            }
            return Ok(());
        }

        let objects = self.guard(backend.list_objects(bucket, &self.object)).await?;
        for object in objects {
            self.heal_item(
                tracer,
                "heal_object",
                HealItemType::Object,
                bucket,
                &object.name,
                backend.heal_object(bucket, &object.name, &object.version_id, &self.settings),
            )
            .await?;
        }
        Ok(())
    }

    // Awaits `fut` unless the sequence gets cancelled first.
    async fn guard<T, F>(&self, fut: F) -> anyhow::Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(TypedError::HealStopped.into());
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TypedError::HealStopped.into()),
            res = fut => res,
        }
    }

    async fn heal_item<F>(
        &self,
        tracer: &Tracer<'_>,
        fn_name: &str,
        heal_item_type: HealItemType,
        bucket: &str,
        object: &str,
        fut: F,
    ) -> anyhow::Result<()>
    where
        F: Future<Output = anyhow::Result<HealResultItem>>,
    {
        if self.cancel.is_cancelled() {
            return Err(TypedError::HealStopped.into());
        }
        let time = utils::now();
        let started = Instant::now();
        let res = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(TypedError::HealStopped.into()),
            res = fut => res,
        };
        tracer.publish(
            fn_name,
            time,
            started,
            &utils::path_join(&[bucket, object]),
            res.as_ref().err(),
        );

        let item = match res {
            Ok(item) => item,
            Err(err) => HealResultItem {
                heal_item_type,
                bucket: bucket.to_owned(),
                object: object.to_owned(),
                detail: err.to_string(),
                ..Default::default()
            },
        };
        self.push_item(item);
        Ok(())
    }
}

struct Tracer<'a> {
    traces: &'a PubSub<TraceInfo>,
    node_name: &'a str,
}

impl Tracer<'_> {
    fn publish(
        &self,
        fn_name: &str,
        time: DateTime,
        started: Instant,
        path: &str,
        err: Option<&anyhow::Error>,
    ) {
        if self.traces.subscribers_num() == 0 {
            return;
        }
        self.traces.publish(TraceInfo::Storage(StorageTrace {
            node_name: self.node_name.to_owned(),
            fn_name: fn_name.to_owned(),
            time,
            path: path.to_owned(),
            duration: started.elapsed(),
            error: err.map(|e| e.to_string()),
        }));
    }
}
