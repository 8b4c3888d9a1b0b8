//! Per-tab request coordination.
//!
//! Converts bursts of detection events into at most one outstanding
//! classification request per tab. A newer submission always supersedes
//! older pending work for the same tab; tabs are fully independent.
//! Per tab the lifecycle is `Idle -> Pending -> InFlight -> Idle`, with
//! tab close removing the state outright.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::Utc;
use tokio::{
    sync::oneshot,
    task::{AbortHandle, JoinHandle},
};
use uuid::Uuid;

use crate::{
    api::FilterRequest,
    client::FilterClient,
    error::{Result, TubegateError},
    sink::{PageSink, PageUpdate},
    storage::{SettingsStore, TabStore},
    types::{BlockedVideoDetails, DetectedVideo, ListMode, TabId},
};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Terminal state of one accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The cycle ran to completion and results were propagated.
    Completed,
    /// A newer submission (or tab close) cancelled this one. Silent.
    Superseded,
}

pub type CycleResult = Result<CycleOutcome>;

/// Handle returned by [`Coordinator::submit`]; resolves exactly once.
pub struct CycleTicket {
    rx: oneshot::Receiver<CycleResult>,
}

impl CycleTicket {
    pub async fn outcome(self) -> CycleResult {
        // a dropped sender means the coordinator went away mid-cycle
        self.rx.await.unwrap_or(Ok(CycleOutcome::Superseded))
    }
}

/// Observable slice of a tab's request state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabPhase {
    Pending,
    InFlight,
}

pub struct CoordinatorMetrics {
    pub timers_armed_total: AtomicU64,
    pub timers_superseded_total: AtomicU64,
    pub requests_sent_total: AtomicU64,
    pub requests_aborted_total: AtomicU64,
    pub cycles_completed_total: AtomicU64,
    pub cycles_failed_total: AtomicU64,
}

impl CoordinatorMetrics {
    pub fn new() -> Self {
        Self {
            timers_armed_total: AtomicU64::new(0),
            timers_superseded_total: AtomicU64::new(0),
            requests_sent_total: AtomicU64::new(0),
            requests_aborted_total: AtomicU64::new(0),
            cycles_completed_total: AtomicU64::new(0),
            cycles_failed_total: AtomicU64::new(0),
        }
    }
}

impl Default for CoordinatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// One slot each for the pending timer and the in-flight request.
/// The epoch guards against a superseded cycle task touching slots its
/// successor already owns.
#[derive(Default)]
struct TabRequestState {
    epoch: u64,
    debounce: Option<JoinHandle<()>>,
    in_flight: Option<AbortHandle>,
    responder: Option<oneshot::Sender<CycleResult>>,
}

impl TabRequestState {
    fn supersede(&mut self, metrics: &CoordinatorMetrics) {
        if let Some(timer) = self.debounce.take() {
            timer.abort();
            metrics.timers_superseded_total.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(request) = self.in_flight.take() {
            request.abort();
            metrics.requests_aborted_total.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(responder) = self.responder.take() {
            let _ = responder.send(Ok(CycleOutcome::Superseded));
        }
    }
}

pub struct Coordinator {
    inner: Arc<Inner>,
}

struct Inner {
    tabs: Mutex<HashMap<TabId, TabRequestState>>,
    settings: Arc<dyn SettingsStore>,
    tab_store: Arc<dyn TabStore>,
    client: Arc<dyn FilterClient>,
    sink: Arc<dyn PageSink>,
    metrics: CoordinatorMetrics,
    debounce: Duration,
}

impl Coordinator {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        tab_store: Arc<dyn TabStore>,
        client: Arc<dyn FilterClient>,
        sink: Arc<dyn PageSink>,
        debounce: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                tabs: Mutex::new(HashMap::new()),
                settings,
                tab_store,
                client,
                sink,
                metrics: CoordinatorMetrics::new(),
                debounce,
            }),
        }
    }

    /// Accept a detection event for `tab_id`. Rejects empty or
    /// malformed input synchronously without touching any state.
    /// Otherwise cancels whatever the tab had pending or in flight and
    /// arms a fresh debounce timer: of N submissions inside the window,
    /// only the last payload is ever sent.
    pub fn submit(&self, tab_id: TabId, detected: Vec<DetectedVideo>) -> Result<CycleTicket> {
        if detected.is_empty() {
            return Err(TubegateError::EmptyDetection);
        }
        if detected.iter().any(|video| video.video_id.is_empty()) {
            return Err(TubegateError::MalformedDetection {
                reason: "detected video with empty id".to_string(),
            });
        }

        let (done_tx, done_rx) = oneshot::channel();
        let cycle = Uuid::new_v4();

        let inner = &self.inner;
        let mut tabs = inner.tabs.lock().expect("coordinator tab map poisoned");
        let state = tabs.entry(tab_id).or_default();
        state.supersede(&inner.metrics);
        state.epoch += 1;
        let epoch = state.epoch;

        let task = Arc::clone(inner);
        state.debounce = Some(tokio::spawn(async move {
            task.run_cycle(tab_id, epoch, cycle, detected).await;
        }));
        state.responder = Some(done_tx);
        inner.metrics.timers_armed_total.fetch_add(1, Ordering::Relaxed);

        Ok(CycleTicket { rx: done_rx })
    }

    /// Tab closed: cancel pending work and drop the stored entry.
    pub async fn close_tab(&self, tab_id: TabId) -> Result<()> {
        if let Some(mut state) = self
            .inner
            .tabs
            .lock()
            .expect("coordinator tab map poisoned")
            .remove(&tab_id)
        {
            state.supersede(&self.inner.metrics);
        }
        self.inner.tab_store.remove(tab_id).await
    }

    pub fn phase(&self, tab_id: TabId) -> Option<TabPhase> {
        let tabs = self.inner.tabs.lock().expect("coordinator tab map poisoned");
        let state = tabs.get(&tab_id)?;
        if state.debounce.is_some() {
            Some(TabPhase::Pending)
        } else if state.in_flight.is_some() {
            Some(TabPhase::InFlight)
        } else {
            None
        }
    }

    pub fn metrics(&self) -> &CoordinatorMetrics {
        &self.inner.metrics
    }
}

impl Inner {
    async fn run_cycle(
        self: Arc<Self>,
        tab_id: TabId,
        epoch: u64,
        cycle: Uuid,
        detected: Vec<DetectedVideo>,
    ) {
        tokio::time::sleep(self.debounce).await;

        // Pending -> InFlight: hand our own task handle over to the
        // in-flight slot so a later submit can abort the network call.
        {
            let mut tabs = self.tabs.lock().expect("coordinator tab map poisoned");
            let Some(state) = tabs.get_mut(&tab_id) else {
                return;
            };
            if state.epoch != epoch {
                return;
            }
            state.in_flight = state.debounce.take().map(|handle| handle.abort_handle());
        }

        let result = self.classify(tab_id, cycle, &detected).await;

        // Back to Idle, unless a newer submission owns the slots now.
        let responder = {
            let mut tabs = self.tabs.lock().expect("coordinator tab map poisoned");
            match tabs.get_mut(&tab_id) {
                Some(state) if state.epoch == epoch => {
                    state.in_flight = None;
                    state.responder.take()
                }
                _ => return,
            }
        };

        match result {
            Ok(()) => {
                self.metrics.cycles_completed_total.fetch_add(1, Ordering::Relaxed);
                if let Some(responder) = responder {
                    let _ = responder.send(Ok(CycleOutcome::Completed));
                }
            }
            Err(err) => {
                self.metrics.cycles_failed_total.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(tab_id, %cycle, error = %err, "filter cycle failed");
                self.sink
                    .notify(tab_id, PageUpdate::failed(err.to_string()))
                    .await;
                if let Some(responder) = responder {
                    let _ = responder.send(Err(err));
                }
            }
        }
    }

    async fn classify(&self, tab_id: TabId, cycle: Uuid, detected: &[DetectedVideo]) -> Result<()> {
        let settings = self.settings.get().await?;

        if settings.list_mode == ListMode::Disabled {
            // filtering off: keep the detection snapshot, block nothing
            self.tab_store
                .replace(tab_id, detected.to_vec(), Vec::new())
                .await?;
            self.sink.notify(tab_id, PageUpdate::blocked(Vec::new())).await;
            return Ok(());
        }

        let request = FilterRequest::build(detected, &settings);
        self.metrics.requests_sent_total.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(tab_id, %cycle, videos = detected.len(), "querying filter service");
        let verdicts = self.client.classify(&request).await?;

        let blocked_ids: Vec<String> = verdicts
            .iter()
            .filter(|verdict| verdict.blocked)
            .map(|verdict| verdict.uuid.clone())
            .collect();

        let now = Utc::now();
        let blocked: Vec<BlockedVideoDetails> = detected
            .iter()
            .filter(|video| blocked_ids.iter().any(|id| *id == video.video_id))
            .map(|video| BlockedVideoDetails::from_detected(video, now))
            .collect();

        self.tab_store.replace(tab_id, detected.to_vec(), blocked).await?;
        self.sink.notify(tab_id, PageUpdate::blocked(blocked_ids)).await;
        Ok(())
    }
}
