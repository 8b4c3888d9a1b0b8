//! End-to-end coordinator behavior against scripted collaborators.

use std::{
    sync::{Arc, Mutex, atomic::Ordering},
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};
use tubegate_core::{
    ChannelPageSink, ContentKind, Coordinator, CycleOutcome, DetectedVideo, FilterClient,
    FilterRequest, FilterSettings, FilterVerdict, ListMode, MemorySettingsStore, MemoryTabStore,
    PageUpdate, Result, SurfaceKind, TabId, TabPhase, TubegateError,
};

struct ScriptedClient {
    verdicts: Vec<FilterVerdict>,
    fail_status: Option<u16>,
    gate: Option<Arc<Notify>>,
    requests: Mutex<Vec<FilterRequest>>,
}

impl ScriptedClient {
    fn ok(verdicts: Vec<FilterVerdict>) -> Self {
        Self {
            verdicts,
            fail_status: None,
            gate: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Self::ok(Vec::new())
        }
    }

    fn gated(gate: Arc<Notify>, verdicts: Vec<FilterVerdict>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::ok(verdicts)
        }
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn last_request(&self) -> FilterRequest {
        self.requests.lock().unwrap().last().unwrap().clone()
    }
}

#[async_trait]
impl FilterClient for ScriptedClient {
    async fn classify(&self, request: &FilterRequest) -> Result<Vec<FilterVerdict>> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(status) = self.fail_status {
            return Err(TubegateError::FilterHttp { status });
        }
        Ok(self.verdicts.clone())
    }
}

struct Harness {
    coordinator: Coordinator,
    tab_store: Arc<MemoryTabStore>,
    client: Arc<ScriptedClient>,
    updates: mpsc::UnboundedReceiver<(TabId, PageUpdate)>,
}

fn harness(settings: FilterSettings, client: ScriptedClient) -> Harness {
    let client = Arc::new(client);
    let tab_store = Arc::new(MemoryTabStore::new());
    let (sink, updates) = ChannelPageSink::new();
    let coordinator = Coordinator::new(
        Arc::new(MemorySettingsStore::new(settings)),
        tab_store.clone(),
        client.clone(),
        Arc::new(sink),
        Duration::from_millis(300),
    );
    Harness {
        coordinator,
        tab_store,
        client,
        updates,
    }
}

fn video(id: &str) -> DetectedVideo {
    DetectedVideo {
        video_id: id.to_string(),
        title: format!("title-{id}"),
        channel: "channel".to_string(),
        channel_id: "/@channel".to_string(),
        thumbnail: "thumb".to_string(),
        surface: SurfaceKind::Homepage,
        content_kind: ContentKind::Video,
    }
}

fn verdict(id: &str, blocked: bool) -> FilterVerdict {
    FilterVerdict {
        uuid: id.to_string(),
        video_title: None,
        blocked,
    }
}

async fn wait_for_phase(coordinator: &Coordinator, tab_id: TabId, phase: TabPhase) {
    while coordinator.phase(tab_id) != Some(phase) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn burst_coalesces_to_last_payload() {
    let harness = harness(FilterSettings::default(), ScriptedClient::ok(vec![]));

    let first = harness.coordinator.submit(1, vec![video("a")]).unwrap();
    let second = harness.coordinator.submit(1, vec![video("b")]).unwrap();
    let third = harness.coordinator.submit(1, vec![video("c")]).unwrap();

    assert_eq!(first.outcome().await.unwrap(), CycleOutcome::Superseded);
    assert_eq!(second.outcome().await.unwrap(), CycleOutcome::Superseded);
    assert_eq!(third.outcome().await.unwrap(), CycleOutcome::Completed);

    assert_eq!(harness.client.request_count(), 1);
    let request = harness.client.last_request();
    assert_eq!(request.videos.len(), 1);
    assert_eq!(request.videos[0].uuid, "c");

    let metrics = harness.coordinator.metrics();
    assert_eq!(metrics.timers_armed_total.load(Ordering::Relaxed), 3);
    assert_eq!(metrics.timers_superseded_total.load(Ordering::Relaxed), 2);
    assert_eq!(metrics.requests_sent_total.load(Ordering::Relaxed), 1);
}

#[tokio::test(start_paused = true)]
async fn round_trip_stores_blocked_subset_and_notifies_page() {
    let mut harness = harness(
        FilterSettings::default(),
        ScriptedClient::ok(vec![verdict("a", true), verdict("b", false)]),
    );

    let ticket = harness
        .coordinator
        .submit(9, vec![video("a"), video("b")])
        .unwrap();
    assert_eq!(ticket.outcome().await.unwrap(), CycleOutcome::Completed);

    let entry = harness.tab_store.get(9).await.unwrap().unwrap();
    assert_eq!(entry.detected.len(), 2);
    assert_eq!(entry.blocked.len(), 1);
    assert_eq!(entry.blocked[0].video_id, "a");

    let (tab_id, update) = harness.updates.recv().await.unwrap();
    assert_eq!(tab_id, 9);
    assert_eq!(update, PageUpdate::blocked(vec!["a".to_string()]));

    // back to Idle once the cycle is done
    assert_eq!(harness.coordinator.phase(9), None);
}

#[tokio::test(start_paused = true)]
async fn empty_submission_is_rejected_synchronously() {
    let harness = harness(FilterSettings::default(), ScriptedClient::ok(vec![]));

    let err = harness.coordinator.submit(1, Vec::new()).unwrap_err();
    assert!(matches!(err, TubegateError::EmptyDetection));

    assert_eq!(harness.coordinator.phase(1), None);
    assert_eq!(
        harness
            .coordinator
            .metrics()
            .timers_armed_total
            .load(Ordering::Relaxed),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn empty_video_id_is_rejected_synchronously() {
    let harness = harness(FilterSettings::default(), ScriptedClient::ok(vec![]));

    let err = harness.coordinator.submit(1, vec![video("")]).unwrap_err();
    assert!(matches!(err, TubegateError::MalformedDetection { .. }));
    assert_eq!(harness.coordinator.phase(1), None);
}

#[tokio::test(start_paused = true)]
async fn payload_carries_terms_and_instructions() {
    let settings = FilterSettings {
        instructions: Some("no clickbait".to_string()),
        filter_list: vec!["ads".to_string()],
        list_mode: ListMode::BlockList,
        ..Default::default()
    };
    let harness = harness(settings, ScriptedClient::ok(vec![]));

    let ticket = harness.coordinator.submit(2, vec![video("a")]).unwrap();
    ticket.outcome().await.unwrap();

    let request = harness.client.last_request();
    assert_eq!(
        request.block_list,
        Some(vec!["ads".to_string(), "no clickbait".to_string()])
    );
    assert_eq!(request.allow_list, None);
}

#[tokio::test(start_paused = true)]
async fn supersede_aborts_the_in_flight_request() {
    let gate = Arc::new(Notify::new());
    let mut harness = harness(
        FilterSettings::default(),
        ScriptedClient::gated(gate.clone(), vec![verdict("b", true)]),
    );

    let first = harness.coordinator.submit(4, vec![video("a")]).unwrap();
    wait_for_phase(&harness.coordinator, 4, TabPhase::InFlight).await;
    assert_eq!(harness.client.request_count(), 1);

    let second = harness.coordinator.submit(4, vec![video("b")]).unwrap();
    assert_eq!(first.outcome().await.unwrap(), CycleOutcome::Superseded);

    gate.notify_one();
    assert_eq!(second.outcome().await.unwrap(), CycleOutcome::Completed);

    // only the successor's results ever landed
    let entry = harness.tab_store.get(4).await.unwrap().unwrap();
    assert_eq!(entry.detected[0].video_id, "b");
    assert_eq!(entry.blocked[0].video_id, "b");

    let (_, update) = harness.updates.recv().await.unwrap();
    assert_eq!(update, PageUpdate::blocked(vec!["b".to_string()]));
    assert!(harness.updates.try_recv().is_err());

    let metrics = harness.coordinator.metrics();
    assert_eq!(metrics.requests_sent_total.load(Ordering::Relaxed), 2);
    assert_eq!(metrics.requests_aborted_total.load(Ordering::Relaxed), 1);
}

#[tokio::test(start_paused = true)]
async fn closing_a_tab_cancels_pending_work_and_clears_state() {
    let mut harness = harness(FilterSettings::default(), ScriptedClient::ok(vec![]));

    let ticket = harness.coordinator.submit(5, vec![video("a")]).unwrap();
    assert_eq!(harness.coordinator.phase(5), Some(TabPhase::Pending));

    harness.coordinator.close_tab(5).await.unwrap();
    assert_eq!(ticket.outcome().await.unwrap(), CycleOutcome::Superseded);

    assert_eq!(harness.client.request_count(), 0);
    assert!(harness.tab_store.get(5).await.unwrap().is_none());
    assert_eq!(harness.coordinator.phase(5), None);
    assert!(harness.updates.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn closing_a_tab_aborts_the_in_flight_request_silently() {
    let gate = Arc::new(Notify::new());
    let mut harness = harness(
        FilterSettings::default(),
        ScriptedClient::gated(gate.clone(), vec![verdict("a", true)]),
    );

    let ticket = harness.coordinator.submit(6, vec![video("a")]).unwrap();
    wait_for_phase(&harness.coordinator, 6, TabPhase::InFlight).await;

    harness.coordinator.close_tab(6).await.unwrap();
    assert_eq!(ticket.outcome().await.unwrap(), CycleOutcome::Superseded);

    // the aborted cycle must not have mutated anything or messaged the page
    assert!(harness.tab_store.get(6).await.unwrap().is_none());
    assert!(harness.updates.try_recv().is_err());
    assert_eq!(
        harness
            .coordinator
            .metrics()
            .requests_aborted_total
            .load(Ordering::Relaxed),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn http_failure_reaches_caller_and_page_context() {
    let mut harness = harness(FilterSettings::default(), ScriptedClient::failing(500));

    let ticket = harness.coordinator.submit(7, vec![video("a")]).unwrap();
    let err = ticket.outcome().await.unwrap_err();
    assert!(matches!(err, TubegateError::FilterHttp { status: 500 }));

    let (tab_id, update) = harness.updates.recv().await.unwrap();
    assert_eq!(tab_id, 7);
    assert!(update.data.is_none());
    assert!(update.error.unwrap().contains("500"));

    // failed cycles leave no stored entry behind
    assert!(harness.tab_store.get(7).await.unwrap().is_none());
    assert_eq!(harness.coordinator.phase(7), None);
}

#[tokio::test(start_paused = true)]
async fn disabled_mode_skips_the_network_entirely() {
    let settings = FilterSettings {
        list_mode: ListMode::Disabled,
        ..Default::default()
    };
    let mut harness = harness(settings, ScriptedClient::ok(vec![verdict("a", true)]));

    let ticket = harness.coordinator.submit(8, vec![video("a")]).unwrap();
    assert_eq!(ticket.outcome().await.unwrap(), CycleOutcome::Completed);

    assert_eq!(harness.client.request_count(), 0);
    let entry = harness.tab_store.get(8).await.unwrap().unwrap();
    assert!(entry.blocked.is_empty());

    let (_, update) = harness.updates.recv().await.unwrap();
    assert_eq!(update, PageUpdate::blocked(Vec::new()));
}

#[tokio::test(start_paused = true)]
async fn tabs_do_not_interfere_with_each_other() {
    let harness = harness(FilterSettings::default(), ScriptedClient::ok(vec![]));

    let left = harness.coordinator.submit(1, vec![video("a")]).unwrap();
    let right = harness.coordinator.submit(2, vec![video("b")]).unwrap();

    assert_eq!(left.outcome().await.unwrap(), CycleOutcome::Completed);
    assert_eq!(right.outcome().await.unwrap(), CycleOutcome::Completed);
    assert_eq!(harness.client.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn phase_tracks_the_tab_lifecycle() {
    let gate = Arc::new(Notify::new());
    let harness = harness(
        FilterSettings::default(),
        ScriptedClient::gated(gate.clone(), vec![]),
    );

    assert_eq!(harness.coordinator.phase(3), None);

    let ticket = harness.coordinator.submit(3, vec![video("a")]).unwrap();
    assert_eq!(harness.coordinator.phase(3), Some(TabPhase::Pending));

    wait_for_phase(&harness.coordinator, 3, TabPhase::InFlight).await;

    gate.notify_one();
    assert_eq!(ticket.outcome().await.unwrap(), CycleOutcome::Completed);
    assert_eq!(harness.coordinator.phase(3), None);
}
