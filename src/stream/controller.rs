//! Streaming controller
//!
//! Owns the lifecycle of a backend recording session and drives the
//! periodic fetch cycle that feeds the [`LiveStore`]. Backend trouble never
//! stops the stream: a session that cannot be opened puts the controller in
//! degraded mode, and a failed fetch is replaced by one synthetic event.
//! Only an authentication failure ends the flow, after clearing credentials.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::adapter::normalize_batch;
use crate::client::{CredentialStore, LiveBackend};
use crate::config::StreamConfig;
use crate::filter::FilterState;
use crate::models::{EventOrigin, LiveEvent, StreamStats};

use super::store::LiveStore;
use super::synthetic::{EventGenerator, RandomEventGenerator};

/// Banner text shown when the recent-events load fails
pub const LOAD_FAILED_BANNER: &str = "Failed to load system events";

const STOP_POLL_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamState {
    Stopped,
    Starting,
    Streaming { session_id: String },
    /// No backend session; events are generated locally
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Streaming,
    Degraded,
    AlreadyActive,
    /// Stop was requested while the session request was in flight
    Cancelled,
    /// Credentials were rejected and have been cleared
    LoginRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not streaming
    Idle,
    /// Events from the backend were ingested
    Ingested(usize),
    /// Synthetic events were ingested instead of backend events
    Synthetic(usize),
    /// The response arrived after a stop request and was dropped
    Discarded,
    LoginRequired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(usize),
    /// Carries the banner text to show
    Failed(String),
    LoginRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Stopped,
    LoginRequired,
}

/// Requests a stop from another task or a signal handler
///
/// A request ends the running stream, or cancels the next `start()` when
/// nothing is running yet. It stays pending until the controller acts on it.
#[derive(Debug, Clone)]
pub struct StopHandle {
    stop_requested: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }
}

pub struct StreamController {
    backend: Arc<dyn LiveBackend>,
    credentials: Arc<dyn CredentialStore>,
    generator: Arc<dyn EventGenerator>,
    settings: StreamConfig,
    store: LiveStore,
    state: StreamState,
    stop_requested: Arc<AtomicBool>,
    degraded_notified: bool,
}

impl StreamController {
    pub fn new(
        backend: Arc<dyn LiveBackend>,
        credentials: Arc<dyn CredentialStore>,
        settings: StreamConfig,
    ) -> Self {
        StreamController {
            backend,
            credentials,
            generator: Arc::new(RandomEventGenerator::new()),
            store: LiveStore::new(settings.buffer_capacity),
            settings,
            state: StreamState::Stopped,
            stop_requested: Arc::new(AtomicBool::new(false)),
            degraded_notified: false,
        }
    }

    /// Replace the synthetic event source
    pub fn with_generator(mut self, generator: Arc<dyn EventGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_filter(mut self, filter: FilterState) -> Self {
        self.store.set_filter(filter);
        self
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Running and not asked to stop
    pub fn is_active(&self) -> bool {
        self.has_session_state() && !self.is_stop_requested()
    }

    fn has_session_state(&self) -> bool {
        !matches!(self.state, StreamState::Stopped)
    }

    pub fn session_id(&self) -> Option<&str> {
        match &self.state {
            StreamState::Streaming { session_id } => Some(session_id),
            _ => None,
        }
    }

    pub fn store(&self) -> &LiveStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut LiveStore {
        &mut self.store
    }

    pub fn stats(&self) -> &StreamStats {
        self.store.stats()
    }

    pub fn visible(&self) -> Vec<&LiveEvent> {
        self.store.visible()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stop_requested: Arc::clone(&self.stop_requested),
        }
    }

    fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Open a recording session, falling back to degraded mode
    ///
    /// A stop requested while nothing was running cancels this start. A
    /// stream that was asked to stop is closed first and then restarted.
    pub async fn start(&mut self) -> StartOutcome {
        if self.has_session_state() {
            if !self.is_stop_requested() {
                return StartOutcome::AlreadyActive;
            }
            self.stop().await;
        } else if self.is_stop_requested() {
            self.stop_requested.store(false, Ordering::SeqCst);
            log::info!("Stop requested before the stream started");
            return StartOutcome::Cancelled;
        }

        self.state = StreamState::Starting;
        let result = self.backend.start_recording().await;

        if self.is_stop_requested() {
            self.state = StreamState::Stopped;
            if let Ok(session_id) = result {
                self.notify_stop(&session_id).await;
            }
            self.stop_requested.store(false, Ordering::SeqCst);
            return StartOutcome::Cancelled;
        }

        match result {
            Ok(session_id) => {
                log::info!("Live stream started (session {})", session_id);
                self.state = StreamState::Streaming { session_id };
                StartOutcome::Streaming
            }
            Err(e) if e.is_auth() => {
                self.handle_auth_failure();
                StartOutcome::LoginRequired
            }
            Err(e) => {
                if !self.degraded_notified {
                    log::warn!(
                        "Could not start recording session ({}); streaming synthetic events",
                        e
                    );
                    self.degraded_notified = true;
                } else {
                    log::debug!("Recording session start failed again: {}", e);
                }
                self.state = StreamState::Degraded;
                StartOutcome::Degraded
            }
        }
    }

    /// Run one fetch cycle
    pub async fn tick(&mut self) -> TickOutcome {
        if self.is_stop_requested() {
            return TickOutcome::Idle;
        }

        let session_id = match &self.state {
            StreamState::Streaming { session_id } => session_id.clone(),
            StreamState::Degraded => {
                self.ingest_synthetic();
                return TickOutcome::Synthetic(1);
            }
            StreamState::Stopped | StreamState::Starting => return TickOutcome::Idle,
        };

        let limit = self.settings.fetch_limit;
        let result = self.backend.fetch_live_batch(&session_id, limit).await;

        if self.is_stop_requested() {
            log::debug!("Dropping live batch that arrived after stop");
            return TickOutcome::Discarded;
        }

        match result {
            Ok(batch) => {
                let rate = batch
                    .events_per_second
                    .unwrap_or_else(|| self.generator.estimate_rate());
                let raws = &batch.events[..batch.events.len().min(limit)];
                let events = normalize_batch(raws, EventOrigin::LiveStream);
                let count = events.len();
                log::debug!("Ingested {} live event(s) at {:.1} events/s", count, rate);
                self.store.ingest(events, rate);
                TickOutcome::Ingested(count)
            }
            Err(e) if e.is_auth() => {
                self.handle_auth_failure();
                TickOutcome::LoginRequired
            }
            Err(e) => {
                log::warn!("Live fetch failed, substituting synthetic event: {}", e);
                self.ingest_synthetic();
                TickOutcome::Synthetic(1)
            }
        }
    }

    /// Delay until the next tick for the current state
    pub fn next_delay(&self) -> Duration {
        match self.state {
            StreamState::Degraded => self.generator.degraded_interval(
                self.settings.degraded_min_interval(),
                self.settings.degraded_max_interval(),
            ),
            _ => self.settings.poll_interval(),
        }
    }

    /// Stop streaming; safe to call any number of times
    ///
    /// The backend is told to end the session on a best-effort basis.
    pub async fn stop(&mut self) {
        let previous = std::mem::replace(&mut self.state, StreamState::Stopped);
        if let StreamState::Streaming { session_id } = &previous {
            self.notify_stop(session_id).await;
        }
        // Acted on; a later start() begins a fresh stream
        self.stop_requested.store(false, Ordering::SeqCst);
        if previous != StreamState::Stopped {
            log::info!("Live stream stopped after {} event(s)", self.stats().total_events);
        }
    }

    /// Load recent system events for the initial view
    ///
    /// These fill the buffer but do not count towards stream statistics.
    pub async fn load_recent(&mut self, limit: usize) -> LoadOutcome {
        match self.backend.fetch_recent_events(limit).await {
            Ok(raws) => {
                let events = normalize_batch(&raws[..raws.len().min(limit)], EventOrigin::Recent);
                let count = events.len();
                self.store.preload(events);
                log::info!("Loaded {} recent event(s)", count);
                LoadOutcome::Loaded(count)
            }
            Err(e) if e.is_auth() => {
                self.handle_auth_failure();
                LoadOutcome::LoginRequired
            }
            Err(e) => {
                log::warn!("{}: {}", LOAD_FAILED_BANNER, e);
                LoadOutcome::Failed(LOAD_FAILED_BANNER.to_string())
            }
        }
    }

    /// Start, then tick until a stop is requested or login is required
    ///
    /// `sink` receives each tick's newly ingested events, newest first.
    pub async fn run_until_stopped<F>(&mut self, mut sink: F) -> RunOutcome
    where
        F: FnMut(&[&LiveEvent]),
    {
        match self.start().await {
            StartOutcome::LoginRequired => return RunOutcome::LoginRequired,
            StartOutcome::Cancelled => return RunOutcome::Stopped,
            StartOutcome::Streaming | StartOutcome::Degraded | StartOutcome::AlreadyActive => {}
        }

        while self.is_active() {
            match self.tick().await {
                TickOutcome::Ingested(count) | TickOutcome::Synthetic(count) if count > 0 => {
                    let fresh: Vec<&LiveEvent> = self.store.buffer().iter().take(count).collect();
                    sink(&fresh);
                }
                TickOutcome::LoginRequired => return RunOutcome::LoginRequired,
                _ => {}
            }
            self.sleep_until_next_tick(self.next_delay()).await;
        }

        self.stop().await;
        RunOutcome::Stopped
    }

    async fn sleep_until_next_tick(&self, delay: Duration) {
        let mut remaining = delay;
        while !self.is_stop_requested() && !remaining.is_zero() {
            let slice = remaining.min(STOP_POLL_SLICE);
            tokio::time::sleep(slice).await;
            remaining -= slice;
        }
    }

    fn ingest_synthetic(&mut self) {
        let raw = self.generator.generate();
        let events = normalize_batch(std::slice::from_ref(&raw), EventOrigin::LiveStream);
        let rate = self.generator.estimate_rate();
        self.store.ingest(events, rate);
    }

    async fn notify_stop(&self, session_id: &str) {
        if let Err(e) = self.backend.stop_recording(session_id).await {
            log::warn!("Failed to stop recording session {}: {}", session_id, e);
        }
    }

    fn handle_auth_failure(&mut self) {
        log::warn!("Backend rejected credentials; clearing token, login required");
        if let Err(e) = self.credentials.clear() {
            log::error!("Failed to clear stored credentials: {}", e);
        }
        self.stop_requested.store(false, Ordering::SeqCst);
        self.state = StreamState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientError, MemoryCredentials, RawBatch};
    use crate::models::{EventType, Severity};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy)]
    enum Failure {
        Auth,
        Down,
    }

    impl Failure {
        fn error(self) -> ClientError {
            match self {
                Failure::Auth => ClientError::Unauthorized,
                Failure::Down => ClientError::Status {
                    status: 503,
                    body: "backend down".to_string(),
                },
            }
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        start_failure: Option<Failure>,
        stop_failure: Option<Failure>,
        batches: Mutex<VecDeque<Result<RawBatch, Failure>>>,
        recent: Mutex<Option<Result<Vec<Value>, Failure>>>,
        stop_on_fetch: Mutex<Option<StopHandle>>,
        stop_on_start: Mutex<Option<StopHandle>>,
        start_calls: AtomicUsize,
        fetch_calls: AtomicUsize,
        stop_calls: AtomicUsize,
    }

    impl FakeBackend {
        fn push_batch(&self, batch: Result<RawBatch, Failure>) {
            self.batches.lock().unwrap().push_back(batch);
        }
    }

    #[async_trait]
    impl LiveBackend for FakeBackend {
        async fn start_recording(&self) -> Result<String, ClientError> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(handle) = self.stop_on_start.lock().unwrap().as_ref() {
                handle.request_stop();
            }
            match self.start_failure {
                Some(f) => Err(f.error()),
                None => Ok("rec-1".to_string()),
            }
        }

        async fn fetch_live_batch(
            &self,
            session_id: &str,
            _limit: usize,
        ) -> Result<RawBatch, ClientError> {
            assert_eq!(session_id, "rec-1");
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(handle) = self.stop_on_fetch.lock().unwrap().as_ref() {
                handle.request_stop();
            }
            match self.batches.lock().unwrap().pop_front() {
                Some(Ok(batch)) => Ok(batch),
                Some(Err(f)) => Err(f.error()),
                None => Ok(RawBatch::default()),
            }
        }

        async fn stop_recording(&self, _session_id: &str) -> Result<(), ClientError> {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
            match self.stop_failure {
                Some(f) => Err(f.error()),
                None => Ok(()),
            }
        }

        async fn fetch_recent_events(&self, _limit: usize) -> Result<Vec<Value>, ClientError> {
            match self.recent.lock().unwrap().take() {
                Some(Ok(events)) => Ok(events),
                Some(Err(f)) => Err(f.error()),
                None => Ok(Vec::new()),
            }
        }
    }

    /// Deterministic stand-in for the random generator
    struct FixedGenerator;

    impl EventGenerator for FixedGenerator {
        fn generate(&self) -> Value {
            json!({ "type": "process", "severity": "debug", "message": "synthetic tick" })
        }

        fn estimate_rate(&self) -> f64 {
            9.0
        }

        fn degraded_interval(&self, min: Duration, _max: Duration) -> Duration {
            min
        }
    }

    fn fast_settings() -> StreamConfig {
        StreamConfig {
            poll_interval_ms: 5,
            degraded_min_interval_ms: 5,
            degraded_max_interval_ms: 10,
            ..StreamConfig::default()
        }
    }

    fn controller(backend: Arc<FakeBackend>, creds: Arc<MemoryCredentials>) -> StreamController {
        StreamController::new(backend, creds, fast_settings()).with_generator(Arc::new(FixedGenerator))
    }

    fn setup(backend: FakeBackend) -> (StreamController, Arc<FakeBackend>, Arc<MemoryCredentials>) {
        let backend = Arc::new(backend);
        let creds = Arc::new(MemoryCredentials::with_token("tok"));
        (controller(backend.clone(), creds.clone()), backend, creds)
    }

    #[tokio::test]
    async fn test_end_to_end_tick() {
        let (mut ctl, backend, _) = setup(FakeBackend::default());
        backend.push_batch(Ok(RawBatch::new(vec![
            json!({ "id": "a", "type": "Network Connection", "severity": "HIGH", "message": "beacon" }),
            json!({ "id": "b", "type": "file_write", "severity": "low", "message": "dropped" }),
        ])));

        assert_eq!(ctl.start().await, StartOutcome::Streaming);
        assert_eq!(ctl.session_id(), Some("rec-1"));
        assert_eq!(ctl.tick().await, TickOutcome::Ingested(2));

        assert_eq!(ctl.store().buffer().len(), 2);
        assert_eq!(ctl.stats().total_events, 2);
        assert_eq!(ctl.stats().network_events, 1);
        assert_eq!(ctl.stats().file_events, 1);
        // No reported rate, so the generator's estimate is used
        assert_eq!(ctl.stats().events_per_second, 9.0);

        ctl.store_mut()
            .set_filter(FilterState::new().with_severities([Severity::High]));
        let visible = ctl.visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "a");
        assert_eq!(visible[0].event_type, EventType::Network);
    }

    #[tokio::test]
    async fn test_reported_rate_overwrites() {
        let (mut ctl, backend, _) = setup(FakeBackend::default());
        backend.push_batch(Ok(RawBatch::new(vec![json!({})]).with_rate(31.0)));
        backend.push_batch(Ok(RawBatch::new(vec![json!({})]).with_rate(4.0)));

        ctl.start().await;
        ctl.tick().await;
        assert_eq!(ctl.stats().events_per_second, 31.0);
        ctl.tick().await;
        assert_eq!(ctl.stats().events_per_second, 4.0);
        assert_eq!(ctl.stats().total_events, 2);
    }

    #[tokio::test]
    async fn test_batch_is_capped_at_fetch_limit() {
        let (mut ctl, backend, _) = setup(FakeBackend::default());
        backend.push_batch(Ok(RawBatch::new((0..30).map(|i| json!({ "id": i })).collect())));

        ctl.start().await;
        assert_eq!(ctl.tick().await, TickOutcome::Ingested(20));
        assert_eq!(ctl.store().buffer().len(), 20);
    }

    #[tokio::test]
    async fn test_fetch_failure_substitutes_synthetic_event() {
        let (mut ctl, backend, _) = setup(FakeBackend::default());
        backend.push_batch(Err(Failure::Down));

        ctl.start().await;
        assert_eq!(ctl.tick().await, TickOutcome::Synthetic(1));
        assert!(matches!(ctl.state(), StreamState::Streaming { .. }));

        let newest = ctl.store().buffer().newest().unwrap();
        assert_eq!(newest.message, "synthetic tick");
        assert_eq!(newest.event_type, EventType::Process);
        assert_eq!(newest.severity, Severity::Low);
        assert_eq!(ctl.stats().process_events, 1);
    }

    #[tokio::test]
    async fn test_start_failure_falls_back_to_degraded() {
        let (mut ctl, backend, creds) = setup(FakeBackend {
            start_failure: Some(Failure::Down),
            ..FakeBackend::default()
        });

        assert_eq!(ctl.start().await, StartOutcome::Degraded);
        assert_eq!(ctl.state(), &StreamState::Degraded);
        assert!(ctl.is_active());
        assert!(creds.token().is_some());

        assert_eq!(ctl.tick().await, TickOutcome::Synthetic(1));
        assert_eq!(backend.fetch_calls.load(Ordering::SeqCst), 0);
        assert_eq!(ctl.store().buffer().len(), 1);

        let delay = ctl.next_delay();
        assert_eq!(delay, Duration::from_millis(5));

        // No session was opened, so nothing to tell the backend
        ctl.stop().await;
        assert_eq!(backend.stop_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_auth_failure_on_start_clears_credentials() {
        let (mut ctl, _, creds) = setup(FakeBackend {
            start_failure: Some(Failure::Auth),
            ..FakeBackend::default()
        });

        assert_eq!(ctl.start().await, StartOutcome::LoginRequired);
        assert_eq!(ctl.state(), &StreamState::Stopped);
        assert!(creds.token().is_none());
    }

    #[tokio::test]
    async fn test_auth_failure_on_tick_stops_stream() {
        let (mut ctl, backend, creds) = setup(FakeBackend::default());
        backend.push_batch(Err(Failure::Auth));

        ctl.start().await;
        assert_eq!(ctl.tick().await, TickOutcome::LoginRequired);
        assert_eq!(ctl.state(), &StreamState::Stopped);
        assert!(creds.token().is_none());
        assert!(ctl.store().buffer().is_empty());
        assert_eq!(ctl.tick().await, TickOutcome::Idle);
    }

    #[tokio::test]
    async fn test_response_after_stop_is_discarded() {
        let (mut ctl, backend, _) = setup(FakeBackend::default());
        backend.push_batch(Ok(RawBatch::new(vec![json!({}), json!({})])));
        *backend.stop_on_fetch.lock().unwrap() = Some(ctl.stop_handle());

        ctl.start().await;
        assert_eq!(ctl.tick().await, TickOutcome::Discarded);
        assert!(ctl.store().buffer().is_empty());
        assert_eq!(ctl.stats().total_events, 0);
    }

    #[tokio::test]
    async fn test_stop_notifies_backend_once() {
        let (mut ctl, backend, _) = setup(FakeBackend::default());

        ctl.start().await;
        ctl.stop().await;
        ctl.stop().await;

        assert_eq!(ctl.state(), &StreamState::Stopped);
        assert_eq!(backend.stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctl.tick().await, TickOutcome::Idle);
    }

    #[tokio::test]
    async fn test_stop_failure_is_swallowed() {
        let (mut ctl, backend, _) = setup(FakeBackend {
            stop_failure: Some(Failure::Down),
            ..FakeBackend::default()
        });

        ctl.start().await;
        ctl.stop().await;
        assert_eq!(ctl.state(), &StreamState::Stopped);
        assert_eq!(backend.stop_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_twice_without_start() {
        let (mut ctl, _, _) = setup(FakeBackend::default());
        tokio_test::block_on(ctl.stop());
        tokio_test::block_on(ctl.stop());
        assert_eq!(ctl.state(), &StreamState::Stopped);
        assert!(!ctl.is_active());
    }

    #[tokio::test]
    async fn test_start_while_active_is_noop() {
        let (mut ctl, _, _) = setup(FakeBackend::default());
        assert_eq!(ctl.start().await, StartOutcome::Streaming);
        assert_eq!(ctl.start().await, StartOutcome::AlreadyActive);
    }

    #[tokio::test]
    async fn test_stop_requested_while_starting_cancels() {
        let (mut ctl, backend, _) = setup(FakeBackend::default());
        *backend.stop_on_start.lock().unwrap() = Some(ctl.stop_handle());

        assert_eq!(ctl.start().await, StartOutcome::Cancelled);
        assert_eq!(ctl.state(), &StreamState::Stopped);
        assert!(!ctl.is_active());
        assert_eq!(backend.stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctl.tick().await, TickOutcome::Idle);
        assert_eq!(backend.fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stop_requested_while_degraded_start_cancels() {
        let (mut ctl, backend, _) = setup(FakeBackend {
            start_failure: Some(Failure::Down),
            ..FakeBackend::default()
        });
        *backend.stop_on_start.lock().unwrap() = Some(ctl.stop_handle());

        assert_eq!(ctl.start().await, StartOutcome::Cancelled);
        assert_eq!(ctl.state(), &StreamState::Stopped);
        assert_eq!(backend.stop_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_restart_after_stop_request() {
        let (mut ctl, backend, _) = setup(FakeBackend::default());
        backend.push_batch(Ok(RawBatch::new(vec![json!({})])));

        assert_eq!(ctl.start().await, StartOutcome::Streaming);
        ctl.stop_handle().request_stop();
        assert!(!ctl.is_active());
        assert_eq!(ctl.tick().await, TickOutcome::Idle);

        // The pending request closes the old session before a new one opens
        assert_eq!(ctl.start().await, StartOutcome::Streaming);
        assert_eq!(backend.stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.start_calls.load(Ordering::SeqCst), 2);
        assert!(ctl.is_active());
        assert_eq!(ctl.tick().await, TickOutcome::Ingested(1));
    }

    #[tokio::test]
    async fn test_load_recent_preloads_without_stats() {
        let (mut ctl, backend, _) = setup(FakeBackend::default());
        *backend.recent.lock().unwrap() = Some(Ok(vec![json!({ "level": "error" }), json!({})]));

        assert_eq!(ctl.load_recent(50).await, LoadOutcome::Loaded(2));
        assert_eq!(ctl.store().buffer().len(), 2);
        assert_eq!(ctl.stats().total_events, 0);

        let agents: Vec<&str> = ctl.store().buffer().iter().map(|e| e.agent.as_str()).collect();
        assert_eq!(agents, vec!["System", "System"]);
    }

    #[tokio::test]
    async fn test_load_recent_failure_reports_banner() {
        let (mut ctl, backend, creds) = setup(FakeBackend::default());
        *backend.recent.lock().unwrap() = Some(Err(Failure::Down));

        assert_eq!(
            ctl.load_recent(50).await,
            LoadOutcome::Failed(LOAD_FAILED_BANNER.to_string())
        );
        assert!(creds.token().is_some());
    }

    #[tokio::test]
    async fn test_load_recent_auth_failure() {
        let (mut ctl, backend, creds) = setup(FakeBackend::default());
        *backend.recent.lock().unwrap() = Some(Err(Failure::Auth));

        assert_eq!(ctl.load_recent(50).await, LoadOutcome::LoginRequired);
        assert!(creds.token().is_none());
    }

    #[tokio::test]
    async fn test_run_until_stopped_honours_earlier_stop_request() {
        let (mut ctl, backend, _) = setup(FakeBackend::default());
        ctl.stop_handle().request_stop();

        let outcome = tokio::time::timeout(
            Duration::from_secs(1),
            ctl.run_until_stopped(|_| panic!("no events expected")),
        )
        .await
        .expect("run should end on the pending stop request");

        assert_eq!(outcome, RunOutcome::Stopped);
        assert_eq!(ctl.state(), &StreamState::Stopped);
        assert_eq!(backend.start_calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.fetch_calls.load(Ordering::SeqCst), 0);

        // The request was consumed; the next start opens a stream
        assert_eq!(ctl.start().await, StartOutcome::Streaming);
    }

    #[tokio::test]
    async fn test_run_until_stopped_delivers_batches() {
        let (mut ctl, backend, _) = setup(FakeBackend::default());
        backend.push_batch(Ok(RawBatch::new(vec![json!({ "id": "1" }), json!({ "id": "2" })])));
        backend.push_batch(Ok(RawBatch::new(vec![json!({ "id": "3" })])));

        let handle = ctl.stop_handle();
        let mut seen = Vec::new();
        let outcome = ctl
            .run_until_stopped(|fresh| {
                seen.extend(fresh.iter().map(|e| e.id.clone()));
                if seen.len() >= 3 {
                    handle.request_stop();
                }
            })
            .await;

        assert_eq!(outcome, RunOutcome::Stopped);
        assert_eq!(seen, vec!["1", "2", "3"]);
        assert_eq!(ctl.state(), &StreamState::Stopped);
        assert_eq!(backend.stop_calls.load(Ordering::SeqCst), 1);

        let ids: Vec<&str> = ctl.store().buffer().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
    }

    #[tokio::test]
    async fn test_run_until_stopped_in_degraded_mode() {
        let (mut ctl, _, _) = setup(FakeBackend {
            start_failure: Some(Failure::Down),
            ..FakeBackend::default()
        });

        let handle = ctl.stop_handle();
        let mut ticks = 0;
        let outcome = ctl
            .run_until_stopped(|fresh| {
                assert_eq!(fresh.len(), 1);
                ticks += 1;
                if ticks == 3 {
                    handle.request_stop();
                }
            })
            .await;

        assert_eq!(outcome, RunOutcome::Stopped);
        assert_eq!(ticks, 3);
        assert_eq!(ctl.stats().total_events, 3);
    }

    #[tokio::test]
    async fn test_run_until_stopped_on_auth_failure() {
        let (mut ctl, backend, creds) = setup(FakeBackend::default());
        backend.push_batch(Err(Failure::Auth));

        let outcome = ctl.run_until_stopped(|_| {}).await;
        assert_eq!(outcome, RunOutcome::LoginRequired);
        assert!(creds.token().is_none());
    }
}
