//! Connection registry and fan-out worker.
//!
//! Frames reach subscribers either directly through [`BroadcastHub::broadcast`]
//! from async code, or through [`BroadcastHub::dispatch_from_external_context`]
//! from plain OS threads. The latter hands the payload to a dispatch task
//! owned by the hub and waits, with a bounded timeout, for its delivery
//! report.

use crate::broadcast::buffer::FrameBuffer;
use crate::broadcast::sink::{ConnectionId, FrameSink};
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::MetricsRecorder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HubConfig {
    /// Recent frames kept for late joiners.
    pub buffer_capacity: usize,
    pub dispatch_timeout_ms: u64,
    /// Pending external dispatches before new ones are refused.
    pub dispatch_queue: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 100,
            dispatch_timeout_ms: 1000,
            dispatch_queue: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Result of a dispatch requested from outside the async runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered(BroadcastReport),
    TimedOut,
    /// No dispatch worker is running.
    NoContext,
    Failed(String),
}

struct DispatchRequest {
    payload: Value,
    ack: SyncSender<BroadcastReport>,
}

struct Worker {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

struct HubInner {
    config: HubConfig,
    connections: RwLock<HashMap<ConnectionId, Arc<dyn FrameSink>>>,
    buffer: FrameBuffer,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
    broadcasting: AtomicBool,
    dispatch: Mutex<Option<mpsc::Sender<DispatchRequest>>>,
    worker: tokio::sync::Mutex<Option<Worker>>,
}

/// Cheaply clonable handle to the shared hub state.
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

impl BroadcastHub {
    pub fn new(config: HubConfig, metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            inner: Arc::new(HubInner {
                buffer: FrameBuffer::new(config.buffer_capacity),
                config,
                connections: RwLock::new(HashMap::new()),
                metrics,
                logger: LogManager::new("BroadcastHub"),
                broadcasting: AtomicBool::new(false),
                dispatch: Mutex::new(None),
                worker: tokio::sync::Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    /// Adds a subscriber. Returns `false` if the id was already registered.
    pub fn register(&self, id: ConnectionId, sink: Arc<dyn FrameSink>) -> bool {
        let mut connections = self
            .inner
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if connections.contains_key(&id) {
            return false;
        }
        connections.insert(id, sink);
        self.inner.logger.record(&format!(
            "{} connected, {} active",
            id,
            connections.len()
        ));
        true
    }

    /// Removes a subscriber; absent ids are ignored.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        self.inner.unregister(id)
    }

    pub fn connection_count(&self) -> usize {
        self.inner
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_broadcasting(&self) -> bool {
        self.inner.broadcasting.load(Ordering::Acquire)
    }

    pub fn recent_frames(&self) -> Vec<Value> {
        self.inner.buffer.snapshot()
    }

    pub fn broadcast(&self, payload: &Value) -> BroadcastReport {
        self.inner.broadcast(payload)
    }

    /// Delivers `payload` through the dispatch worker and blocks the calling
    /// thread until the worker reports back or the dispatch timeout expires.
    ///
    /// Meant for threads outside the runtime; never panics or returns an
    /// error, every outcome is logged.
    pub fn dispatch_from_external_context(&self, payload: Value) -> DispatchOutcome {
        let outcome = self.try_dispatch(payload);
        match &outcome {
            DispatchOutcome::Delivered(report) => self.inner.logger.detail(&format!(
                "external dispatch delivered to {}/{}",
                report.delivered,
                report.delivered + report.failed
            )),
            DispatchOutcome::TimedOut => self.inner.logger.degraded(&format!(
                "external dispatch timed out after {} ms",
                self.inner.config.dispatch_timeout_ms
            )),
            DispatchOutcome::NoContext => self
                .inner
                .logger
                .degraded("external dispatch skipped: dispatch worker not running"),
            DispatchOutcome::Failed(reason) => self
                .inner
                .logger
                .degraded(&format!("external dispatch failed: {}", reason)),
        }
        outcome
    }

    fn try_dispatch(&self, payload: Value) -> DispatchOutcome {
        let sender = self
            .inner
            .dispatch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(sender) = sender else {
            return DispatchOutcome::NoContext;
        };

        let (ack, report) = sync_channel(1);
        match sender.try_send(DispatchRequest { payload, ack }) {
            Ok(()) => {}
            Err(TrySendError::Closed(_)) => return DispatchOutcome::NoContext,
            Err(TrySendError::Full(_)) => {
                return DispatchOutcome::Failed("dispatch queue full".to_string())
            }
        }
        drop(sender);

        let timeout = Duration::from_millis(self.inner.config.dispatch_timeout_ms);
        match report.recv_timeout(timeout) {
            Ok(report) => DispatchOutcome::Delivered(report),
            Err(RecvTimeoutError::Timeout) => DispatchOutcome::TimedOut,
            Err(RecvTimeoutError::Disconnected) => {
                DispatchOutcome::Failed("request dropped before dispatch".to_string())
            }
        }
    }

    /// Spawns the dispatch worker on the current runtime. Idempotent.
    pub async fn start_broadcasting(&self) {
        let mut worker = self.inner.worker.lock().await;
        if worker.is_some() {
            return;
        }

        let (tx, rx) = mpsc::channel(self.inner.config.dispatch_queue.max(1));
        let (shutdown, stop) = oneshot::channel();
        let handle = tokio::spawn(run_dispatch(Arc::downgrade(&self.inner), rx, stop));

        *self
            .inner
            .dispatch
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);
        *worker = Some(Worker { shutdown, handle });
        self.inner.broadcasting.store(true, Ordering::Release);
        self.inner.logger.record("broadcasting started");
    }

    /// Closes the dispatch context and waits for the worker to exit.
    /// Requests still queued are dropped. Idempotent.
    pub async fn stop_broadcasting(&self) {
        let mut worker = self.inner.worker.lock().await;
        self.inner
            .dispatch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.inner.broadcasting.store(false, Ordering::Release);

        let Some(Worker { shutdown, handle }) = worker.take() else {
            return;
        };
        let _ = shutdown.send(());
        if let Err(err) = handle.await {
            self.inner
                .logger
                .degraded(&format!("dispatch worker ended abnormally: {}", err));
        }
        self.inner.logger.record("broadcasting stopped");
    }
}

impl HubInner {
    fn unregister(&self, id: ConnectionId) -> bool {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let removed = connections.remove(&id).is_some();
        if removed {
            self.logger
                .record(&format!("{} disconnected, {} active", id, connections.len()));
        }
        removed
    }

    fn broadcast(&self, payload: &Value) -> BroadcastReport {
        let targets: Vec<(ConnectionId, Arc<dyn FrameSink>)> = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, sink)| (*id, Arc::clone(sink)))
            .collect();

        self.logger
            .detail(&format!("attempting broadcast to {} connections", targets.len()));

        let text: Arc<str> = Arc::from(payload.to_string());
        let mut report = BroadcastReport::default();
        let mut dead = Vec::new();
        for (id, sink) in &targets {
            match sink.try_deliver(Arc::clone(&text)) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    self.logger.degraded(&format!("delivery to {} failed: {}", id, err));
                    report.failed += 1;
                    dead.push(*id);
                }
            }
        }
        for id in dead {
            self.unregister(id);
        }

        self.buffer.push(payload.clone());
        self.metrics.record_delivery(report.delivered, report.failed);
        self.logger.detail(&format!(
            "broadcast completed {}/{}",
            report.delivered,
            targets.len()
        ));
        report
    }
}

async fn run_dispatch(
    hub: Weak<HubInner>,
    mut requests: mpsc::Receiver<DispatchRequest>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            request = requests.recv() => {
                let Some(DispatchRequest { payload, ack }) = request else {
                    break;
                };
                let Some(hub) = hub.upgrade() else {
                    break;
                };
                let report = hub.broadcast(&payload);
                // The caller may already have timed out.
                let _ = ack.try_send(report);
            }
        }
    }
    requests.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::sink::DeliveryError;
    use serde_json::json;

    fn hub_with(config: HubConfig) -> BroadcastHub {
        BroadcastHub::new(config, Arc::new(MetricsRecorder::new()))
    }

    fn subscriber(capacity: usize) -> (Arc<dyn FrameSink>, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(capacity);
        let sink: Arc<dyn FrameSink> = Arc::new(tx);
        (sink, rx)
    }

    struct SlowSink(Duration);

    impl FrameSink for SlowSink {
        fn try_deliver(&self, _payload: Arc<str>) -> Result<(), DeliveryError> {
            std::thread::sleep(self.0);
            Ok(())
        }
    }

    #[test]
    fn register_and_unregister_are_idempotent() {
        let hub = hub_with(HubConfig::default());
        let id = ConnectionId::next();
        let (sink, _rx) = subscriber(4);
        assert!(hub.register(id, Arc::clone(&sink)));
        assert!(!hub.register(id, sink));
        assert_eq!(hub.connection_count(), 1);
        assert!(hub.unregister(id));
        assert!(!hub.unregister(id));
        assert!(!hub.unregister(ConnectionId::next()));
        assert_eq!(hub.connection_count(), 0);
    }

    #[tokio::test]
    async fn failed_subscribers_are_dropped_and_others_still_receive() {
        let hub = hub_with(HubConfig::default());
        let (healthy, mut healthy_rx) = subscriber(4);
        let (closed, closed_rx) = subscriber(4);
        let (full, _full_rx) = subscriber(1);
        full.try_deliver(Arc::from("backlog")).unwrap();
        drop(closed_rx);

        let healthy_id = ConnectionId::next();
        hub.register(healthy_id, healthy);
        hub.register(ConnectionId::next(), closed);
        hub.register(ConnectionId::next(), full);

        let report = hub.broadcast(&json!({ "type": "radar_data", "seq": 1 }));
        assert_eq!(report, BroadcastReport { delivered: 1, failed: 2 });
        assert_eq!(hub.connection_count(), 1);
        assert!(!hub.unregister(ConnectionId::next()));
        assert!(hub.unregister(healthy_id));

        let received = healthy_rx.recv().await.unwrap();
        assert!(received.contains("radar_data"));
        assert_eq!(hub.recent_frames().len(), 1);
        assert_eq!(hub.inner.metrics.snapshot().delivery_failures, 2);
    }

    #[test]
    fn frame_buffer_keeps_latest_frames() {
        let hub = hub_with(HubConfig {
            buffer_capacity: 3,
            ..Default::default()
        });
        for seq in 0..4 {
            hub.broadcast(&json!({ "seq": seq }));
        }
        let frames = hub.recent_frames();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0]["seq"], 1);
    }

    #[test]
    fn external_dispatch_without_worker_returns_no_context() {
        let hub = hub_with(HubConfig::default());
        let started = std::time::Instant::now();
        assert_eq!(
            hub.dispatch_from_external_context(json!({ "seq": 0 })),
            DispatchOutcome::NoContext
        );
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn external_dispatch_reaches_subscribers() {
        let hub = hub_with(HubConfig::default());
        let (sink, mut rx) = subscriber(8);
        hub.register(ConnectionId::next(), sink);
        hub.start_broadcasting().await;
        hub.start_broadcasting().await;
        assert!(hub.is_broadcasting());

        let producer = hub.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            std::thread::spawn(move || producer.dispatch_from_external_context(json!({ "seq": 7 })))
                .join()
                .unwrap()
        })
        .await
        .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Delivered(BroadcastReport { delivered: 1, failed: 0 })
        );
        assert!(rx.recv().await.unwrap().contains("\"seq\":7"));
        hub.stop_broadcasting().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dispatch_after_stop_has_no_context() {
        let hub = hub_with(HubConfig::default());
        hub.start_broadcasting().await;
        hub.stop_broadcasting().await;
        hub.stop_broadcasting().await;
        assert!(!hub.is_broadcasting());

        let producer = hub.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            producer.dispatch_from_external_context(json!({ "late": true }))
        })
        .await
        .unwrap();
        assert_eq!(outcome, DispatchOutcome::NoContext);
        assert!(hub.recent_frames().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn slow_delivery_times_out() {
        let hub = hub_with(HubConfig {
            dispatch_timeout_ms: 50,
            ..Default::default()
        });
        hub.register(ConnectionId::next(), Arc::new(SlowSink(Duration::from_millis(300))));
        hub.start_broadcasting().await;

        let producer = hub.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            producer.dispatch_from_external_context(json!({ "seq": 1 }))
        })
        .await
        .unwrap();
        assert_eq!(outcome, DispatchOutcome::TimedOut);
        hub.stop_broadcasting().await;
    }

    #[test]
    fn registry_stays_consistent_under_concurrent_churn() {
        let hub = hub_with(HubConfig::default());
        std::thread::scope(|scope| {
            for worker in 0..4 {
                let hub = &hub;
                scope.spawn(move || {
                    let (sink, _rx) = subscriber(2048);
                    for seq in 0..250 {
                        let id = ConnectionId::next();
                        assert!(hub.register(id, Arc::clone(&sink)));
                        hub.broadcast(&json!({ "worker": worker, "seq": seq }));
                        hub.unregister(id);
                    }
                });
            }
        });
        assert_eq!(hub.connection_count(), 0);
        assert_eq!(hub.recent_frames().len(), 100);
        assert_eq!(hub.inner.buffer.len(), 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn queued_dispatches_fail_when_broadcasting_stops() {
        let hub = hub_with(HubConfig {
            dispatch_timeout_ms: 5000,
            ..Default::default()
        });
        hub.register(ConnectionId::next(), Arc::new(SlowSink(Duration::from_millis(400))));
        hub.start_broadcasting().await;

        let started = std::time::Instant::now();
        let producers: Vec<_> = (0..3)
            .map(|seq| {
                let producer = hub.clone();
                std::thread::spawn(move || {
                    producer.dispatch_from_external_context(json!({ "seq": seq }))
                })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(100)).await;
        hub.stop_broadcasting().await;

        let outcomes = tokio::task::spawn_blocking(move || {
            producers.into_iter().map(|p| p.join().unwrap()).collect::<Vec<_>>()
        })
        .await
        .unwrap();

        assert!(started.elapsed() < Duration::from_millis(2000));
        assert!(outcomes.iter().all(|o| !matches!(o, DispatchOutcome::TimedOut)));
        assert!(outcomes.iter().any(|o| matches!(o, DispatchOutcome::Failed(_))));
    }
}
