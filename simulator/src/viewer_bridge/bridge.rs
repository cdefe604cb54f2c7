use crate::workflow::coordinator::IngestionCoordinator;
use anyhow::Context;
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use scancore::broadcast::{BroadcastHub, ConnectionId, FrameSink};
use scancore::sensor_interface::SensorFrame;
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use warp::http::StatusCode;
use warp::ws::{Message, WebSocket};
use warp::{Filter, Rejection, Reply};

/// HTTP and WebSocket surface for live viewers and frame producers.
#[derive(Clone)]
pub struct ViewerBridge {
    coordinator: Arc<IngestionCoordinator>,
    subscriber_queue: usize,
}

impl ViewerBridge {
    pub fn new(coordinator: Arc<IngestionCoordinator>, subscriber_queue: usize) -> Self {
        Self {
            coordinator,
            subscriber_queue: subscriber_queue.max(1),
        }
    }

    pub fn routes(&self) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
        let coordinator = Arc::clone(&self.coordinator);
        let coordinator_filter = warp::any().map(move || Arc::clone(&coordinator));
        let hub = self.coordinator.hub().clone();
        let hub_filter = warp::any().map(move || hub.clone());
        let queue = self.subscriber_queue;

        let ws_route = warp::path("ws")
            .and(warp::path::end())
            .and(warp::ws())
            .and(hub_filter)
            .map(move |ws: warp::ws::Ws, hub: BroadcastHub| {
                ws.on_upgrade(move |socket| serve_viewer(socket, hub, queue))
            });

        let ingest_route = warp::path("ingest")
            .and(warp::path::end())
            .and(warp::post())
            .and(warp::body::json())
            .and(coordinator_filter.clone())
            .and_then(ingest_frame);

        let snapshot_route = warp::path("snapshot")
            .and(warp::path::end())
            .and(warp::get())
            .and(coordinator_filter.clone())
            .map(|coordinator: Arc<IngestionCoordinator>| {
                warp::reply::json(&coordinator.snapshot())
            });

        let recent_route = warp::path!("frames" / "recent")
            .and(warp::get())
            .and(coordinator_filter.clone())
            .map(|coordinator: Arc<IngestionCoordinator>| {
                warp::reply::json(&coordinator.hub().recent_frames())
            });

        let metrics_route = warp::path("metrics")
            .and(warp::path::end())
            .and(warp::get())
            .and(coordinator_filter)
            .map(|coordinator: Arc<IngestionCoordinator>| {
                warp::reply::json(&json!({
                    "metrics": coordinator.metrics(),
                    "connections": coordinator.hub().connection_count(),
                    "broadcasting": coordinator.hub().is_broadcasting(),
                }))
            });

        ws_route
            .or(ingest_route)
            .or(snapshot_route)
            .or(recent_route)
            .or(metrics_route)
    }

    /// Binds the routes; the returned future runs until `shutdown` resolves.
    pub fn bind(
        &self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<(SocketAddr, impl Future<Output = ()>)> {
        let (bound, server) = warp::serve(self.routes())
            .try_bind_with_graceful_shutdown(addr, shutdown)
            .with_context(|| format!("binding viewer bridge on {}", addr))?;
        info!("viewer bridge listening on {}", bound);
        Ok((bound, server))
    }
}

async fn ingest_frame(
    frame: SensorFrame,
    coordinator: Arc<IngestionCoordinator>,
) -> Result<impl Reply, Rejection> {
    let kind = frame.kind();
    let outcome = tokio::task::spawn_blocking(move || coordinator.ingest(&frame)).await;
    let reply = match outcome {
        Ok(Ok((analytics, report))) => warp::reply::with_status(
            warp::reply::json(&json!({
                "status": "ok",
                "analytics": analytics,
                "delivered": report.delivered,
                "failed": report.failed,
            })),
            StatusCode::OK,
        ),
        Ok(Err(err)) => {
            warn!("ingest of {} frame failed: {:#}", kind, err);
            warp::reply::with_status(
                warp::reply::json(&json!({ "status": "error", "message": format!("{:#}", err) })),
                StatusCode::UNPROCESSABLE_ENTITY,
            )
        }
        Err(err) => {
            warn!("ingest worker for {} frame aborted: {}", kind, err);
            warp::reply::with_status(
                warp::reply::json(&json!({ "status": "error", "message": "ingest aborted" })),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        }
    };
    Ok(reply)
}

/// Pumps hub frames to one viewer until either side goes away.
async fn serve_viewer(socket: WebSocket, hub: BroadcastHub, queue: usize) {
    let (mut outbound, mut inbound) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Arc<str>>(queue);
    let id = ConnectionId::next();
    let sink: Arc<dyn FrameSink> = Arc::new(tx);
    hub.register(id, sink);

    let forward = async {
        while let Some(text) = rx.recv().await {
            if let Err(err) = outbound.send(Message::text(text.to_string())).await {
                debug!("{} send failed: {}", id, err);
                break;
            }
        }
    };
    let drain = async {
        while let Some(message) = inbound.next().await {
            match message {
                Ok(msg) if msg.is_close() => break,
                Ok(_) => {}
                Err(err) => {
                    debug!("{} receive failed: {}", id, err);
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = forward => {}
        _ = drain => {}
    }
    hub.unregister(id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::config::WorkflowConfig;
    use serde_json::Value;

    fn bridge() -> ViewerBridge {
        let mut config = WorkflowConfig::default();
        config.classifier.n_estimators = 10;
        config.classifier.samples_per_class = 20;
        ViewerBridge::new(Arc::new(IngestionCoordinator::new(&config)), 4)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn ingest_updates_snapshot() {
        let bridge = bridge();
        let routes = bridge.routes();
        bridge.coordinator.hub().start_broadcasting().await;

        let response = warp::test::request()
            .method("POST")
            .path("/ingest")
            .json(&json!({
                "kind": "radar",
                "depth_profile": [0.1, 0.2, 0.15, 0.3, 0.8, 0.9, 0.85, 0.3, 0.2, 0.15, 0.1],
                "timestamp": 11
            }))
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["analytics"]["type"], "radar_data");

        let snapshot = warp::test::request()
            .method("GET")
            .path("/snapshot")
            .reply(&routes)
            .await;
        let body: Value = serde_json::from_slice(snapshot.body()).unwrap();
        assert_eq!(body["updated_at"], 11);

        let recent = warp::test::request()
            .method("GET")
            .path("/frames/recent")
            .reply(&routes)
            .await;
        let frames: Vec<Value> = serde_json::from_slice(recent.body()).unwrap();
        assert_eq!(frames.len(), 1);
    }

    #[tokio::test]
    async fn malformed_frame_is_rejected() {
        let routes = bridge().routes();
        let response = warp::test::request()
            .method("POST")
            .path("/ingest")
            .json(&json!({ "kind": "sonar" }))
            .reply(&routes)
            .await;
        assert!(response.status().is_client_error());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn ingest_while_stopped_updates_snapshot_only() {
        let bridge = bridge();
        let routes = bridge.routes();
        let response = warp::test::request()
            .method("POST")
            .path("/ingest")
            .json(&json!({ "kind": "camera", "timestamp": 3 }))
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["delivered"], 0);
        assert!(bridge.coordinator.hub().recent_frames().is_empty());
        assert_eq!(bridge.coordinator.snapshot().frames_merged, 1);
    }

    #[tokio::test]
    async fn metrics_report_connections() {
        let routes = bridge().routes();
        let response = warp::test::request()
            .method("GET")
            .path("/metrics")
            .reply(&routes)
            .await;
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["connections"], 0);
        assert_eq!(body["metrics"]["frames_processed"], 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn websocket_viewer_receives_broadcast() {
        let bridge = bridge();
        let routes = bridge.routes();
        let mut client = warp::test::ws()
            .path("/ws")
            .handshake(routes)
            .await
            .expect("handshake");

        for _ in 0..50 {
            if bridge.coordinator.hub().connection_count() == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        bridge.coordinator.hub().broadcast(&json!({ "type": "ping" }));
        let message = client.recv().await.expect("message");
        assert!(message.to_str().unwrap_or_default().contains("ping"));
    }
}
