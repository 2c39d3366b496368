use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use logflow_core::config::DashboardConfig;
use logflow_core::models::{Metrics, StreamEvent};
use logflow_core::LogFlowResult;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, watch};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Pre-serialized updates buffered per client before a slow consumer starts
/// losing them.
const BROADCAST_CAPACITY: usize = 100;

#[derive(Clone)]
struct AppState {
    broadcast_tx: broadcast::Sender<String>,
    latest: Arc<RwLock<Option<Metrics>>>,
    clients: Arc<DashMap<Uuid, Instant>>,
}

/// HTTP/WebSocket dashboard server. Consumes the pipeline's event stream and
/// pushes each value, serialized once, to all connected clients.
pub struct DashboardServer {
    config: DashboardConfig,
}

impl DashboardServer {
    pub fn new(config: DashboardConfig) -> Self {
        Self { config }
    }

    /// Serve until shutdown. The ingress loop keeps consuming events even
    /// with zero clients connected so the pipeline never backs up on an idle
    /// dashboard.
    pub async fn run(
        self,
        shutdown: watch::Receiver<bool>,
        input: mpsc::Receiver<StreamEvent>,
    ) -> LogFlowResult<()> {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let state = AppState {
            broadcast_tx,
            latest: Arc::new(RwLock::new(None)),
            clients: Arc::new(DashMap::new()),
        };

        tokio::spawn(fan_out(state.clone(), shutdown.clone(), input));

        let app = Router::new()
            .route("/", get(index))
            .route("/ws", get(ws_upgrade))
            .route("/api/metrics", get(latest_metrics))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let addr = (self.config.host.as_str(), self.config.port);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(host = %self.config.host, port = self.config.port, "Dashboard server listening");

        let mut shutdown = shutdown;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await?;

        info!("Dashboard server stopped");
        Ok(())
    }
}

/// Consume pipeline events: remember the latest snapshot for `/api/metrics`
/// and push each value to every subscriber.
async fn fan_out(
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
    mut input: mpsc::Receiver<StreamEvent>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,

            event = input.recv() => match event {
                Some(event) => {
                    if let StreamEvent::Metrics(metrics) = &event {
                        *state.latest.write() = Some(metrics.clone());
                    }
                    match serde_json::to_string(&event) {
                        // Send only fails with zero subscribers, which is fine.
                        Ok(payload) => {
                            let _ = state.broadcast_tx.send(payload);
                        }
                        Err(e) => error!(error = %e, "Failed to serialize dashboard update"),
                    }
                }
                None => break,
            },
        }
    }

    debug!("Dashboard ingress stopped");
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn latest_metrics(State(state): State<AppState>) -> Json<Option<Metrics>> {
    Json(state.latest.read().clone())
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| client_loop(socket, state))
}

async fn client_loop(socket: WebSocket, state: AppState) {
    let id = Uuid::new_v4();
    state.clients.insert(id, Instant::now());
    info!(client = %id, clients = state.clients.len(), "Dashboard client connected");

    let (mut sink, mut source) = socket.split();
    let mut feed = state.broadcast_tx.subscribe();

    loop {
        tokio::select! {
            update = feed.recv() => match update {
                Ok(payload) => {
                    if sink.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(client = %id, skipped, "Dashboard client lagging, updates dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            incoming = source.next() => match incoming {
                // Clients only listen; anything they send is ignored.
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.clients.remove(&id);
    info!(client = %id, clients = state.clients.len(), "Dashboard client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn sample_metrics(requests_per_sec: f64) -> Metrics {
        Metrics {
            timestamp: Utc::now(),
            requests_per_sec,
            error_rate: 0.0,
            avg_response_time: 0.0,
            status_codes: HashMap::new(),
            top_paths: Vec::new(),
            top_ips: Vec::new(),
            top_user_agents: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_fan_out_broadcasts_and_tracks_latest() {
        let (broadcast_tx, mut feed) = broadcast::channel(8);
        let state = AppState {
            broadcast_tx,
            latest: Arc::new(RwLock::new(None)),
            clients: Arc::new(DashMap::new()),
        };

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (event_tx, event_rx) = mpsc::channel(8);
        tokio::spawn(fan_out(state.clone(), shutdown_rx, event_rx));

        event_tx
            .send(StreamEvent::Metrics(sample_metrics(42.0)))
            .await
            .unwrap();

        let payload = tokio::time::timeout(std::time::Duration::from_secs(1), feed.recv())
            .await
            .expect("update within 1s")
            .unwrap();
        assert!(payload.contains("\"requests_per_sec\":42.0"));

        // Latest snapshot is retained for /api/metrics.
        let latest = state.latest.read().clone().expect("latest set");
        assert_eq!(latest.requests_per_sec, 42.0);
    }

    #[tokio::test]
    async fn test_fan_out_stops_when_pipeline_closes() {
        let (broadcast_tx, _) = broadcast::channel(8);
        let state = AppState {
            broadcast_tx,
            latest: Arc::new(RwLock::new(None)),
            clients: Arc::new(DashMap::new()),
        };

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (event_tx, event_rx) = mpsc::channel(8);
        let handle = tokio::spawn(fan_out(state, shutdown_rx, event_rx));

        drop(event_tx);
        tokio::time::timeout(std::time::Duration::from_millis(500), handle)
            .await
            .expect("ingress exits when input closes")
            .unwrap();
    }
}
