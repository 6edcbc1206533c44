//! HTTP front door: WebSocket upgrade and health probe.

use crate::config::ServerConfig;
use crate::coordinator::{Coordinator, Event, HealthStatus};
use crate::profile_service::{IdentityVerifier, ProfileService};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::scheduler::TokioScheduler;
use crate::session::{ConnectionId, Identity};
use axum::body::Body;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tower::ServiceBuilder;
use tracing::{debug, error, info, instrument, warn};

/// Shared handler state: the coordinator inbox and the token verifier.
#[derive(Clone)]
pub struct AppState {
    events: mpsc::UnboundedSender<Event>,
    verifier: Option<Arc<dyn IdentityVerifier>>,
    next_connection: Arc<AtomicU64>,
}

impl AppState {
    /// Creates handler state feeding `events`.
    pub fn new(
        events: mpsc::UnboundedSender<Event>,
        verifier: Option<Arc<dyn IdentityVerifier>>,
    ) -> Self {
        Self {
            events,
            verifier,
            next_connection: Arc::new(AtomicU64::new(0)),
        }
    }

    fn allocate_connection(&self) -> ConnectionId {
        ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[derive(Debug, Deserialize)]
struct ConnectParams {
    token: Option<String>,
}

/// Builds the router with request logging.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(ServiceBuilder::new().map_request(|req: Request<Body>| {
            info!(method = %req.method(), uri = %req.uri(), "Incoming HTTP request");
            req
        }))
        .with_state(state)
}

/// Opens the database, starts the coordinator, and serves until shutdown.
///
/// # Errors
///
/// Fails if the database cannot be opened or the address cannot be bound.
#[instrument(skip(config), fields(addr = %config.bind_addr()))]
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let profiles = match config.database_url() {
        Some(url) => Some(ProfileService::open(url)?),
        None => {
            warn!("No database configured; identities and outcomes disabled");
            None
        }
    };

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (timer_tx, timer_rx) = mpsc::unbounded_channel();
    let mut coordinator = Coordinator::new(config.clone(), TokioScheduler::new(timer_tx));
    if let Some(profiles) = &profiles {
        coordinator = coordinator.with_recorder(Box::new(profiles.clone()));
    }
    let coordinator_task = tokio::spawn(coordinator.run(event_rx, timer_rx));

    let verifier = profiles.map(|p| Arc::new(p) as Arc<dyn IdentityVerifier>);
    let app = router(AppState::new(event_tx, verifier));

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!(addr = %config.bind_addr(), "Server ready");
    axum::serve(listener, app).await?;

    coordinator_task.abort();
    Ok(())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> Response {
    let identity = resolve_identity(&state, params.token).await;
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

async fn resolve_identity(state: &AppState, token: Option<String>) -> Option<Identity> {
    let token = token?;
    let verifier = state.verifier.clone()?;
    match tokio::task::spawn_blocking(move || verifier.verify_identity(&token)).await {
        Ok(Ok(identity)) => identity,
        Ok(Err(e)) => {
            error!(error = %e, "Identity lookup failed");
            None
        }
        Err(e) => {
            error!(error = %e, "Identity lookup task failed");
            None
        }
    }
}

#[instrument(skip(socket, state, identity))]
async fn handle_socket(socket: WebSocket, state: AppState, identity: Option<Identity>) {
    let connection = state.allocate_connection();
    info!(%connection, verified = identity.is_some(), "WebSocket opened");

    let (mut sink, mut stream) = socket.split();
    let (outbound, mut outbox) = mpsc::unbounded_channel::<ServerMessage>();
    if state
        .events
        .send(Event::Connected {
            connection,
            identity,
            outbound,
        })
        .is_err()
    {
        warn!(%connection, "Coordinator stopped, closing connection");
        return;
    }

    let writer = tokio::spawn(async move {
        while let Some(message) = outbox.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    error!(error = %e, "Failed to encode message");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                debug!(%connection, error = %e, "Socket read failed");
                break;
            }
        };
        let event = match frame {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                Ok(message) => Event::Message {
                    connection,
                    message,
                },
                Err(e) => Event::Malformed {
                    connection,
                    reason: e.to_string(),
                },
            },
            Message::Close(_) => break,
            _ => continue,
        };
        if state.events.send(event).is_err() {
            break;
        }
    }

    if state
        .events
        .send(Event::Disconnected { connection })
        .is_err()
    {
        debug!(%connection, "Coordinator already stopped");
    }
    writer.abort();
    info!(%connection, "WebSocket closed");
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthStatus>, StatusCode> {
    let (reply, answer) = oneshot::channel();
    state
        .events
        .send(Event::Status { reply })
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    answer
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use axum::body::to_bytes;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_reports_counts() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let mut coordinator = Coordinator::new(ServerConfig::default(), ManualScheduler::new());
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                coordinator.handle(event);
            }
        });

        let app = router(AppState::new(event_tx, None));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let status: HealthStatus = serde_json::from_slice(&body).unwrap();
        assert_eq!(status.status, "ok");
        assert_eq!(status.active_connections, 0);
        assert_eq!(status.active_games, 0);
    }

    #[tokio::test]
    async fn test_health_unavailable_without_coordinator() {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        drop(event_rx);
        let app = router(AppState::new(event_tx, None));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
