//! WebSocket upgrade handler for the chat and notification namespaces.
//!
//! Handles the HTTP → WebSocket upgrade and manages the connection lifecycle:
//! 1. Resolve the upgrade credential (`?token=` or `Authorization: Bearer`)
//! 2. Upgrade to WebSocket and register the connection with the gateway
//! 3. Forward queued server events to the socket
//! 4. Dispatch inbound text frames until disconnect
//! 5. Tear down registry, room and presence state

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::adapters::http::middleware::bearer_token;
use crate::domain::foundation::{AuthError, UserId};
use crate::ports::SessionValidator;

use super::connection::{ConnectionId, Namespace};
use super::gateway::RealtimeGateway;
use super::messages::ServerEvent;

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    pub gateway: Arc<RealtimeGateway>,
    pub validator: Arc<dyn SessionValidator>,
    /// Reject upgrades that carry no credential.
    pub require_token: bool,
}

impl WebSocketState {
    pub fn new(
        gateway: Arc<RealtimeGateway>,
        validator: Arc<dyn SessionValidator>,
        require_token: bool,
    ) -> Self {
        Self {
            gateway,
            validator,
            require_token,
        }
    }

    /// Resolves the upgrade credential to a user.
    ///
    /// `Ok(None)` means an anonymous connection, allowed only when tokens
    /// are optional.
    async fn authenticate(&self, token: Option<&str>) -> Result<Option<UserId>, AuthError> {
        match token {
            Some(token) => Ok(Some(self.validator.validate(token).await?.id)),
            None if self.require_token => Err(AuthError::InvalidToken),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpgradeParams {
    #[serde(default)]
    pub token: Option<String>,
}

/// Route: `GET /ws/chat`
pub async fn chat_ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(params): Query<UpgradeParams>,
    State(state): State<WebSocketState>,
) -> Response {
    upgrade(ws, &headers, params, state, Namespace::Chat).await
}

/// Route: `GET /ws/notifications`
pub async fn notifications_ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(params): Query<UpgradeParams>,
    State(state): State<WebSocketState>,
) -> Response {
    upgrade(ws, &headers, params, state, Namespace::Notifications).await
}

async fn upgrade(
    ws: WebSocketUpgrade,
    headers: &HeaderMap,
    params: UpgradeParams,
    state: WebSocketState,
    namespace: Namespace,
) -> Response {
    let token = params.token.as_deref().or_else(|| bearer_token(headers));

    let authenticated = match state.authenticate(token).await {
        Ok(user) => user,
        Err(e) => {
            tracing::debug!(namespace = namespace.as_str(), error = %e, "Upgrade rejected");
            return upgrade_rejection(&e);
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state.gateway, namespace, authenticated))
}

fn upgrade_rejection(error: &AuthError) -> Response {
    let status = match error {
        AuthError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        AuthError::InvalidToken | AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
    };
    (
        status,
        Json(serde_json::json!({
            "error": error.to_string(),
            "code": "AUTH_ERROR"
        })),
    )
        .into_response()
}

/// Runs for the lifetime of one socket.
async fn handle_socket(
    socket: WebSocket,
    gateway: Arc<RealtimeGateway>,
    namespace: Namespace,
    authenticated: Option<UserId>,
) {
    let (sender, mut receiver) = socket.split();
    let (connection_id, outbound) = gateway.connect(namespace, authenticated).await;

    let mut send_task = tokio::spawn(forward_events(sender, outbound, connection_id));

    let recv_gateway = gateway.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    recv_gateway.dispatch_text(connection_id, &text).await;
                }
                Ok(Message::Binary(_)) => {
                    tracing::warn!(
                        connection_id = %connection_id,
                        "Received unsupported binary message"
                    );
                }
                // Protocol-level ping/pong is answered by axum.
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(Message::Close(_)) => {
                    tracing::debug!(connection_id = %connection_id, "Client sent close frame");
                    break;
                }
                Err(e) => {
                    tracing::debug!(connection_id = %connection_id, "Receive error: {}", e);
                    break;
                }
            }
        }
    });

    // Wait for the aborted task so no dispatch races the cleanup below.
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            let _ = recv_task.await;
        }
        _ = &mut recv_task => {
            send_task.abort();
            let _ = send_task.await;
        }
    }

    gateway.disconnect(connection_id).await;
}

/// Drains the connection's outbound queue into the socket.
async fn forward_events(
    mut sender: futures::stream::SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<ServerEvent>,
    connection_id: ConnectionId,
) {
    while let Some(event) = outbound.recv().await {
        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(
                    connection_id = %connection_id,
                    event = event.name(),
                    "Failed to serialize event: {}",
                    e
                );
                continue;
            }
        };
        if let Err(e) = sender.send(Message::Text(json)).await {
            tracing::debug!(
                connection_id = %connection_id,
                "Send error, closing connection: {}",
                e
            );
            break;
        }
    }
}

/// Router for both WebSocket namespaces.
///
/// ```ignore
/// let app = Router::new()
///     .merge(websocket_router().with_state(ws_state));
/// ```
pub fn websocket_router() -> axum::Router<WebSocketState> {
    use axum::routing::get;

    axum::Router::new()
        .route("/ws/chat", get(chat_ws_handler))
        .route("/ws/notifications", get(notifications_ws_handler))
}
