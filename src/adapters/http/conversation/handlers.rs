//! HTTP handlers for conversation and notification endpoints.
//!
//! These handlers connect Axum routes to the application services. Anything
//! that touches live connections goes through the `RealtimeGateway`.

use std::sync::Arc;

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::adapters::http::error::ApiError;
use crate::adapters::http::middleware::RequireAuth;
use crate::adapters::websocket::RealtimeGateway;
use crate::application::{BookingNotifier, ConversationStore};
use crate::domain::foundation::{ConversationId, DomainError, ErrorCode};

use super::dto::{CreateConversationRequest, MessagePage, MessagePageParams, NotificationParams};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state for conversation handlers.
#[derive(Clone)]
pub struct ConversationAppState {
    pub store: Arc<ConversationStore>,
    pub notifier: Arc<BookingNotifier>,
    pub gateway: Arc<RealtimeGateway>,
}

impl ConversationAppState {
    pub fn new(
        store: Arc<ConversationStore>,
        notifier: Arc<BookingNotifier>,
        gateway: Arc<RealtimeGateway>,
    ) -> Self {
        Self {
            store,
            notifier,
            gateway,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// GET /api/conversations
// ════════════════════════════════════════════════════════════════════════════════

/// The caller's inbox, most recently active first.
pub async fn list_conversations(
    State(state): State<ConversationAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let summaries = state.store.conversations_for(&user.id).await?;
    Ok((StatusCode::OK, Json(summaries)))
}

// ════════════════════════════════════════════════════════════════════════════════
// POST /api/conversations
// ════════════════════════════════════════════════════════════════════════════════

/// Finds or creates the conversation between the caller and another user.
///
/// Live chat connections of both users are subscribed to the room so the
/// first message is routed without a reconnect.
///
/// # Errors
/// - 400 Bad Request: `otherUserId` is the caller
/// - 401 Unauthorized: No valid auth token
pub async fn create_conversation(
    State(state): State<ConversationAppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = state
        .store
        .get_or_create(&user.id, &request.other_user_id, request.listing_id)
        .await?;

    let attached = state.gateway.attach_participants(&conversation).await;
    tracing::debug!(
        conversation_id = %conversation.id(),
        attached,
        "Conversation opened over HTTP"
    );

    Ok((StatusCode::OK, Json(conversation)))
}

// ════════════════════════════════════════════════════════════════════════════════
// GET /api/conversations/:id/messages
// ════════════════════════════════════════════════════════════════════════════════

/// A page of history, oldest first.
///
/// # Query Parameters
/// - `limit`: page size (default 50, max 100)
/// - `before`: RFC 3339 cursor; only older messages are returned
///
/// # Errors
/// - 403 Forbidden: caller is not a participant
/// - 404 Not Found: conversation does not exist
pub async fn get_messages(
    State(state): State<ConversationAppState>,
    RequireAuth(user): RequireAuth,
    Path(conversation_id): Path<String>,
    Query(params): Query<MessagePageParams>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation_id: ConversationId = conversation_id.parse().map_err(|_| {
        DomainError::new(ErrorCode::InvalidFormat, "Invalid conversation ID format")
    })?;

    let messages = state
        .store
        .list_messages(conversation_id, &user.id, params.limit, params.before)
        .await?;

    Ok((StatusCode::OK, Json(MessagePage::new(messages))))
}

// ════════════════════════════════════════════════════════════════════════════════
// GET /api/notifications
// ════════════════════════════════════════════════════════════════════════════════

/// The caller's persisted notifications, newest first.
///
/// Covers events that were emitted while the user was offline.
pub async fn list_notifications(
    State(state): State<ConversationAppState>,
    RequireAuth(user): RequireAuth,
    Query(params): Query<NotificationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let notifications = state
        .notifier
        .recent_for(&user.id, params.effective_limit())
        .await?;
    Ok((StatusCode::OK, Json(notifications)))
}
