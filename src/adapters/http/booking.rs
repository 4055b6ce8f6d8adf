//! Internal ingress for booking status transitions.
//!
//! The booking workflow runs in another service. After a transition it posts
//! the event here with the shared `X-Internal-Token`; the record is persisted
//! and pushed to every live connection of the recipient.

use std::sync::Arc;

use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::adapters::http::error::ApiError;
use crate::application::BookingNotifier;
use crate::domain::foundation::{BookingId, DomainError, ErrorCode, NotificationId, UserId};
use crate::domain::notification::{BookingEventKind, BookingNotification, ListingRef};

pub const INTERNAL_TOKEN_HEADER: &str = "x-internal-token";

#[derive(Clone)]
pub struct BookingIngressState {
    pub notifier: Arc<BookingNotifier>,
    pub token: Arc<SecretString>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingEventRequest {
    pub recipient_id: UserId,
    pub kind: BookingEventKind,
    pub booking_id: BookingId,
    pub listing: ListingRef,
    pub message: String,
}

impl From<BookingEventRequest> for BookingNotification {
    fn from(request: BookingEventRequest) -> Self {
        BookingNotification {
            recipient: request.recipient_id,
            kind: request.kind,
            booking_id: request.booking_id,
            listing: request.listing,
            message: request.message,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingEventResponse {
    pub notification_id: NotificationId,
    pub delivered: usize,
}

fn token_matches(presented: &str, expected: &SecretString) -> bool {
    let expected = expected.expose_secret().as_bytes();
    let presented = presented.as_bytes();
    if presented.len() != expected.len() {
        return false;
    }
    presented.ct_eq(expected).into()
}

/// Route: `POST /internal/booking-events`
pub async fn post_booking_event(
    State(state): State<BookingIngressState>,
    headers: HeaderMap,
    Json(request): Json<BookingEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let presented = headers
        .get(INTERNAL_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !token_matches(presented, &state.token) {
        return Err(DomainError::new(ErrorCode::Unauthorized, "Invalid internal token").into());
    }

    let result = state.notifier.notify(request.into()).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(BookingEventResponse {
            notification_id: result.record.id,
            delivered: result.delivered,
        }),
    ))
}

pub fn booking_ingress_router(state: BookingIngressState) -> Router {
    Router::new()
        .route("/internal/booking-events", post(post_booking_event))
        .with_state(state)
}
