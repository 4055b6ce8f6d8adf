//! Assembly of the full HTTP surface: REST, WebSocket upgrades and health.

use std::sync::Arc;

use axum::extract::State;
use axum::middleware;
use axum::routing::get;
use axum::{Json, Router};
use secrecy::SecretString;
use serde::Serialize;

use crate::adapters::websocket::{websocket_router, RealtimeGateway, WebSocketState};
use crate::application::{BookingNotifier, ConversationStore};
use crate::ports::SessionValidator;

use super::booking::{booking_ingress_router, BookingIngressState};
use super::conversation::{conversation_router, ConversationAppState};
use super::middleware::auth_middleware;

/// Everything the HTTP surface needs, wired once at startup.
#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<ConversationStore>,
    pub notifier: Arc<BookingNotifier>,
    pub gateway: Arc<RealtimeGateway>,
    pub validator: Arc<dyn SessionValidator>,
    pub require_token: bool,
    /// Enables `POST /internal/booking-events` when set.
    pub internal_token: Option<Arc<SecretString>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub connections: usize,
    pub online_users: usize,
}

async fn health(State(gateway): State<Arc<RealtimeGateway>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        connections: gateway.registry().connection_count().await,
        online_users: gateway.registry().online_user_count().await,
    })
}

/// Builds the application router without transport layers.
///
/// - `/api/...` - REST, Bearer auth
/// - `/ws/chat`, `/ws/notifications` - WebSocket upgrades
/// - `/internal/booking-events` - booking workflow ingress, if a token is set
/// - `/health`
pub fn app_router(services: AppServices) -> Router {
    let api = conversation_router()
        .with_state(ConversationAppState::new(
            services.store.clone(),
            services.notifier.clone(),
            services.gateway.clone(),
        ))
        .layer(middleware::from_fn_with_state(
            services.validator.clone(),
            auth_middleware,
        ));

    let ws = websocket_router().with_state(WebSocketState::new(
        services.gateway.clone(),
        services.validator.clone(),
        services.require_token,
    ));

    let health = Router::new()
        .route("/health", get(health))
        .with_state(services.gateway);

    let mut router = Router::new().merge(api).merge(ws).merge(health);
    if let Some(token) = services.internal_token {
        router = router.merge(booking_ingress_router(BookingIngressState {
            notifier: services.notifier,
            token,
        }));
    }
    router
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::adapters::auth::MockSessionValidator;
    use crate::adapters::memory::{InMemoryConversationRepository, InMemoryNotificationRepository};

    fn services() -> AppServices {
        let store = Arc::new(ConversationStore::new(Arc::new(
            InMemoryConversationRepository::new(),
        )));
        let gateway = Arc::new(RealtimeGateway::new(store.clone()));
        AppServices {
            notifier: Arc::new(BookingNotifier::new(
                Arc::new(InMemoryNotificationRepository::new()),
                gateway.clone(),
            )),
            store,
            gateway,
            validator: Arc::new(MockSessionValidator::new()),
            require_token: true,
            internal_token: None,
        }
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = app_router(services())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn api_is_mounted_behind_auth() {
        let response = app_router(services())
            .oneshot(
                Request::builder()
                    .uri("/api/conversations")
                    .header("Authorization", "Bearer unknown")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn booking_ingress_is_mounted_only_with_a_token() {
        let post = || {
            Request::builder()
                .method("POST")
                .uri("/internal/booking-events")
                .header("Content-Type", "application/json")
                .body(Body::from("{}"))
                .unwrap()
        };

        let response = app_router(services()).oneshot(post()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let mut with_token = services();
        with_token.internal_token = Some(Arc::new(SecretString::new("t".repeat(32))));
        let response = app_router(with_token).oneshot(post()).await.unwrap();
        assert_ne!(response.status(), StatusCode::NOT_FOUND);
    }
}
