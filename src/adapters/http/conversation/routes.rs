//! Axum routes for conversation endpoints.

use axum::routing::get;
use axum::Router;

use super::handlers::{
    create_conversation, get_messages, list_conversations, list_notifications,
    ConversationAppState,
};

/// Creates routes for conversation endpoints.
///
/// - GET  /conversations - inbox
/// - POST /conversations - find or create with another user
/// - GET  /conversations/:conversation_id/messages - paginated history
/// - GET  /notifications - persisted booking notifications
pub fn conversation_routes() -> Router<ConversationAppState> {
    Router::new()
        .route(
            "/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route("/conversations/:conversation_id/messages", get(get_messages))
        .route("/notifications", get(list_notifications))
}

/// Combined router with all conversation routes under /api.
pub fn conversation_router() -> Router<ConversationAppState> {
    Router::new().nest("/api", conversation_routes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::middleware;
    use tower::ServiceExt;

    use crate::adapters::auth::MockSessionValidator;
    use crate::adapters::http::middleware::{auth_middleware, AuthState};
    use crate::adapters::memory::{InMemoryConversationRepository, InMemoryNotificationRepository};
    use crate::adapters::websocket::RealtimeGateway;
    use crate::application::{BookingNotifier, ConversationStore};
    use crate::domain::foundation::UserId;

    fn app() -> (Router, Arc<ConversationStore>) {
        let store = Arc::new(ConversationStore::new(Arc::new(
            InMemoryConversationRepository::new(),
        )));
        let gateway = Arc::new(RealtimeGateway::new(store.clone()));
        let notifier = Arc::new(BookingNotifier::new(
            Arc::new(InMemoryNotificationRepository::new()),
            gateway.clone(),
        ));
        let validator: AuthState = Arc::new(
            MockSessionValidator::new()
                .with_test_user("renter-token", "renter-1")
                .with_test_user("outsider-token", "outsider"),
        );

        let router = conversation_router()
            .with_state(ConversationAppState::new(store.clone(), notifier, gateway))
            .layer(middleware::from_fn_with_state(validator, auth_middleware));
        (router, store)
    }

    fn get(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("Authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[tokio::test]
    async fn inbox_requires_authentication() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::builder().uri("/api/conversations").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_conversation_is_idempotent() {
        let (app, store) = app();
        let body = r#"{"otherUserId":"landlord-1"}"#;
        let request = || {
            Request::builder()
                .method("POST")
                .uri("/api/conversations")
                .header("Authorization", "Bearer renter-token")
                .header("Content-Type", "application/json")
                .body(Body::from(body))
                .unwrap()
        };

        let first = app.clone().oneshot(request()).await.unwrap();
        let second = app.oneshot(request()).await.unwrap();

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(store.conversations_for(&user("renter-1")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn conversation_with_self_is_bad_request() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/conversations")
                    .header("Authorization", "Bearer renter-token")
                    .header("Content-Type", "application/json")
                    .body(Body::from(r#"{"otherUserId":"renter-1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn messages_for_outsider_are_forbidden() {
        let (app, store) = app();
        let conv = store
            .get_or_create(&user("renter-1"), &user("landlord-1"), None)
            .await
            .unwrap();

        let uri = format!("/api/conversations/{}/messages", conv.id());
        let ok = app.clone().oneshot(get(&uri, "renter-token")).await.unwrap();
        let forbidden = app.oneshot(get(&uri, "outsider-token")).await.unwrap();

        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_or_malformed_conversation_id() {
        let (app, _) = app();
        let missing = app
            .clone()
            .oneshot(get(
                "/api/conversations/00000000-0000-0000-0000-000000000000/messages",
                "renter-token",
            ))
            .await
            .unwrap();
        let malformed = app
            .oneshot(get("/api/conversations/not-a-uuid/messages", "renter-token"))
            .await
            .unwrap();

        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn notifications_list_is_empty_for_new_user() {
        let (app, _) = app();
        let response = app.oneshot(get("/api/notifications", "renter-token")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
