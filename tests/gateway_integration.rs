//! End-to-end tests for the realtime gateway.
//!
//! Drives the gateway with JSON text frames exactly as the socket handler
//! does, over in-memory repositories:
//! 1. Connections register and join their conversations
//! 2. Messages are persisted, then fanned out to every device in the room
//! 3. Typing and read receipts are broadcast as full state
//! 4. Booking notifications reach online users and persist for offline ones

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use rental_realtime::adapters::memory::{
    InMemoryConversationRepository, InMemoryNotificationRepository,
};
use rental_realtime::adapters::websocket::{
    ConnectionId, Namespace, RealtimeGateway, ServerEvent,
};
use rental_realtime::application::{BookingNotifier, ConversationStore};
use rental_realtime::domain::foundation::{BookingId, ConversationId, ListingId, UserId};
use rental_realtime::domain::notification::{BookingEventKind, BookingNotification, ListingRef};

// =============================================================================
// Test Infrastructure
// =============================================================================

struct Harness {
    gateway: Arc<RealtimeGateway>,
    store: Arc<ConversationStore>,
    repository: Arc<InMemoryConversationRepository>,
    notifications: Arc<InMemoryNotificationRepository>,
    notifier: BookingNotifier,
}

impl Harness {
    fn new() -> Self {
        let repository = Arc::new(InMemoryConversationRepository::new());
        let store = Arc::new(ConversationStore::new(repository.clone()));
        let gateway = Arc::new(RealtimeGateway::new(store.clone()));
        let notifications = Arc::new(InMemoryNotificationRepository::new());
        let notifier = BookingNotifier::new(notifications.clone(), gateway.clone());
        Self {
            gateway,
            store,
            repository,
            notifications,
            notifier,
        }
    }

    /// Opens a chat connection and registers it as `user`.
    async fn client(&self, user: &str) -> Client {
        self.client_on(Namespace::Chat, user).await
    }

    async fn client_on(&self, namespace: Namespace, user: &str) -> Client {
        let (id, rx) = self.gateway.connect(namespace, None).await;
        let mut client = Client::new(id, rx, self.gateway.clone());
        let ack = client
            .request("register", json!({ "userId": user }))
            .await;
        assert_eq!(ack["status"], "ok", "register failed: {}", ack);
        client.drain();
        client
    }

    async fn conversation(&self, a: &str, b: &str) -> ConversationId {
        self.store
            .get_or_create(&user(a), &user(b), None)
            .await
            .unwrap()
            .id()
    }
}

struct Client {
    id: ConnectionId,
    rx: mpsc::Receiver<ServerEvent>,
    gateway: Arc<RealtimeGateway>,
    /// Non-ack events received while waiting for an ack.
    pending: Vec<Value>,
}

impl Client {
    fn new(id: ConnectionId, rx: mpsc::Receiver<ServerEvent>, gateway: Arc<RealtimeGateway>) -> Self {
        Self {
            id,
            rx,
            gateway,
            pending: Vec::new(),
        }
    }

    /// Sends a frame with an ackId and returns the matching ack as JSON.
    ///
    /// Other events that arrive meanwhile stay queued for `drain`.
    async fn request(&mut self, event: &str, data: Value) -> Value {
        let frame = json!({ "event": event, "data": data, "ackId": "req" });
        self.gateway
            .dispatch_text(self.id, &frame.to_string())
            .await;

        let mut ack = None;
        while let Ok(event) = self.rx.try_recv() {
            let event = serde_json::to_value(&event).unwrap();
            if event["event"] == "ack" && ack.is_none() {
                ack = Some(event["data"].clone());
            } else {
                self.pending.push(event);
            }
        }
        ack.expect("no ack received")
    }

    /// All queued events, serialized as they would be on the wire.
    fn drain(&mut self) -> Vec<Value> {
        let mut events = std::mem::take(&mut self.pending);
        while let Ok(event) = self.rx.try_recv() {
            events.push(serde_json::to_value(&event).unwrap());
        }
        events
    }

    fn events_named(&mut self, name: &str) -> Vec<Value> {
        self.drain()
            .into_iter()
            .filter(|e| e["event"] == name)
            .collect()
    }
}

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn booking(recipient: &str, kind: BookingEventKind) -> BookingNotification {
    BookingNotification {
        recipient: user(recipient),
        kind,
        booking_id: BookingId::new(),
        listing: ListingRef {
            id: ListingId::new(),
            title: "Sunny two-bed near the park".into(),
        },
        message: "A renter requested your listing".into(),
    }
}

// =============================================================================
// Conversation lifecycle
// =============================================================================

#[tokio::test]
async fn concurrent_open_from_both_sides_yields_one_conversation() {
    let harness = Harness::new();
    let mut renter = harness.client("renter").await;
    let mut landlord = harness.client("landlord").await;

    let (a, b) = tokio::join!(
        renter.request("open_conversation", json!({ "otherUserId": "landlord" })),
        landlord.request("open_conversation", json!({ "otherUserId": "renter" })),
    );

    assert_eq!(a["status"], "ok");
    assert_eq!(b["status"], "ok");
    assert_eq!(a["data"]["id"], b["data"]["id"]);
    assert_eq!(harness.repository.conversation_count().await, 1);
}

#[tokio::test]
async fn opened_conversation_routes_to_already_registered_peer() {
    let harness = Harness::new();
    let mut renter = harness.client("renter").await;
    let mut landlord = harness.client("landlord").await;

    let opened = renter
        .request("open_conversation", json!({ "otherUserId": "landlord" }))
        .await;
    let conversation_id = opened["data"]["id"].clone();

    let sent = renter
        .request(
            "send_message",
            json!({ "conversationId": conversation_id, "content": "Is it still available?" }),
        )
        .await;
    assert_eq!(sent["status"], "ok");

    let received = landlord.events_named("new_message");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["data"]["content"], "Is it still available?");
    assert_eq!(received[0]["data"]["senderId"], "renter");
}

// =============================================================================
// Messaging
// =============================================================================

#[tokio::test]
async fn messages_reach_every_device_in_persistence_order() {
    let harness = Harness::new();
    let conversation_id = harness.conversation("renter", "landlord").await;
    let mut renter = harness.client("renter").await;
    let mut landlord_phone = harness.client("landlord").await;
    let mut landlord_laptop = harness.client("landlord").await;

    for i in 0..5 {
        let ack = renter
            .request(
                "send_message",
                json!({ "conversationId": conversation_id, "content": format!("m{}", i) }),
            )
            .await;
        assert_eq!(ack["status"], "ok");
    }

    let expected: Vec<Value> = (0..5).map(|i| json!(format!("m{}", i))).collect();
    for device in [&mut landlord_phone, &mut landlord_laptop] {
        let contents: Vec<Value> = device
            .events_named("new_message")
            .iter()
            .map(|e| e["data"]["content"].clone())
            .collect();
        assert_eq!(contents, expected);
    }

    let history = harness
        .store
        .list_messages(conversation_id, &user("landlord"), None, None)
        .await
        .unwrap();
    let stored: Vec<_> = history.iter().map(|m| m.content.clone().unwrap()).collect();
    assert_eq!(stored, vec!["m0", "m1", "m2", "m3", "m4"]);

    let conversation = harness
        .store
        .get_by_id(conversation_id, &user("renter"))
        .await
        .unwrap();
    assert_eq!(conversation.last_message_at(), Some(history[4].sent_at));
}

#[tokio::test]
async fn outsider_cannot_post_or_join() {
    let harness = Harness::new();
    let conversation_id = harness.conversation("renter", "landlord").await;
    let mut landlord = harness.client("landlord").await;
    let mut outsider = harness.client("outsider").await;

    let join = outsider
        .request("join_conversation", json!({ "conversationId": conversation_id }))
        .await;
    let send = outsider
        .request(
            "send_message",
            json!({ "conversationId": conversation_id, "content": "hi" }),
        )
        .await;

    assert_eq!(join["code"], "FORBIDDEN");
    assert_eq!(send["code"], "FORBIDDEN");
    assert!(landlord.events_named("new_message").is_empty());
    assert_eq!(harness.repository.message_count(conversation_id).await, 0);
}

#[tokio::test]
async fn empty_message_is_rejected_without_broadcast() {
    let harness = Harness::new();
    let conversation_id = harness.conversation("renter", "landlord").await;
    let mut renter = harness.client("renter").await;
    let mut landlord = harness.client("landlord").await;

    let ack = renter
        .request(
            "send_message",
            json!({ "conversationId": conversation_id, "content": "   " }),
        )
        .await;

    assert_eq!(ack["status"], "error");
    assert_eq!(ack["ackId"], "req");
    assert!(landlord.events_named("new_message").is_empty());
}

#[tokio::test]
async fn sending_clears_sender_typing_flag() {
    let harness = Harness::new();
    let conversation_id = harness.conversation("renter", "landlord").await;
    let mut renter = harness.client("renter").await;
    let mut landlord = harness.client("landlord").await;

    renter
        .request("typing_start", json!({ "conversationId": conversation_id }))
        .await;
    let started = landlord.events_named("typing_status");
    assert_eq!(started[0]["data"]["typingUsers"], json!(["renter"]));

    renter
        .request(
            "send_message",
            json!({ "conversationId": conversation_id, "content": "done typing" }),
        )
        .await;

    let events = landlord.drain();
    let names: Vec<_> = events.iter().map(|e| e["event"].clone()).collect();
    assert_eq!(names, vec![json!("new_message"), json!("typing_status")]);
    assert_eq!(events[1]["data"]["typingUsers"], json!([]));
}

// =============================================================================
// Typing and read state
// =============================================================================

#[tokio::test]
async fn typing_broadcasts_full_set_and_ignores_repeats() {
    let harness = Harness::new();
    let conversation_id = harness.conversation("renter", "landlord").await;
    let mut renter = harness.client("renter").await;
    let mut landlord = harness.client("landlord").await;

    renter
        .request("typing_start", json!({ "conversationId": conversation_id }))
        .await;
    landlord
        .request("typing_start", json!({ "conversationId": conversation_id }))
        .await;
    renter
        .request("typing_start", json!({ "conversationId": conversation_id }))
        .await;

    let seen = renter.events_named("typing_status");
    // Own start, then the landlord's; the repeat changed nothing.
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1]["data"]["typingUsers"], json!(["landlord", "renter"]));

    renter
        .request("typing_stop", json!({ "conversationId": conversation_id }))
        .await;
    let after_stop = landlord.events_named("typing_status");
    assert_eq!(
        after_stop.last().unwrap()["data"]["typingUsers"],
        json!(["landlord"])
    );
}

#[tokio::test]
async fn typing_requires_room_membership() {
    let harness = Harness::new();
    let conversation_id = harness.conversation("renter", "landlord").await;
    let mut renter = harness.client("renter").await;

    renter
        .request("leave_conversation", json!({ "conversationId": conversation_id }))
        .await;
    let ack = renter
        .request("typing_start", json!({ "conversationId": conversation_id }))
        .await;

    assert_eq!(ack["code"], "FORBIDDEN");
    assert!(harness
        .gateway
        .presence()
        .typing_users_in(conversation_id)
        .await
        .is_empty());
}

#[tokio::test]
async fn typing_stop_after_leaving_clears_the_flag() {
    let harness = Harness::new();
    let conversation_id = harness.conversation("renter", "landlord").await;
    let mut renter = harness.client("renter").await;
    let mut landlord = harness.client("landlord").await;

    renter
        .request("typing_start", json!({ "conversationId": conversation_id }))
        .await;
    renter
        .request("leave_conversation", json!({ "conversationId": conversation_id }))
        .await;
    landlord.drain();

    let ack = renter
        .request("typing_stop", json!({ "conversationId": conversation_id }))
        .await;

    assert_eq!(ack["status"], "ok");
    assert!(harness
        .gateway
        .presence()
        .typing_users_in(conversation_id)
        .await
        .is_empty());
    let seen = landlord.events_named("typing_status");
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0]["data"]["typingUsers"], json!([]));
}

#[tokio::test]
async fn mark_read_broadcasts_receipt_and_resets_unread() {
    let harness = Harness::new();
    let conversation_id = harness.conversation("renter", "landlord").await;
    let mut renter = harness.client("renter").await;
    let mut landlord = harness.client("landlord").await;

    renter
        .request(
            "send_message",
            json!({ "conversationId": conversation_id, "content": "hello" }),
        )
        .await;
    let inbox = harness.store.conversations_for(&user("landlord")).await.unwrap();
    assert_eq!(inbox[0].unread_count, 1);

    let ack = landlord
        .request("mark_read", json!({ "conversationId": conversation_id }))
        .await;
    assert_eq!(ack["status"], "ok");

    let receipts = renter.events_named("message_read");
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0]["data"]["userId"], "landlord");

    let inbox = harness.store.conversations_for(&user("landlord")).await.unwrap();
    assert_eq!(inbox[0].unread_count, 0);
}

// =============================================================================
// Connection bookkeeping
// =============================================================================

#[tokio::test]
async fn user_goes_offline_only_after_last_connection() {
    let harness = Harness::new();
    let phone = harness.client("renter").await;
    let laptop = harness.client("renter").await;

    harness.gateway.disconnect(phone.id).await;
    assert!(harness.gateway.registry().is_online(&user("renter")).await);

    harness.gateway.disconnect(laptop.id).await;
    assert!(!harness.gateway.registry().is_online(&user("renter")).await);
    assert_eq!(harness.gateway.registry().connection_count().await, 0);
    assert!(harness.gateway.rooms().active_rooms().await.is_empty());
}

#[tokio::test]
async fn events_require_registration_and_matching_identity() {
    let harness = Harness::new();
    let conversation_id = harness.conversation("renter", "landlord").await;
    let (id, rx) = harness.gateway.connect(Namespace::Chat, None).await;
    let mut anonymous = Client::new(id, rx, harness.gateway.clone());

    let early = anonymous
        .request("mark_read", json!({ "conversationId": conversation_id }))
        .await;
    assert_eq!(early["code"], "NOT_REGISTERED");

    anonymous
        .request("register", json!({ "userId": "renter" }))
        .await;
    let spoofed = anonymous
        .request(
            "mark_read",
            json!({ "conversationId": conversation_id, "userId": "landlord" }),
        )
        .await;
    assert_eq!(spoofed["code"], "FORBIDDEN");

    let switched = anonymous
        .request("register", json!({ "userId": "landlord" }))
        .await;
    assert_eq!(switched["code"], "FORBIDDEN");
}

// =============================================================================
// Booking notifications
// =============================================================================

#[tokio::test]
async fn booking_notification_reaches_all_devices_and_persists() {
    let harness = Harness::new();
    let mut chat = harness.client("landlord").await;
    let mut notifications = harness
        .client_on(Namespace::Notifications, "landlord")
        .await;

    let result = harness
        .notifier
        .notify(booking("landlord", BookingEventKind::Created))
        .await
        .unwrap();

    assert_eq!(result.delivered, 2);
    for device in [&mut chat, &mut notifications] {
        let events = device.events_named("booking_created");
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0]["data"]["listing"]["title"],
            "Sunny two-bed near the park"
        );
    }
    assert_eq!(harness.notifications.all().await.len(), 1);
}

#[tokio::test]
async fn offline_recipient_still_gets_a_record() {
    let harness = Harness::new();

    let result = harness
        .notifier
        .notify(booking("renter", BookingEventKind::Rejected))
        .await
        .unwrap();

    assert_eq!(result.delivered, 0);
    let stored = harness
        .notifier
        .recent_for(&user("renter"), 10)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "Booking declined");
}
