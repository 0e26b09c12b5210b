//! Conversation identity, message assembly, and the live-update state
//! machine with its polling fallback.

mod common;

use std::time::Duration;

use serde_json::json;

use caresync::context::{RequestContext, Role};
use caresync::fetch::{LiveState, LiveUpdate};
use caresync::store::tables;
use caresync::Client;

use common::MockStore;

fn ctx_for(actor: &str) -> RequestContext {
    RequestContext::new(actor, "org-1", Role::TeamMember)
}

fn seed_profiles(store: &MockStore) {
    store.seed(
        tables::PROFILES,
        vec![
            json!({"id": "user-a", "display_name": "Aya", "avatar_url": "https://cdn.example/a.png"}),
            json!({"id": "user-b", "display_name": "Bilal"}),
        ],
    );
}

#[tokio::test]
async fn find_or_create_is_order_insensitive() {
    let store = MockStore::new();
    let client = Client::new(store.clone());

    let first = client
        .conversations()
        .find_or_create(&ctx_for("user-b"), "user-a")
        .await
        .unwrap();
    let second = client
        .conversations()
        .find_or_create(&ctx_for("user-a"), "user-b")
        .await
        .unwrap();

    assert_eq!(first.external_id, second.external_id);
    assert_eq!(store.rows(tables::CONVERSATIONS).len(), 1);

    // The pair is stored in normalized order
    assert_eq!(first.participant_one, "user-a");
    assert_eq!(first.participant_two, "user-b");
}

#[tokio::test]
async fn conversation_list_is_scoped_to_the_actor() {
    let store = MockStore::new();
    store.seed(
        tables::CONVERSATIONS,
        vec![
            json!({"id": "c1", "participant_one": "user-a", "participant_two": "user-b", "created_at": "2024-01-01T00:00:00Z"}),
            json!({"id": "c2", "participant_one": "user-a", "participant_two": "user-c", "created_at": "2024-01-02T00:00:00Z"}),
            json!({"id": "c3", "participant_one": "user-b", "participant_two": "user-c", "created_at": "2024-01-03T00:00:00Z"}),
        ],
    );
    let client = Client::new(store.clone());

    let conversations = client.conversations().list(&ctx_for("user-a"), true).await.unwrap();
    let mut ids: Vec<&str> = conversations.iter().map(|c| c.external_id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["c1", "c2"]);
    assert_eq!(conversations[0].counterpart("user-a"), "user-c");
}

#[tokio::test]
async fn message_list_attaches_profiles_from_one_batched_lookup() {
    let store = MockStore::new();
    seed_profiles(&store);
    store.seed(
        tables::MESSAGES,
        vec![
            json!({"id": "m1", "conversation_id": "c1", "sender_id": "user-a", "content": "salaam", "created_at": "2024-01-01T10:00:00Z"}),
            json!({"id": "m2", "conversation_id": "c1", "sender_id": "user-b", "content": "wa alaikum", "created_at": "2024-01-01T10:01:00Z"}),
            json!({"id": "m3", "conversation_id": "c1", "sender_id": "user-a", "content": "how are you?", "created_at": "2024-01-01T10:02:00Z"}),
            json!({"id": "zz", "conversation_id": "c2", "sender_id": "user-a", "content": "other thread", "created_at": "2024-01-01T09:00:00Z"}),
        ],
    );
    let client = Client::new(store.clone());

    let messages = client.messages().list(&ctx_for("user-a"), "c1", true).await.unwrap();
    assert_eq!(messages.len(), 3);
    // Arrival order preserved
    assert_eq!(messages[0].external_id, "m1");
    assert_eq!(messages[2].external_id, "m3");
    assert_eq!(messages[0].sender_name.as_deref(), Some("Aya"));
    assert_eq!(messages[1].sender_name.as_deref(), Some("Bilal"));

    // Two distinct senders, one profile query
    assert_eq!(store.selects_for(tables::PROFILES), 1);
}

#[tokio::test]
async fn live_insert_is_appended_and_marked_read() {
    let store = MockStore::new();
    seed_profiles(&store);
    let client = Client::new(store.clone());
    let ctx = ctx_for("user-a");

    let mut watch = client.messages().watch(&ctx, "c1");
    assert!(matches!(watch.next().await, Some(LiveUpdate::State(LiveState::Subscribing))));
    assert!(matches!(watch.next().await, Some(LiveUpdate::State(LiveState::Live))));

    // The counterpart sends a message; the mock notifies the subscription
    client
        .mutator()
        .send_message(&ctx_for("user-b"), "c1", "are you there?")
        .await
        .unwrap();

    match watch.next().await {
        Some(LiveUpdate::Appended(message)) => {
            assert_eq!(message.content, "are you there?");
            assert_eq!(message.sender_id, "user-b");
            assert_eq!(message.sender_name.as_deref(), Some("Bilal"));
        }
        other => panic!("expected appended message, got {:?}", other),
    }

    // Receiving a counterpart message triggers mark-as-read
    let mut marked = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let rows = store.rows(tables::MESSAGES);
        if rows.iter().any(|r| {
            r.get("sender_id").and_then(|v| v.as_str()) == Some("user-b")
                && r.get("read_at").map(|v| !v.is_null()).unwrap_or(false)
        }) {
            marked = true;
            break;
        }
    }
    assert!(marked, "live insert from counterpart was never marked read");
}

#[tokio::test]
async fn live_update_patches_read_markers() {
    let store = MockStore::new();
    let client = Client::new(store.clone());
    store.seed(
        tables::MESSAGES,
        vec![
            json!({"id": "m1", "conversation_id": "c1", "sender_id": "user-a", "content": "hi", "created_at": "2024-01-01T10:00:00Z", "read_at": null}),
        ],
    );

    let mut watch = client.messages().watch(&ctx_for("user-a"), "c1");
    assert!(matches!(watch.next().await, Some(LiveUpdate::State(LiveState::Subscribing))));
    assert!(matches!(watch.next().await, Some(LiveUpdate::State(LiveState::Live))));

    // Counterpart reads the conversation; the read receipt propagates
    client
        .mutator()
        .mark_conversation_read(&ctx_for("user-b"), "c1")
        .await
        .unwrap();

    match watch.next().await {
        Some(LiveUpdate::ReadMarker(message)) => {
            assert_eq!(message.external_id, "m1");
            assert!(message.is_read());
        }
        other => panic!("expected read-marker update, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn subscription_failure_falls_back_to_polling() {
    common::init_tracing();
    let store = MockStore::new();
    store.set_fail_subscribe(true);
    store.seed(
        tables::MESSAGES,
        vec![
            json!({"id": "m1", "conversation_id": "c1", "sender_id": "user-b", "content": "first", "created_at": "2024-01-01T10:00:00Z"}),
        ],
    );
    let client = Client::new(store.clone());

    let mut watch = client.messages().watch(&ctx_for("user-a"), "c1");
    assert!(matches!(watch.next().await, Some(LiveUpdate::State(LiveState::Subscribing))));
    assert!(matches!(watch.next().await, Some(LiveUpdate::State(LiveState::Polling))));

    // First poll happens immediately
    match watch.next().await {
        Some(LiveUpdate::Replaced(messages)) => assert_eq!(messages.len(), 1),
        other => panic!("expected replaced list, got {:?}", other),
    }

    // A message arrives while polling; it shows up within one interval
    store.seed(
        tables::MESSAGES,
        vec![json!({"id": "m2", "conversation_id": "c1", "sender_id": "user-b", "content": "second", "created_at": "2024-01-01T10:05:00Z"})],
    );

    match watch.next().await {
        Some(LiveUpdate::Replaced(messages)) => {
            assert_eq!(messages.len(), 2);
            assert_eq!(messages[1].content, "second");
        }
        other => panic!("expected replaced list, got {:?}", other),
    }
}

#[tokio::test]
async fn dead_subscription_transitions_to_polling() {
    let store = MockStore::new();
    let client = Client::new(store.clone());

    let mut watch = client.messages().watch(&ctx_for("user-a"), "c1");
    assert!(matches!(watch.next().await, Some(LiveUpdate::State(LiveState::Subscribing))));
    assert!(matches!(watch.next().await, Some(LiveUpdate::State(LiveState::Live))));

    store.close_subscriptions();

    assert!(matches!(watch.next().await, Some(LiveUpdate::State(LiveState::Polling))));
}

#[tokio::test]
async fn dropping_the_watch_tears_down_the_subscription() {
    let store = MockStore::new();
    let client = Client::new(store.clone());

    let mut watch = client.messages().watch(&ctx_for("user-a"), "c1");
    assert!(matches!(watch.next().await, Some(LiveUpdate::State(LiveState::Subscribing))));
    assert!(matches!(watch.next().await, Some(LiveUpdate::State(LiveState::Live))));

    drop(watch);
    // Let the aborted driver task unwind
    tokio::time::sleep(Duration::from_millis(20)).await;

    let row = json!({"id": "m9", "conversation_id": "c1", "sender_id": "user-b", "content": "anyone?"});
    let delivered = store
        .push_event(
            tables::MESSAGES,
            caresync::store::RowEvent::Inserted(row.as_object().cloned().unwrap()),
        )
        .await;
    assert_eq!(delivered, 0, "subscription should be gone after drop");
}
