//! Channel Lifecycle Integration Tests
//!
//! Opening, closing and dropping channels against a shared bus.
//!
//! Run with: cargo test -p integration-tests --test lifecycle_tests

use integration_tests::*;
use presence_client::{PresenceClient, SendOutcome};
use presence_common::PresenceError;
use presence_transport::SharedTransport;
use std::sync::Arc;

#[tokio::test(start_paused = true)]
async fn test_no_callback_after_close() {
    let network = TestNetwork::new();
    let alice = network.join();
    let bob = network.join();

    let alice_channel = alice.open(CONVERSATION, ALICE, BOB).await.unwrap();
    let bob_channel = bob.open(CONVERSATION, BOB, ALICE).await.unwrap();
    let log = ChangeLog::attach(&alice_channel);

    bob_channel.report_typing(true).await;
    settle().await;
    assert_eq!(log.changes(), vec![true]);

    // The decay deadline is pending when the channel closes
    alice_channel.close().await;
    assert!(!alice_channel.is_peer_typing());

    advance(5000).await;
    bob_channel.stop_typing().await;
    settle().await;

    assert_eq!(log.changes(), vec![true]);
    assert_eq!(network.listeners(CONVERSATION), 1);
}

#[tokio::test(start_paused = true)]
async fn test_close_is_idempotent() {
    let network = TestNetwork::new();
    let alice = network.join();
    let channel = alice.open(CONVERSATION, ALICE, BOB).await.unwrap();

    channel.close().await;
    channel.close().await;

    assert!(channel.is_closed());
    assert_eq!(network.listeners(CONVERSATION), 0);
    assert!(alice.client.open_conversations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_closed_channel_refuses_work() {
    let network = TestNetwork::new();
    let alice = network.join();
    let channel = alice.open(CONVERSATION, ALICE, BOB).await.unwrap();
    channel.close().await;

    assert_eq!(channel.report_typing(true).await, SendOutcome::Closed);
    assert_eq!(channel.stop_typing().await, SendOutcome::Closed);
    assert!(matches!(
        channel.switch_peer(participant(CAROL)),
        Err(PresenceError::ChannelClosed)
    ));
    assert_eq!(alice.sent(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_close() {
    let network = TestNetwork::new();
    let alice = network.join();
    let channel = alice.open(CONVERSATION, ALICE, BOB).await.unwrap();

    tokio::join!(channel.close(), channel.close(), channel.close());

    assert!(channel.is_closed());
    assert_eq!(network.listeners(CONVERSATION), 0);
}

#[tokio::test(start_paused = true)]
async fn test_one_channel_per_conversation() {
    let network = TestNetwork::new();
    let alice = network.join();

    let first = alice.open(CONVERSATION, ALICE, BOB).await.unwrap();
    let err = alice.client.open(CONVERSATION, ALICE, CAROL).await.unwrap_err();
    assert!(matches!(err, PresenceError::ChannelAlreadyOpen(_)));
    assert_eq!(err.error_code(), "CHANNEL_ALREADY_OPEN");

    // Another client may open the same conversation
    let bob = network.join();
    let other = bob.open(CONVERSATION, BOB, ALICE).await.unwrap();

    first.close().await;
    let reopened = alice.open(CONVERSATION, ALICE, BOB).await.unwrap();

    reopened.close().await;
    other.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_conversations_are_independent() {
    let network = TestNetwork::new();
    let alice = network.join();
    let bob = network.join();
    let second = unique_conversation();

    let with_bob = alice.open(CONVERSATION, ALICE, BOB).await.unwrap();
    let with_bob_elsewhere = alice.open(&second, ALICE, BOB).await.unwrap();
    let bob_channel = bob.open(CONVERSATION, BOB, ALICE).await.unwrap();
    assert_eq!(alice.client.open_conversations().len(), 2);

    bob_channel.report_typing(true).await;
    settle().await;

    assert!(with_bob.is_peer_typing());
    assert!(!with_bob_elsewhere.is_peer_typing());

    with_bob_elsewhere.close().await;
    let open = alice.client.open_conversations();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].as_str(), CONVERSATION);
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_failure_is_recoverable() {
    let network = TestNetwork::new();
    let alice = network.join();

    alice.transport.set_fail_subscribe(true);
    let err = alice.open(CONVERSATION, ALICE, BOB).await.unwrap_err();
    let err = err.downcast::<PresenceError>().unwrap();
    assert!(err.is_recoverable());
    assert_eq!(network.listeners(CONVERSATION), 0);

    alice.transport.set_fail_subscribe(false);
    let channel = alice.open(CONVERSATION, ALICE, BOB).await.unwrap();
    assert_eq!(network.listeners(CONVERSATION), 1);
    channel.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_invalid_conversation_rejected() {
    let network = TestNetwork::new();
    let alice = network.join();

    for conversation in ["", "   "] {
        let err = alice.client.open(conversation, ALICE, BOB).await.unwrap_err();
        assert!(matches!(err, PresenceError::InvalidConversation(_)));
        assert!(!err.is_recoverable());
    }
    assert_eq!(network.bus.subscriber_count(&channel_for("")), 0);
}

#[tokio::test(start_paused = true)]
async fn test_drop_stops_listener() {
    let network = TestNetwork::new();
    let alice = network.join();
    let bob = network.join();

    let alice_channel = alice.open(CONVERSATION, ALICE, BOB).await.unwrap();
    let bob_channel = bob.open(CONVERSATION, BOB, ALICE).await.unwrap();
    let log = ChangeLog::attach(&alice_channel);

    drop(alice_channel);
    assert!(alice.client.open_conversations().is_empty());

    settle().await;
    assert_eq!(network.listeners(CONVERSATION), 1);

    bob_channel.report_typing(true).await;
    settle().await;
    assert!(log.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_clients_sharing_a_transport_are_independent() {
    let network = TestNetwork::new();
    let transport: SharedTransport = Arc::new(network.bus.connect());
    let first = PresenceClient::new(transport.clone());
    let second = PresenceClient::new(transport);
    let bob = network.join();

    let first_channel = first.open(CONVERSATION, ALICE, BOB).await.unwrap();
    let second_channel = second.open(CONVERSATION, ALICE, BOB).await.unwrap();
    let bob_channel = bob.open(CONVERSATION, BOB, ALICE).await.unwrap();
    let second_log = ChangeLog::attach(&second_channel);
    assert_eq!(network.listeners(CONVERSATION), 3);

    bob_channel.report_typing(true).await;
    settle().await;
    assert!(first_channel.is_peer_typing());
    assert!(second_channel.is_peer_typing());

    first_channel.close().await;
    assert_eq!(network.listeners(CONVERSATION), 2);

    bob_channel.stop_typing().await;
    settle().await;
    assert_eq!(second_log.changes(), vec![true, false]);

    second_channel.close().await;
    assert_eq!(network.listeners(CONVERSATION), 1);
}

#[tokio::test(start_paused = true)]
async fn test_close_waits_for_in_flight_send() {
    let network = TestNetwork::new();
    let held = Arc::new(HeldTransport::connect(&network));
    let alice = PresenceClient::new(held.clone());
    let bob = network.join();

    let alice_channel = Arc::new(alice.open(CONVERSATION, ALICE, BOB).await.unwrap());
    let bob_channel = bob.open(CONVERSATION, BOB, ALICE).await.unwrap();
    let log = ChangeLog::attach(&bob_channel);

    let sender = tokio::spawn({
        let channel = alice_channel.clone();
        async move { channel.report_typing(true).await }
    });
    held.send_started().await;

    let closer = tokio::spawn({
        let channel = alice_channel.clone();
        async move { channel.close().await }
    });
    settle().await;
    assert!(alice_channel.is_closed());
    assert!(!closer.is_finished());

    held.release_send();
    assert_eq!(sender.await.unwrap(), SendOutcome::Sent);
    closer.await.unwrap();

    // Nothing may reach the wire once close has returned
    assert_eq!(alice_channel.report_typing(true).await, SendOutcome::Closed);
    settle().await;
    assert_eq!(log.changes(), vec![true]);
    assert_eq!(network.listeners(CONVERSATION), 1);
}
