
use cluster_bridge::broker::InMemoryBroker;
use cluster_bridge::control::{CoordinatorState, ServerControlSignal, SignalOutcome};
use cluster_bridge::protocol::channels::{CHAT_CROSS_SERVER, PLAYER_SWITCH};
use cluster_bridge::protocol::{ControlAction, Envelope};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use test_helpers::{build_node, start_node, wait_for_receivers, wait_until, RecordingHost};
use tokio::time::{Duration, Instant};
use uuid::Uuid;

#[tokio::test(start_paused = true)]
async fn test_unreachable_broker_leaves_node_degraded() {
    let broker = InMemoryBroker::new();
    broker.set_available(false);
    let survival = build_node(&broker, "survival", RecordingHost::new());

    assert!(!survival.node.start().await);
    assert!(!survival.node.is_connected());
    assert!(survival.node.client().is_none());
    assert!(!survival.node.subscriber().is_running());

    let snapshot = survival.node.metrics().snapshot();
    assert_eq!(snapshot.connection.connect_failures, 1);
    assert_eq!(snapshot.connection.connect_attempts, 3);
}

/// Every broker-backed operation returns promptly and does nothing.
#[tokio::test]
async fn test_operations_are_prompt_no_ops_when_degraded() {
    let broker = InMemoryBroker::new();
    broker.set_available(false);
    let survival = build_node(&broker, "survival", RecordingHost::new());
    tokio::time::pause();
    assert!(!survival.node.start().await);
    tokio::time::resume();

    let started = Instant::now();
    let publisher = survival.node.publisher();
    publisher
        .publish(CHAT_CROSS_SERVER, &Envelope::new("chat").with_field("message", "hi"))
        .await;
    publisher.publish_async(CHAT_CROSS_SERVER, Envelope::new("chat"));

    let player = Uuid::new_v4();
    let notifications = survival.node.notifications();
    notifications.enqueue(player, "lost");
    assert!(!notifications.append(player, "lost").await);
    assert!(notifications.drain_all(&player).await.is_empty());
    assert!(started.elapsed() < Duration::from_millis(100));

    let snapshot = survival.node.metrics().snapshot();
    assert_eq!(snapshot.publish.messages_published, 0);
    assert_eq!(snapshot.publish.publish_skipped_disconnected, 2);
    assert_eq!(snapshot.notifications.enqueued, 0);
}

/// Control signals applied locally still run without a broker.
#[tokio::test(start_paused = true)]
async fn test_local_control_still_works_when_degraded() {
    let broker = InMemoryBroker::new();
    broker.set_available(false);
    let survival = build_node(&broker, "survival", RecordingHost::new());
    assert!(!survival.node.start().await);

    let outcome = survival
        .node
        .coordinator()
        .handle_signal(ServerControlSignal::new(ControlAction::Shutdown, "survival", 2));
    assert_eq!(outcome, SignalOutcome::Started { checkpoints: 1 });
    assert_eq!(survival.node.coordinator().state(), CoordinatorState::Countdown);

    assert!(survival.node.coordinator().cancel());
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(
        survival.host.broadcasts(),
        vec![
            "Server shutting down in 2 seconds".to_string(),
            "Scheduled server shutdown has been cancelled.".to_string(),
        ]
    );
}

/// An outage after startup ends the subscription; the loop resubscribes
/// once the broker is back.
#[tokio::test(start_paused = true)]
async fn test_subscription_recovers_after_outage() {
    let broker = InMemoryBroker::new();
    let survival = build_node(&broker, "survival", RecordingHost::new());
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    survival
        .node
        .router()
        .register(CHAT_CROSS_SERVER, None, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    assert!(survival.node.start().await);
    let lobby = start_node(&broker, "lobby").await;
    wait_for_receivers(&broker, CHAT_CROSS_SERVER, 1).await;

    broker.set_available(false);
    assert!(
        wait_until(Duration::from_secs(1), || broker.receiver_count(PLAYER_SWITCH) == 0).await,
        "subscriptions should end during the outage"
    );

    lobby
        .node
        .publisher()
        .publish(CHAT_CROSS_SERVER, &Envelope::new("chat"))
        .await;
    assert_eq!(lobby.node.metrics().snapshot().publish.publish_failures, 1);

    broker.set_available(true);
    wait_for_receivers(&broker, CHAT_CROSS_SERVER, 1).await;
    lobby
        .node
        .publisher()
        .publish(CHAT_CROSS_SERVER, &Envelope::new("chat"))
        .await;

    assert!(wait_until(Duration::from_secs(1), || hits.load(Ordering::SeqCst) == 1).await);
    assert!(survival.node.metrics().snapshot().subscribe.subscriber_reconnects >= 1);
    assert!(survival.node.subscriber().is_running());
}

#[tokio::test]
async fn test_stop_releases_subscriptions() {
    let broker = InMemoryBroker::new();
    let survival = start_node(&broker, "survival").await;
    wait_for_receivers(&broker, PLAYER_SWITCH, 1).await;

    survival.node.stop().await;
    assert!(survival.node.client().is_none());
    assert!(
        wait_until(Duration::from_secs(1), || broker.receiver_count(PLAYER_SWITCH) == 0).await
    );
}
