
use cluster_bridge::broker::InMemoryBroker;
use cluster_bridge::control::{CoordinatorState, HostStatus, ServerControlSignal};
use cluster_bridge::coordination::RequestError;
use cluster_bridge::protocol::channels::{
    CHAT_CROSS_SERVER, PLAYER_SWITCH, SERVER_CONTROL, STATUS_REQUEST,
};
use cluster_bridge::protocol::{ControlAction, CrossServerChat, Envelope, PlayerSwitch};
use std::sync::{Arc, Mutex};
use test_helpers::{
    build_node, start_node, wait_for_receivers, wait_until, HostEvent, RecordingHost,
};
use tokio::time::{Duration, Instant};
use uuid::Uuid;

const RESTART_KICK: &str = "Server is restarting. Please reconnect in a moment.";
const SHUTDOWN_KICK: &str = "Server is shutting down.";

fn chat(origin: &str, message: &str) -> CrossServerChat {
    CrossServerChat {
        origin_server: origin.to_string(),
        player: "Steve".to_string(),
        uuid: Uuid::new_v4(),
        prefix: "[VIP] ".to_string(),
        suffix: String::new(),
        message: message.to_string(),
        message_id: Uuid::new_v4().to_string(),
        timestamp: chrono::Utc::now().timestamp_millis(),
    }
}

/// Chat published on one process reaches handlers on every other process.
#[tokio::test]
async fn test_cross_server_chat_relay() {
    let broker = InMemoryBroker::new();
    let lobby = start_node(&broker, "lobby").await;

    let survival = build_node(&broker, "survival", RecordingHost::new());
    let received = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&received);
    survival
        .node
        .router()
        .register(CHAT_CROSS_SERVER, Some("chat"), move |envelope| {
            let message: CrossServerChat = envelope.payload().unwrap();
            log.lock().unwrap().push((message.origin_server, message.message));
        });
    assert!(survival.node.start().await);
    wait_for_receivers(&broker, CHAT_CROSS_SERVER, 1).await;

    let client = lobby.node.client().expect("lobby connected");
    client.publish(&chat("lobby", "hello from the lobby")).await;

    assert!(
        wait_until(Duration::from_secs(2), || !received.lock().unwrap().is_empty()).await,
        "chat never arrived"
    );
    assert_eq!(
        *received.lock().unwrap(),
        vec![("lobby".to_string(), "hello from the lobby".to_string())]
    );
    assert_eq!(survival.node.metrics().snapshot().subscribe.decode_failures, 0);
}

/// Only the destination of a switch records a transfer context.
#[tokio::test]
async fn test_player_switch_recorded_only_by_destination() {
    let broker = InMemoryBroker::new();
    let lobby = start_node(&broker, "lobby").await;
    let survival = start_node(&broker, "survival").await;
    let creative = start_node(&broker, "creative").await;
    wait_for_receivers(&broker, PLAYER_SWITCH, 3).await;

    let player = Uuid::new_v4();
    lobby
        .node
        .client()
        .unwrap()
        .publish(&PlayerSwitch {
            from: "lobby".to_string(),
            to: "survival".to_string(),
            player: "Alex".to_string(),
            uuid: player,
            timestamp: chrono::Utc::now().timestamp_millis(),
        })
        .await;

    assert!(
        wait_until(Duration::from_secs(2), || !survival.node.transfers().is_empty()).await,
        "survival never recorded the switch"
    );
    assert!(creative.node.transfers().is_empty());
    assert!(lobby.node.transfers().is_empty());

    let client = survival.node.client().unwrap();
    let context = client.consume_transfer(&player).expect("transfer context");
    assert_eq!(context.from_server, "lobby");
    assert_eq!(context.player_name, "Alex");
    assert!(client.consume_transfer(&player).is_none());
}

#[tokio::test]
async fn test_status_request_answered_by_named_server() {
    let broker = InMemoryBroker::new();
    let lobby = start_node(&broker, "lobby").await;
    let survival = build_node(
        &broker,
        "survival",
        RecordingHost::with_status(HostStatus {
            online: true,
            player_count: 12,
            max_players: 50,
            tps: 19.5,
        }),
    );
    assert!(survival.node.start().await);
    wait_for_receivers(&broker, STATUS_REQUEST, 2).await;

    let status = lobby
        .node
        .client()
        .unwrap()
        .server_status("survival")
        .await
        .expect("status response");

    assert_eq!(status.server, "survival");
    assert_eq!(status.player_count, 12);
    assert_eq!(status.max_players, 50);
    assert!((status.tps - 19.5).abs() < f64::EPSILON);
    assert_eq!(lobby.node.metrics().snapshot().requests.resolved, 1);
}

#[tokio::test(start_paused = true)]
async fn test_status_request_for_unknown_server_times_out() {
    let broker = InMemoryBroker::new();
    let lobby = start_node(&broker, "lobby").await;
    let _survival = start_node(&broker, "survival").await;
    wait_for_receivers(&broker, STATUS_REQUEST, 2).await;

    let result = lobby.node.client().unwrap().server_status("skyblock").await;
    assert!(matches!(result, Err(RequestError::Timeout(_))));
    assert_eq!(lobby.node.metrics().snapshot().requests.timed_out, 1);
}

/// RESTART with a 10 second delay: warnings at 5..1 seconds remaining,
/// then the kick at t+10 and the restart after the grace period.
#[tokio::test(start_paused = true)]
async fn test_restart_countdown_timeline() {
    let broker = InMemoryBroker::new();
    let proxy = start_node(&broker, "proxy").await;
    let survival = start_node(&broker, "survival").await;
    wait_for_receivers(&broker, SERVER_CONTROL, 2).await;

    let origin = Instant::now();
    let signal = ServerControlSignal::new(ControlAction::Restart, "survival", 10)
        .with_reason("Weekly update")
        .issued_by("Admin");
    proxy.node.client().unwrap().issue_control(&signal).await;

    assert!(
        wait_until(Duration::from_millis(500), || {
            survival.node.coordinator().state() == CoordinatorState::Countdown
        })
        .await
    );
    let countdown = survival.node.coordinator().active_countdown().unwrap();
    assert!(countdown.is_restart);
    assert_eq!(countdown.issued_by, "Admin");

    tokio::time::sleep(Duration::from_secs(12)).await;

    let broadcast = |s: &str| HostEvent::Broadcast(s.to_string());
    assert_eq!(
        survival.host.timeline(origin),
        vec![
            (0, broadcast("Server restarting in 10 seconds: Weekly update")),
            (5, broadcast("Server restarting in 5 seconds")),
            (6, broadcast("Server restarting in 4 seconds")),
            (7, broadcast("Server restarting in 3 seconds")),
            (8, broadcast("Server restarting in 2 seconds")),
            (9, broadcast("Server restarting in 1 second")),
            (10, broadcast("Server restarting now.")),
            (10, HostEvent::DisconnectAll(RESTART_KICK.to_string())),
            (11, HostEvent::Restart),
        ]
    );
    assert_eq!(survival.node.coordinator().state(), CoordinatorState::Executing);

    // The issuing proxy was not targeted.
    assert!(proxy.host.events().is_empty());
    assert_eq!(proxy.node.coordinator().state(), CoordinatorState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_all_reaches_every_process() {
    let broker = InMemoryBroker::new();
    let lobby = start_node(&broker, "lobby").await;
    let survival = start_node(&broker, "survival").await;
    wait_for_receivers(&broker, SERVER_CONTROL, 2).await;

    let signal = ServerControlSignal::new(ControlAction::Shutdown, "ALL", 2);
    lobby.node.client().unwrap().issue_control(&signal).await;
    tokio::time::sleep(Duration::from_secs(4)).await;

    for node in [&lobby, &survival] {
        assert_eq!(
            node.host.events(),
            vec![
                HostEvent::Broadcast("Server shutting down in 2 seconds".to_string()),
                HostEvent::Broadcast("Server shutting down in 1 second".to_string()),
                HostEvent::Broadcast("Server shutting down now.".to_string()),
                HostEvent::DisconnectAll(SHUTDOWN_KICK.to_string()),
                HostEvent::Shutdown,
            ]
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_newer_signal_replaces_countdown() {
    let broker = InMemoryBroker::new();
    let proxy = start_node(&broker, "proxy").await;
    let survival = start_node(&broker, "survival").await;
    wait_for_receivers(&broker, SERVER_CONTROL, 2).await;
    let client = proxy.node.client().unwrap();

    client
        .issue_control(&ServerControlSignal::new(ControlAction::Restart, "survival", 30))
        .await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    client
        .issue_control(&ServerControlSignal::new(ControlAction::Shutdown, "survival", 3))
        .await;
    tokio::time::sleep(Duration::from_secs(40)).await;

    let events = survival.host.events();
    assert!(!events.contains(&HostEvent::Restart));
    assert_eq!(events.last(), Some(&HostEvent::Shutdown));
    assert!(!survival
        .host
        .broadcasts()
        .iter()
        .any(|m| m == "Server restarting in 15 seconds"));
    assert!(survival.node.metrics().snapshot().control.countdown_tasks_cancelled > 0);
}

#[tokio::test(start_paused = true)]
async fn test_restart_falls_back_to_shutdown() {
    let broker = InMemoryBroker::new();
    let proxy = start_node(&broker, "proxy").await;
    let survival = build_node(&broker, "survival", RecordingHost::without_restart());
    assert!(survival.node.start().await);
    wait_for_receivers(&broker, SERVER_CONTROL, 2).await;

    proxy
        .node
        .client()
        .unwrap()
        .issue_control(&ServerControlSignal::new(ControlAction::Restart, "survival", 1))
        .await;
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(survival.host.events().last(), Some(&HostEvent::Shutdown));
}

#[tokio::test]
async fn test_notifications_survive_between_processes() {
    let broker = InMemoryBroker::new();
    let lobby = start_node(&broker, "lobby").await;
    let survival = start_node(&broker, "survival").await;
    let player = Uuid::new_v4();

    let queue = lobby.node.notifications();
    assert!(queue.append(player, "You were paid 50 coins").await);
    assert!(queue.append(player, "Your bounty was claimed").await);

    let client = survival.node.client().unwrap();
    assert_eq!(
        client.drain_notifications(&player).await,
        vec!["You were paid 50 coins", "Your bounty was claimed"]
    );
    assert!(client.drain_notifications(&player).await.is_empty());
}

#[tokio::test]
async fn test_fire_and_forget_notification_arrives() {
    let broker = InMemoryBroker::new();
    let lobby = start_node(&broker, "lobby").await;
    let player = Uuid::new_v4();

    let client = lobby.node.client().unwrap();
    client.notify_offline(player, "Welcome back");

    let mut drained = Vec::new();
    for _ in 0..100 {
        drained = client.drain_notifications(&player).await;
        if !drained.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(drained, vec!["Welcome back"]);
}

#[tokio::test]
async fn test_malformed_and_unroutable_messages_are_dropped() {
    let broker = InMemoryBroker::new();
    let survival = start_node(&broker, "survival").await;
    wait_for_receivers(&broker, PLAYER_SWITCH, 1).await;

    let publisher = survival.node.publisher();
    publisher.publish_payload(PLAYER_SWITCH, "{not json").await;
    publisher
        .publish(PLAYER_SWITCH, &Envelope::new("teleport"))
        .await;

    assert!(
        wait_until(Duration::from_secs(2), || {
            let snapshot = survival.node.metrics().snapshot();
            snapshot.subscribe.decode_failures == 1 && snapshot.subscribe.unroutable_messages == 1
        })
        .await
    );
    assert!(survival.node.subscriber().is_running());
}

/// A signal with an unrepresentable delay is rejected and the subscriber
/// keeps delivering later messages.
#[tokio::test(start_paused = true)]
async fn test_out_of_range_delay_keeps_subscriber_alive() {
    let broker = InMemoryBroker::new();
    let proxy = start_node(&broker, "proxy").await;
    let survival = build_node(&broker, "survival", RecordingHost::new());
    let received = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&received);
    survival
        .node
        .router()
        .register(CHAT_CROSS_SERVER, Some("chat"), move |envelope| {
            let message: CrossServerChat = envelope.payload().unwrap();
            log.lock().unwrap().push(message.message);
        });
    assert!(survival.node.start().await);
    wait_for_receivers(&broker, SERVER_CONTROL, 2).await;

    let client = proxy.node.client().unwrap();
    client
        .issue_control(&ServerControlSignal::new(ControlAction::Restart, "all", u64::MAX))
        .await;
    assert!(
        wait_until(Duration::from_secs(1), || {
            survival.node.metrics().snapshot().control.signals_ignored == 1
        })
        .await
    );

    client.publish(&chat("proxy", "still here")).await;
    assert!(
        wait_until(Duration::from_secs(1), || !received.lock().unwrap().is_empty()).await,
        "chat after the rejected signal never arrived"
    );
    assert_eq!(*received.lock().unwrap(), vec!["still here".to_string()]);
    assert!(survival.node.subscriber().is_running());
    assert_eq!(survival.node.coordinator().state(), CoordinatorState::Idle);
    assert!(survival.host.events().is_empty());
}
