//! Session coordinator wiring: status, sync, outbound intents, cleanup.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use client_session::transport::mock::MockConnector;
use client_session::{
    ClientAction, ConnectionConfig, ConnectionEvent, NetworkEvent, SessionCoordinator,
    SessionError, SessionMode, StateError,
};

const ADDRESS: &str = "mock:7777";

fn coordinator(connector: &MockConnector) -> SessionCoordinator {
    let config = ConnectionConfig {
        address: ADDRESS.to_owned(),
        reconnect_base_delay: Duration::from_millis(500),
        max_reconnect_attempts: 2,
        max_pending_actions: 64,
    };
    SessionCoordinator::new(config, Arc::new(connector.clone()))
}

async fn next(session: &mut SessionCoordinator) -> ConnectionEvent {
    tokio::time::timeout(Duration::from_secs(600), session.next_event())
        .await
        .expect("no session event")
        .expect("signal channel closed")
}

fn status(session: &SessionCoordinator) -> String {
    session.get_connection_status().status
}

// ================================================================
// Connection status
// ================================================================

#[tokio::test(start_paused = true)]
async fn status_follows_the_connection() {
    let connector = MockConnector::new();
    let mut session = coordinator(&connector);
    assert_eq!(status(&session), "offline");
    assert_eq!(session.mode(), SessionMode::Offline);

    session.connect(ADDRESS).unwrap();
    assert!(matches!(next(&mut session).await, ConnectionEvent::Connected { .. }));
    assert_eq!(status(&session), "online");
    assert_eq!(session.mode(), SessionMode::Online);
    assert!(session.get_connection_status().connected);

    connector.refuse_all(true);
    connector.drop_link(None);
    assert!(matches!(next(&mut session).await, ConnectionEvent::Disconnected { .. }));
    assert_eq!(status(&session), "offline");

    assert_eq!(next(&mut session).await, ConnectionEvent::Reconnecting { attempt: 1 });
    assert!(matches!(next(&mut session).await, ConnectionEvent::ConnectFailed { .. }));
    assert_eq!(status(&session), "error");
    assert_eq!(session.get_connection_status().reconnect_attempts, 2);
}

#[tokio::test(start_paused = true)]
async fn offline_mode_disconnects_and_pins_status() {
    let connector = MockConnector::new();
    let mut session = coordinator(&connector);
    session.connect(ADDRESS).unwrap();
    next(&mut session).await;

    session.set_offline_mode().unwrap();
    assert_eq!(status(&session), "offline");
    assert_eq!(session.mode(), SessionMode::Offline);
    assert!(!session.connection_manager().is_connected());
    assert!(!connector.is_linked());
}

// ================================================================
// State
// ================================================================

#[tokio::test(start_paused = true)]
async fn inbound_state_sync_merges_into_the_tree() {
    let connector = MockConnector::new();
    let mut session = coordinator(&connector);
    session
        .replicated_state()
        .update_state("world.weather", json!("rain"))
        .unwrap();
    session.connect(ADDRESS).unwrap();
    next(&mut session).await;

    connector.inject(r#"{"action":"state:sync","data":{"world":{"time":3},"player":{"gold":9}}}"#);
    next(&mut session).await;

    let state = session.replicated_state();
    assert_eq!(state.get("world.time"), Some(json!(3)));
    assert_eq!(state.get("world.weather"), Some(json!("rain")));
    assert_eq!(state.get("player.gold"), Some(json!(9)));
    assert_eq!(state.get("connectionStatus"), Some(json!("online")));
}

#[tokio::test(start_paused = true)]
async fn subscriber_cannot_start_a_nested_sync() {
    let connector = MockConnector::new();
    let mut session = coordinator(&connector);
    let state = session.replicated_state().clone();
    let nested = state.clone();
    state.subscribe("world.time", move |_| {
        assert_eq!(
            nested.sync_state(json!({"nested": 1})),
            Err(StateError::ReentrantSync)
        );
        Ok(())
    });
    session.connect(ADDRESS).unwrap();
    next(&mut session).await;

    connector.inject(r#"{"action":"state:sync","data":{"world":{"time":1}}}"#);
    next(&mut session).await;
    assert_eq!(state.get("world.time"), Some(json!(1)));
    assert_eq!(state.get("nested"), None);
}

// ================================================================
// Outbound
// ================================================================

#[tokio::test(start_paused = true)]
async fn player_updates_queue_offline_and_send_on_connect() {
    let connector = MockConnector::new();
    let mut session = coordinator(&connector);
    session
        .update_player_state(json!({"stats": {"hp": 40}}))
        .unwrap();
    session
        .update_player_state(json!({"stats": {"mp": 5}}))
        .unwrap();

    assert_eq!(
        session.replicated_state().get("player.stats"),
        Some(json!({"hp": 40, "mp": 5}))
    );
    assert_eq!(session.get_connection_status().pending_actions, 2);

    session.connect(ADDRESS).unwrap();
    next(&mut session).await;

    let sent = connector.sent_envelopes();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|e| e.action == "player:update"));
    assert_eq!(sent[0].data, json!({"stats": {"hp": 40}}));
    assert_eq!(session.get_connection_status().pending_actions, 0);
}

#[tokio::test(start_paused = true)]
async fn non_object_player_update_is_rejected() {
    let connector = MockConnector::new();
    let mut session = coordinator(&connector);
    assert_eq!(
        session.update_player_state(json!(12)),
        Err(SessionError::State(StateError::NotAnObject))
    );
    assert_eq!(session.get_connection_status().pending_actions, 0);
}

#[tokio::test(start_paused = true)]
async fn outbound_intents_on_the_bus_reach_the_transport() {
    let connector = MockConnector::new();
    let mut session = coordinator(&connector);
    session.connect(ADDRESS).unwrap();
    next(&mut session).await;

    session.event_bus().emit(
        NetworkEvent::Outbound(ClientAction::PlayerChangeMap),
        &json!({"to": "v2"}),
    );
    session.poll();

    let sent = connector.sent_envelopes();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].action, "player:changeMap");
    assert_eq!(sent[0].data, json!({"to": "v2"}));
}

// ================================================================
// Cleanup
// ================================================================

#[tokio::test(start_paused = true)]
async fn cleanup_is_idempotent() {
    let connector = MockConnector::new();
    let mut session = coordinator(&connector);
    session.connect(ADDRESS).unwrap();
    next(&mut session).await;
    session
        .replicated_state()
        .subscribe("player", |_| Ok(()));
    session.update_player_state(json!({"name": "ada"})).unwrap();

    session.cleanup();
    let after_first = session.replicated_state().get_full_state();
    session.cleanup();

    assert!(session.is_cleaned_up());
    assert!(session.event_bus().is_empty());
    assert_eq!(session.replicated_state().subscription_count(), 0);
    assert_eq!(session.replicated_state().get_full_state(), after_first);
    assert_eq!(session.replicated_state().get("player"), Some(json!({})));
    assert_eq!(status(&session), "offline");
    assert!(!connector.is_linked());
    assert_eq!(session.connect(ADDRESS), Err(SessionError::CleanedUp));
}
