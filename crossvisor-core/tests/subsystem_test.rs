//! Integration tests for the control core.
//!
//! These drive the full submit → poll → dispatch → complete path against
//! the mock connector.

use std::sync::{Arc, Once};
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;

use crossvisor_core::{
    Connection, ControlConfig, ControlError, ManagedObjectKind, MockConnector,
    MockConnectorFactory, OperationHandle, OperationKind, PollingConfig, ConnectorSet,
};

static INIT: Once = Once::new();

fn init_test_logging() {
    INIT.call_once(|| {
        let _ = crossvisor_common::init_logging("info");
    });
}

fn fast_config() -> ControlConfig {
    ControlConfig {
        address: "mock://lab".to_string(),
        polling: PollingConfig {
            event_interval_millis: 5,
            task_interval_millis: 5,
            max_batch: 100,
        },
    }
}

#[tokio::test]
async fn test_execute_start_and_await_outcome() {
    init_test_logging();

    let mock = Arc::new(MockConnector::new("mock://lab"));
    let vm = mock.add_computer("web-1");

    let connection = Connection::open(mock.clone(), &fast_config()).await.unwrap();

    let mut handle = OperationHandle::new(OperationKind::Start);
    handle.set_param("reason", json!("integration test")).unwrap();

    let handle = connection.execute(&vm, handle).await.unwrap();
    assert!(handle.is_submitted());

    let outcome = handle.wait_timeout(Duration::from_secs(2)).await.unwrap();
    assert_eq!(outcome, json!({"state": "running"}));
    assert_eq!(connection.pending_operations(), 0);

    connection.close().await;
}

#[tokio::test]
async fn test_failed_remote_operation_surfaces_as_execution_error() {
    init_test_logging();

    let mock = Arc::new(MockConnector::new("mock://lab"));
    let vm = mock.add_computer("web-1");
    let connection = Connection::open(mock.clone(), &fast_config()).await.unwrap();

    // Resuming a stopped computer fails remotely, not at the handshake.
    let handle = connection
        .execute(&vm, OperationHandle::new(OperationKind::Resume))
        .await
        .unwrap();

    match handle.wait_timeout(Duration::from_secs(2)).await {
        Err(ControlError::Execution { message, .. }) => {
            assert_eq!(message, "computer is not paused");
        }
        other => panic!("expected execution error, got {:?}", other),
    }

    connection.close().await;
}

#[tokio::test]
async fn test_unsupported_operation_rejected_before_any_remote_call() {
    init_test_logging();

    let mock = Arc::new(MockConnector::new("mock://lab"));
    let dc = mock.datacenter_id();
    let connection = Connection::open(mock.clone(), &fast_config()).await.unwrap();

    // The datacenter kind declares an empty operation set.
    match connection
        .execute(&dc, OperationHandle::new(OperationKind::Start))
        .await
    {
        Err(ControlError::Unsupported { kind, operation }) => {
            assert_eq!(kind, ManagedObjectKind::Datacenter);
            assert_eq!(operation, OperationKind::Start);
        }
        other => panic!("expected unsupported, got {:?}", other.map(|_| ())),
    }

    // The capability check fired before the backend was touched.
    assert_eq!(mock.issued_operations(), 0);

    connection.close().await;
}

#[tokio::test]
async fn test_capability_discovery() {
    init_test_logging();

    let set = ConnectorSet::new(vec![Arc::new(MockConnectorFactory)]);
    let connector = set.connect("mock://lab").await.unwrap();
    let connection = Connection::open(connector, &fast_config()).await.unwrap();

    let computer_ops = connection.commands_for(ManagedObjectKind::Computer);
    assert!(computer_ops.contains(&OperationKind::Start));
    assert!(computer_ops.contains(&OperationKind::CreateSnapshot));

    assert!(connection
        .commands_for(ManagedObjectKind::Datacenter)
        .is_empty());
    // Undeclared kinds answer with the empty set as well.
    assert!(connection
        .commands_for(ManagedObjectKind::ResourceGroup)
        .is_empty());

    connection.close().await;
}

#[tokio::test]
async fn test_unsolicited_events_reach_the_registered_receiver() {
    init_test_logging();

    let mock = Arc::new(MockConnector::new("mock://lab"));
    let vm = mock.add_computer("web-1");
    let connection = Connection::open(mock.clone(), &fast_config()).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    connection.inventory().set_event_receiver(&vm, tx).unwrap();

    mock.inject_event(&vm, "guest agent heartbeat lost");

    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.target, vm);
    assert_eq!(event.description, "guest agent heartbeat lost");

    connection.close().await;
}

#[tokio::test]
async fn test_close_drains_collectors_and_dispatcher() {
    init_test_logging();

    let mock = Arc::new(MockConnector::new("mock://lab"));
    let vm = mock.add_computer("web-1");
    let connection = Connection::open(mock.clone(), &fast_config()).await.unwrap();

    let handle = connection
        .execute(&vm, OperationHandle::new(OperationKind::Start))
        .await
        .unwrap();
    handle.wait_timeout(Duration::from_secs(2)).await.unwrap();

    // Close must deactivate, drain both collectors (one closing marker
    // each), stop the dispatcher and join everything in bounded time.
    tokio::time::timeout(Duration::from_secs(5), connection.close())
        .await
        .unwrap();
    assert!(!connection.is_open());
    assert_eq!(connection.pending_operations(), 0);
}

#[tokio::test]
async fn test_collector_transport_fault_fails_pending_operation_on_close() {
    init_test_logging();

    let mock = Arc::new(MockConnector::new("mock://lab"));
    let vm = mock.add_computer("web-1");

    // The task collector's very first poll faults, so it stops without a
    // closing marker and no outcome is ever delivered.
    mock.fail_next_task_poll();

    let connection = Connection::open(mock.clone(), &fast_config()).await.unwrap();
    let handle = connection
        .execute(&vm, OperationHandle::new(OperationKind::Start))
        .await
        .unwrap();

    // The caller only times out locally while the connection stays open.
    match handle.wait_timeout(Duration::from_millis(100)).await {
        Err(ControlError::Timeout(_)) => {}
        other => panic!("expected timeout, got {:?}", other),
    }

    // Closing the connection fails the orphaned continuation explicitly.
    tokio::time::timeout(Duration::from_secs(5), connection.close())
        .await
        .unwrap();

    match handle.wait().await {
        Err(ControlError::Execution { message, .. }) => {
            assert!(message.contains("connection closed"));
        }
        other => panic!("expected execution error, got {:?}", other),
    }
}
