//! Integration tests for offline queueing and persistence
//!
//! These tests verify:
//! - Payloads sent while offline are queued and persisted to disk
//! - A restarted transport restores the queue in delivery order
//! - Regaining connectivity delivers the queue automatically

mod common;

use common::{transport_in, wait_for_queue_size, TestEndpoint};
use serde_json::json;
use telemetry_transport::{NetworkMonitor, Priority};
use tempfile::TempDir;

#[tokio::test]
async fn test_offline_payloads_survive_restart_and_deliver_when_online() {
    // Arrange
    let endpoint = TestEndpoint::responding(200).await;
    let dir = TempDir::new().unwrap();

    let first = transport_in(dir.path(), endpoint.config(), NetworkMonitor::new(false))
        .await
        .unwrap();

    // Act: queue while offline, then restart
    assert!(first.send(json!({"seq": 1})).await.is_queued());
    assert!(first.send(json!({"seq": 2})).await.is_queued());
    drop(first);

    let network = NetworkMonitor::new(false);
    let second = transport_in(dir.path(), endpoint.config(), network.clone())
        .await
        .unwrap();
    assert_eq!(second.queue_size().await.unwrap(), 2);
    assert_eq!(endpoint.request_count().await, 0);

    network.set_online(true);
    wait_for_queue_size(&second, 0).await;

    // Assert: one request carrying both payloads in order
    let envelopes = endpoint.envelopes().await;
    assert_eq!(envelopes.len(), 1);
    assert_eq!(envelopes[0]["items"], json!([{"seq": 1}, {"seq": 2}]));
    assert_eq!(envelopes[0]["sdk"]["name"], "telemetry-transport-rust");

    // Assert: the emptied queue was persisted
    drop(second);
    let third = transport_in(dir.path(), endpoint.config(), NetworkMonitor::new(false))
        .await
        .unwrap();
    assert_eq!(third.queue_size().await.unwrap(), 0);
}

#[tokio::test]
async fn test_restored_queue_keeps_priority_order() {
    let endpoint = TestEndpoint::responding(200).await;
    let dir = TempDir::new().unwrap();

    let first = transport_in(dir.path(), endpoint.config(), NetworkMonitor::new(false))
        .await
        .unwrap();
    for priority in [5, 1, 3] {
        first
            .enqueue(json!({ "priority": priority }), Priority::new(priority))
            .await
            .unwrap();
    }
    let before = first.queued_items().await.unwrap();
    drop(first);

    let second = transport_in(dir.path(), endpoint.config(), NetworkMonitor::new(false))
        .await
        .unwrap();
    let after = second.queued_items().await.unwrap();

    assert_eq!(after, before);
    let priorities: Vec<u32> = after.iter().map(|item| item.priority.value()).collect();
    assert_eq!(priorities, vec![1, 3, 5]);
}

#[tokio::test]
async fn test_destroy_removes_persisted_queue() {
    let endpoint = TestEndpoint::responding(200).await;
    let dir = TempDir::new().unwrap();

    let transport = transport_in(dir.path(), endpoint.config(), NetworkMonitor::new(false))
        .await
        .unwrap();
    transport.send(json!({"n": 1})).await;
    assert!(dir.path().join("telemetry_queue.dat").exists());

    transport.destroy().await;

    assert!(!dir.path().join("telemetry_queue.dat").exists());
    let restarted = transport_in(dir.path(), endpoint.config(), NetworkMonitor::new(false))
        .await
        .unwrap();
    assert_eq!(restarted.queue_size().await.unwrap(), 0);
}
