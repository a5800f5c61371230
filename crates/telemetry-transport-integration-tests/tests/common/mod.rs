//! Common test utilities for telemetry-transport integration tests
//!
//! This module provides:
//! - A mock ingestion endpoint built on wiremock
//! - Helpers for building transports over filesystem storage
//! - Polling helpers for background delivery

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use telemetry_transport::{
    FilesystemStorage, NetworkMonitor, Transport, TransportConfig, TransportError,
};
use wiremock::{matchers::method, Mock, MockServer, ResponseTemplate};

pub const API_KEY: &str = "integration-key";

// ============================================================================
// Mock Endpoint
// ============================================================================

/// Ingestion endpoint backed by a wiremock server
pub struct TestEndpoint {
    pub server: MockServer,
}

#[allow(dead_code)]
impl TestEndpoint {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Endpoint answering every request with `status`
    pub async fn responding(status: u16) -> Self {
        let endpoint = Self::start().await;
        endpoint.always(status).await;
        endpoint
    }

    pub async fn always(&self, status: u16) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Answer the next `times` requests with `status`, ahead of other mocks
    pub async fn first(&self, times: u64, status: u16) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status))
            .up_to_n_times(times)
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    pub fn url(&self) -> String {
        format!("{}/v1/ingest", self.server.uri())
    }

    pub fn config(&self) -> TransportConfig {
        TransportConfig::new(self.url(), API_KEY)
    }

    /// Envelope bodies of every request received so far
    pub async fn envelopes(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|request| request.body_json::<Value>().unwrap())
            .collect()
    }

    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}

// ============================================================================
// Transport Helpers
// ============================================================================

/// Build a transport persisting its queue under `dir`
#[allow(dead_code)]
pub async fn transport_in(
    dir: &Path,
    config: TransportConfig,
    network: NetworkMonitor,
) -> Result<Transport, TransportError> {
    let storage = FilesystemStorage::new(dir.to_path_buf()).await?;

    Transport::builder(config)
        .storage(Arc::new(storage))
        .network(network)
        .build()
        .await
}

/// Configuration with short backoff so retries happen within a test
#[allow(dead_code)]
pub fn fast_retry(config: TransportConfig) -> TransportConfig {
    TransportConfig {
        retry_base_delay_ms: 50,
        max_retry_delay_ms: 200,
        ..config
    }
}

/// Poll until the transport's queue reaches `expected` size
#[allow(dead_code)]
pub async fn wait_for_queue_size(transport: &Transport, expected: usize) {
    for _ in 0..100 {
        if transport.queue_size().await.unwrap() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!(
        "queue size stayed at {}, expected {}",
        transport.queue_size().await.unwrap(),
        expected
    );
}
