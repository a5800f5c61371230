//! # Telemetry Transport
//!
//! Delivery queue and HTTP transport for telemetry payloads.
//!
//! This library provides:
//! - Immediate delivery of single payloads and batches over HTTP
//! - A priority-ordered delivery queue persisted across restarts
//! - Retries with capped exponential backoff, honouring `Retry-After`
//! - Automatic flushing when connectivity returns
//! - A plugin pipeline that can rewrite or filter outgoing payloads
//!
//! ## Module Organization
//!
//! - [`transport`] - The [`Transport`] and its builder
//! - [`client`] - The HTTP delivery client
//! - [`queue`] - The delivery queue and its persisted form
//! - [`storage`] - The storage interface, with [`adapters`] for disk storage
//! - [`plugin`] - Payload interceptors
//! - [`network`] - Connectivity observation
//! - [`retry`] - Backoff policy
//! - [`config`], [`error`], [`item`], [`response`] - Supporting types

pub mod adapters;
pub mod client;
pub mod config;
pub mod error;
pub mod item;
pub mod network;
pub mod plugin;
pub mod queue;
pub mod response;
pub mod retry;
pub mod storage;
pub mod transport;

// Re-export commonly used types at crate root for convenience
pub use adapters::FilesystemStorage;
pub use client::{DeliveryClient, HttpDeliveryClient};
pub use config::{ApiKey, SdkInfo, TransportConfig};
pub use error::{ConfigError, StorageError, TransportError};
pub use item::{ItemId, Priority, QueueItem, Timestamp};
pub use network::{NetworkMonitor, NetworkStatus};
pub use plugin::{Plugin, PluginPipeline};
pub use queue::DeliveryQueue;
pub use response::{BatchOutcome, SendOutcome, TransportResponse};
pub use retry::RetryPolicy;
pub use storage::{InMemoryStorage, Storage};
pub use transport::{Transport, TransportBuilder};
