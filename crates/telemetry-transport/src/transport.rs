//! # Delivery Transport
//!
//! [`Transport`] accepts telemetry payloads, delivers them through a
//! [`DeliveryClient`], and keeps whatever could not be delivered in a
//! persisted [`DeliveryQueue`] until connectivity returns or a retry timer
//! fires.
//!
//! A single background worker owns all deferred work. Retry timers and
//! connectivity transitions only post a trigger to the worker. Regaining
//! connectivity flushes the whole queue; an elapsed retry timer flushes only
//! the items whose backoff is over. Timers never call back into the
//! transport themselves.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::client::{DeliveryClient, HttpDeliveryClient};
use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::item::{ItemId, Priority, QueueItem};
use crate::network::{NetworkMonitor, NetworkStatus};
use crate::plugin::{Plugin, PluginPipeline};
use crate::queue::DeliveryQueue;
use crate::response::{BatchOutcome, SendOutcome, TransportResponse};
use crate::retry::RetryPolicy;
use crate::storage::{InMemoryStorage, Storage};

/// Work posted to the background worker
#[derive(Debug)]
enum FlushTrigger {
    /// The backoff timer of an item elapsed
    Retry(ItemId),
}

/// Which queued items a flush pass attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushScope {
    /// Everything queued
    All,
    /// Only items whose retry timer has fired
    Due,
}

// ============================================================================
// Builder
// ============================================================================

/// Assembles a [`Transport`] from its collaborators
///
/// Every collaborator is optional: the HTTP client is built from the
/// configuration, storage defaults to [`InMemoryStorage`] and connectivity
/// defaults to online.
pub struct TransportBuilder {
    config: TransportConfig,
    client: Option<Arc<dyn DeliveryClient>>,
    storage: Option<Arc<dyn Storage>>,
    network: Option<NetworkMonitor>,
    plugins: PluginPipeline,
}

impl TransportBuilder {
    fn new(config: TransportConfig) -> Self {
        Self {
            config,
            client: None,
            storage: None,
            network: None,
            plugins: PluginPipeline::new(),
        }
    }

    /// Use a custom delivery client instead of [`HttpDeliveryClient`]
    pub fn client(mut self, client: Arc<dyn DeliveryClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Persist the queue in `storage`
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Observe connectivity through `network`
    pub fn network(mut self, network: NetworkMonitor) -> Self {
        self.network = Some(network);
        self
    }

    /// Register a plugin; plugins run in registration order
    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.register(plugin);
        self
    }

    /// Validate the configuration, restore the persisted queue and start the
    /// background worker
    ///
    /// A persisted queue that cannot be read or parsed is logged and the
    /// transport starts empty.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Config` if the configuration is invalid and
    /// `TransportError::InvalidRequest` if the default HTTP client cannot be
    /// built.
    pub async fn build(self) -> Result<Transport, TransportError> {
        self.config.validate()?;

        let client: Arc<dyn DeliveryClient> = match self.client {
            Some(client) => client,
            None => Arc::new(HttpDeliveryClient::new(&self.config)?),
        };
        let storage: Arc<dyn Storage> = match self.storage {
            Some(storage) => storage,
            None => Arc::new(InMemoryStorage::new()),
        };
        let network = self.network.unwrap_or_default();

        let queue = restore_queue(storage.as_ref(), &self.config).await;
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        let network_rx = network.subscribe();

        let inner = Arc::new(TransportInner {
            retry_policy: RetryPolicy::from_config(&self.config),
            config: self.config,
            client,
            storage,
            plugins: RwLock::new(self.plugins),
            network,
            queue: tokio::sync::Mutex::new(queue),
            flushing: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            retry_timers: Mutex::new(HashMap::new()),
            due: Mutex::new(HashSet::new()),
            triggers: trigger_tx,
            worker: Mutex::new(None),
        });

        let worker = tokio::spawn(run_worker(Arc::downgrade(&inner), network_rx, trigger_rx));
        if let Ok(mut slot) = inner.worker.lock() {
            *slot = Some(worker.abort_handle());
        }

        debug!(
            endpoint = %inner.config.endpoint,
            batch_size = inner.config.batch_size,
            offline_support = inner.config.offline_support,
            "Telemetry transport started"
        );

        Ok(Transport { inner })
    }
}

async fn restore_queue(storage: &dyn Storage, config: &TransportConfig) -> DeliveryQueue {
    let stored = match storage.get_item(&config.storage_key).await {
        Ok(stored) => stored,
        Err(e) => {
            warn!(
                storage_key = %config.storage_key,
                error = %e,
                "Failed to read persisted queue, starting empty"
            );
            None
        }
    };

    let Some(json) = stored else {
        return DeliveryQueue::new(config.max_queue_size);
    };

    match DeliveryQueue::from_json(&json, config.max_queue_size) {
        Ok((queue, dropped)) => {
            if dropped > 0 {
                warn!(
                    storage_key = %config.storage_key,
                    dropped,
                    capacity = queue.capacity(),
                    "Persisted queue exceeds capacity, dropped lowest priority items"
                );
            }
            info!(
                storage_key = %config.storage_key,
                item_count = queue.len(),
                "Restored persisted delivery queue"
            );
            queue
        }
        Err(e) => {
            warn!(
                storage_key = %config.storage_key,
                error = %e,
                "Persisted queue is unreadable, starting empty"
            );
            DeliveryQueue::new(config.max_queue_size)
        }
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Reliable delivery of telemetry payloads
///
/// Cloning yields another handle to the same transport.
///
/// # Examples
///
/// ```no_run
/// use serde_json::json;
/// use telemetry_transport::{Transport, TransportConfig};
///
/// # async fn example() -> Result<(), telemetry_transport::TransportError> {
/// let config = TransportConfig::new("https://ingest.example.com/v1/events", "api-key");
/// let transport = Transport::builder(config).build().await?;
///
/// let outcome = transport.send(json!({"event": "page_view"})).await;
/// println!("{}", outcome.message());
///
/// transport.destroy().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Transport {
    inner: Arc<TransportInner>,
}

impl Transport {
    pub fn builder(config: TransportConfig) -> TransportBuilder {
        TransportBuilder::new(config)
    }

    /// Build a transport with default collaborators
    pub async fn new(config: TransportConfig) -> Result<Self, TransportError> {
        Self::builder(config).build().await
    }

    /// Deliver a single payload now, or queue it for later
    ///
    /// Plugins run first and may filter the payload. While offline, or when
    /// the endpoint reports a transient failure, the payload is queued if
    /// offline support is enabled. Terminal failures are never queued.
    pub async fn send(&self, payload: Value) -> SendOutcome {
        if self.inner.is_destroyed() {
            return SendOutcome::Failed {
                error: TransportError::Destroyed,
            };
        }

        let pipeline = self.inner.pipeline();
        let Some(payload) = pipeline.before_send(payload).await else {
            return SendOutcome::filtered();
        };

        self.inner.deliver_or_queue(vec![payload], &pipeline).await
    }

    /// Deliver several payloads in one request, or queue them for later
    ///
    /// Each payload passes through the plugins individually. An empty batch
    /// succeeds without a request; a batch whose every payload is filtered
    /// reports `Filtered`.
    pub async fn send_batch(&self, payloads: Vec<Value>) -> SendOutcome {
        if self.inner.is_destroyed() {
            return SendOutcome::Failed {
                error: TransportError::Destroyed,
            };
        }

        if payloads.is_empty() {
            return SendOutcome::Sent { response: None };
        }

        let pipeline = self.inner.pipeline();
        let (kept, filtered) = pipeline.before_send_all(payloads).await;
        if kept.is_empty() {
            return SendOutcome::filtered();
        }
        if filtered > 0 {
            debug!(filtered, remaining = kept.len(), "Plugins filtered part of batch");
        }

        self.inner.deliver_or_queue(kept, &pipeline).await
    }

    /// Add a payload to the queue without attempting delivery
    ///
    /// The payload is stored as given; plugins are not consulted.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::QueueFull` if the queue is at capacity with
    /// items that all deliver before this one.
    pub async fn enqueue(
        &self,
        payload: Value,
        priority: Priority,
    ) -> Result<ItemId, TransportError> {
        self.inner.ensure_active()?;

        let ids = self.inner.enqueue_all(vec![payload], priority, 0).await;
        ids.into_iter().next().ok_or(TransportError::QueueFull {
            capacity: self.inner.config.max_queue_size,
        })
    }

    /// Attempt delivery of everything queued, in batches of `batch_size`
    ///
    /// Returns one outcome per attempted batch. Nothing is attempted while
    /// offline or while another flush is running.
    pub async fn flush(&self) -> Result<Vec<BatchOutcome>, TransportError> {
        self.inner.flush().await
    }

    pub async fn queue_size(&self) -> Result<usize, TransportError> {
        self.inner.ensure_active()?;
        Ok(self.inner.queue.lock().await.len())
    }

    /// Snapshot of queued items in delivery order
    pub async fn queued_items(&self) -> Result<Vec<QueueItem>, TransportError> {
        self.inner.ensure_active()?;
        Ok(self.inner.queue.lock().await.items().to_vec())
    }

    /// Discard every queued item and its pending retry
    pub async fn clear_queue(&self) -> Result<(), TransportError> {
        self.inner.ensure_active()?;

        let mut queue = self.inner.queue.lock().await;
        let cleared = queue.len();
        queue.clear();
        self.inner.cancel_all_retries();
        self.inner.persist(&queue).await;

        info!(item_count = cleared, "Cleared delivery queue");
        Ok(())
    }

    pub fn register_plugin(&self, plugin: Arc<dyn Plugin>) -> Result<(), TransportError> {
        self.inner.ensure_active()?;

        let mut plugins = self
            .inner
            .plugins
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        plugins.register(plugin);
        Ok(())
    }

    pub fn is_online(&self) -> bool {
        self.inner.network.is_online()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }

    /// Tear the transport down
    ///
    /// Cancels all pending retries, stops the worker, clears the queue and
    /// removes the persisted state. Later operations report
    /// `TransportError::Destroyed`. Calling this more than once is harmless.
    pub async fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.inner.cancel_all_retries();
        self.inner.stop_worker();

        let mut queue = self.inner.queue.lock().await;
        let discarded = queue.len();
        queue.clear();

        if let Err(e) = self
            .inner
            .storage
            .remove_item(&self.inner.config.storage_key)
            .await
        {
            warn!(
                storage_key = %self.inner.config.storage_key,
                error = %e,
                "Failed to remove persisted queue"
            );
        }

        info!(discarded, "Telemetry transport destroyed");
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("endpoint", &self.inner.config.endpoint)
            .field("network", &self.inner.network.status())
            .field("destroyed", &self.inner.is_destroyed())
            .finish()
    }
}

// ============================================================================
// Shared State
// ============================================================================

struct TransportInner {
    config: TransportConfig,
    retry_policy: RetryPolicy,
    client: Arc<dyn DeliveryClient>,
    storage: Arc<dyn Storage>,
    plugins: RwLock<PluginPipeline>,
    network: NetworkMonitor,
    queue: tokio::sync::Mutex<DeliveryQueue>,
    flushing: AtomicBool,
    destroyed: AtomicBool,
    retry_timers: Mutex<HashMap<ItemId, AbortHandle>>,
    /// Items whose backoff elapsed and that no flush has attempted since
    due: Mutex<HashSet<ItemId>>,
    triggers: mpsc::UnboundedSender<FlushTrigger>,
    worker: Mutex<Option<AbortHandle>>,
}

/// Clears the flush-in-progress flag when a flush ends, however it ends
struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl TransportInner {
    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn ensure_active(&self) -> Result<(), TransportError> {
        if self.is_destroyed() {
            return Err(TransportError::Destroyed);
        }
        Ok(())
    }

    fn pipeline(&self) -> PluginPipeline {
        self.plugins
            .read()
            .map(|plugins| plugins.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    async fn deliver_or_queue(
        &self,
        payloads: Vec<Value>,
        pipeline: &PluginPipeline,
    ) -> SendOutcome {
        if !self.network.is_online() {
            if !self.config.offline_support {
                return SendOutcome::Failed {
                    error: TransportError::Offline,
                };
            }
            debug!(item_count = payloads.len(), "Offline, queueing payloads");
            return self.queue_outcome(payloads, 0, None).await;
        }

        let response = self.client.deliver(&payloads).await;
        pipeline.after_send(&response).await;

        match response {
            TransportResponse::Success { data } => SendOutcome::Sent { response: data },
            TransportResponse::Retry {
                ref message,
                retry_after,
                ..
            } if self.config.offline_support => {
                if self.retry_policy.is_exhausted(1) {
                    error!(
                        item_count = payloads.len(),
                        max_retries = self.retry_policy.max_retries,
                        error = %message,
                        "Telemetry item permanently failed"
                    );
                    return SendOutcome::Failed {
                        error: TransportError::RetriesExhausted {
                            max_retries: self.retry_policy.max_retries,
                            message: message.clone(),
                        },
                    };
                }
                warn!(
                    item_count = payloads.len(),
                    error = %message,
                    "Delivery failed transiently, queueing for retry"
                );
                self.queue_outcome(payloads, 1, retry_after).await
            }
            failed => {
                warn!(response = ?failed, "Delivery failed");
                SendOutcome::Failed {
                    error: failed.to_error().unwrap_or(TransportError::ConnectionFailed {
                        message: "Delivery failed".to_string(),
                    }),
                }
            }
        }
    }

    /// Queue payloads and describe the result
    ///
    /// Payloads that already failed (`retry_count > 0`) get a retry timer.
    async fn queue_outcome(
        &self,
        payloads: Vec<Value>,
        retry_count: u32,
        retry_after: Option<Duration>,
    ) -> SendOutcome {
        let item_ids = self
            .enqueue_all(payloads, Priority::default(), retry_count)
            .await;

        if item_ids.is_empty() {
            return SendOutcome::Failed {
                error: TransportError::QueueFull {
                    capacity: self.config.max_queue_size,
                },
            };
        }

        if retry_count > 0 {
            let delay = self.retry_policy.delay_for(retry_count, retry_after);
            for id in &item_ids {
                self.schedule_retry(id.clone(), delay);
            }
        }

        SendOutcome::Queued { item_ids }
    }

    /// Push payloads into the queue and persist it
    ///
    /// Returns the ids of the items that remain queued; an item evicted by a
    /// later insert of the same call is not reported.
    async fn enqueue_all(
        &self,
        payloads: Vec<Value>,
        priority: Priority,
        retry_count: u32,
    ) -> Vec<ItemId> {
        let mut queue = self.queue.lock().await;
        let mut ids = Vec::with_capacity(payloads.len());

        for payload in payloads {
            let item = QueueItem::new(payload, priority).with_retry_count(retry_count);
            debug!(item_id = %item.id, priority = priority.value(), "Queued telemetry item");
            ids.push(item.id.clone());

            if let Some(evicted) = queue.push(item) {
                warn!(
                    item_id = %evicted.id,
                    priority = evicted.priority.value(),
                    capacity = queue.capacity(),
                    "Delivery queue full, evicted item"
                );
                self.cancel_retry(&evicted.id);
            }
        }

        ids.retain(|id| queue.contains(id));
        self.persist(&queue).await;
        ids
    }

    async fn flush(&self) -> Result<Vec<BatchOutcome>, TransportError> {
        self.ensure_active()?;
        Ok(self.run_flush(FlushScope::All).await)
    }

    /// Attempt the items whose retry timer has fired
    async fn flush_due(&self) -> Result<Vec<BatchOutcome>, TransportError> {
        self.ensure_active()?;
        Ok(self.run_flush(FlushScope::Due).await)
    }

    /// Run flush passes while holding the in-progress flag
    ///
    /// A caller that finds a flush already running returns at once. The
    /// running flush re-checks the due set after releasing the flag, so a
    /// timer that fires mid-flush is picked up by whichever flush ends last.
    async fn run_flush(&self, mut scope: FlushScope) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::new();

        loop {
            if !self.network.is_online() {
                debug!(?scope, "Offline, skipping flush");
                break;
            }

            if self
                .flushing
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                debug!(?scope, "Flush already in progress");
                break;
            }

            {
                let _guard = FlushGuard(&self.flushing);
                outcomes.extend(self.flush_pass(scope).await);
            }

            if self.is_destroyed() || !self.has_due() {
                break;
            }
            scope = FlushScope::Due;
        }

        outcomes
    }

    async fn flush_pass(&self, scope: FlushScope) -> Vec<BatchOutcome> {
        let pending = self.take_pending(scope).await;
        if pending.is_empty() {
            return Vec::new();
        }

        let batch_size = self.config.batch_size.max(1);
        info!(
            item_count = pending.len(),
            batch_size,
            ?scope,
            "Flushing delivery queue"
        );

        let pipeline = self.pipeline();
        let mut outcomes = Vec::new();

        for batch in pending.chunks(batch_size) {
            if self.is_destroyed() || !self.network.is_online() {
                debug!(
                    remaining = pending.len().saturating_sub(outcomes.len() * batch_size),
                    "Stopping flush early"
                );
                break;
            }

            let payloads: Vec<Value> = batch.iter().map(|item| item.payload.clone()).collect();
            let response = self.client.deliver(&payloads).await;
            pipeline.after_send(&response).await;

            outcomes.push(self.settle_batch(batch, response).await);
        }

        outcomes
    }

    /// Snapshot the items a pass attempts and clear their due marks
    ///
    /// Items stay in the queue until their batch settles.
    async fn take_pending(&self, scope: FlushScope) -> Vec<QueueItem> {
        let queue = self.queue.lock().await;
        let mut due = self.due.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        match scope {
            FlushScope::All => {
                let pending = queue.items().to_vec();
                for item in &pending {
                    due.remove(&item.id);
                }
                pending
            }
            FlushScope::Due => {
                let pending: Vec<QueueItem> = queue
                    .items()
                    .iter()
                    .filter(|item| due.contains(&item.id))
                    .cloned()
                    .collect();
                due.clear();
                pending
            }
        }
    }

    fn has_due(&self) -> bool {
        !self
            .due
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_empty()
    }

    /// Apply the response of one flushed batch to the queue
    ///
    /// Items are matched by id, so an item removed while the request was in
    /// flight is left alone.
    async fn settle_batch(
        &self,
        batch: &[QueueItem],
        response: TransportResponse,
    ) -> BatchOutcome {
        let attempted: Vec<ItemId> = batch.iter().map(|item| item.id.clone()).collect();
        let mut requeued = Vec::new();
        let mut dropped = Vec::new();

        let mut queue = self.queue.lock().await;

        match &response {
            TransportResponse::Success { .. } => {
                for id in &attempted {
                    queue.remove(id);
                    self.cancel_retry(id);
                }
                debug!(item_count = attempted.len(), "Delivered batch");
            }
            TransportResponse::Retry {
                message,
                retry_after,
                ..
            } => {
                for id in &attempted {
                    let Some(mut item) = queue.remove(id) else {
                        continue;
                    };
                    item.retry_count += 1;

                    if self.retry_policy.is_exhausted(item.retry_count) {
                        error!(
                            item_id = %item.id,
                            retry_count = item.retry_count,
                            max_retries = self.retry_policy.max_retries,
                            error = %message,
                            "Telemetry item permanently failed"
                        );
                        self.cancel_retry(&item.id);
                        dropped.push(item.id);
                        continue;
                    }

                    let delay = self.retry_policy.delay_for(item.retry_count, *retry_after);
                    let id = item.id.clone();
                    debug!(
                        item_id = %id,
                        retry_count = item.retry_count,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Scheduling retry"
                    );

                    if let Some(evicted) = queue.requeue(item) {
                        warn!(item_id = %evicted.id, "Delivery queue full, evicted item");
                        self.cancel_retry(&evicted.id);
                    }
                    self.schedule_retry(id.clone(), delay);
                    requeued.push(id);
                }
            }
            TransportResponse::Error { status, message } => {
                for id in &attempted {
                    if queue.remove(id).is_some() {
                        self.cancel_retry(id);
                        dropped.push(id.clone());
                    }
                }
                error!(
                    status = ?status,
                    error = %message,
                    item_count = dropped.len(),
                    "Batch rejected, dropping items"
                );
            }
        }

        self.persist(&queue).await;

        BatchOutcome {
            attempted,
            response,
            requeued,
            dropped,
        }
    }

    /// Write the queue to storage; failures are logged only
    async fn persist(&self, queue: &DeliveryQueue) {
        if self.is_destroyed() {
            return;
        }

        let json = match queue.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize delivery queue");
                return;
            }
        };

        if let Err(e) = self.storage.set_item(&self.config.storage_key, &json).await {
            warn!(
                storage_key = %self.config.storage_key,
                error = %e,
                "Failed to persist delivery queue"
            );
        }
    }

    fn schedule_retry(&self, id: ItemId, delay: Duration) {
        if self.is_destroyed() {
            return;
        }

        let triggers = self.triggers.clone();
        let timer_id = id.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = triggers.send(FlushTrigger::Retry(timer_id));
        });

        let mut timers = self
            .retry_timers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = timers.insert(id, timer.abort_handle()) {
            previous.abort();
        }
    }

    fn cancel_retry(&self, id: &ItemId) {
        let mut timers = self
            .retry_timers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(timer) = timers.remove(id) {
            timer.abort();
        }
    }

    fn cancel_all_retries(&self) {
        let mut timers = self
            .retry_timers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for (_, timer) in timers.drain() {
            timer.abort();
        }
        self.due
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    /// Forget the timer of an item whose retry just fired and mark it due
    fn retry_fired(&self, id: &ItemId) {
        self.retry_timers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(id);
        self.due
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id.clone());
    }

    fn stop_worker(&self) {
        let mut worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = worker.take() {
            handle.abort();
        }
    }
}

impl Drop for TransportInner {
    fn drop(&mut self) {
        self.cancel_all_retries();
        self.stop_worker();
    }
}

// ============================================================================
// Background Worker
// ============================================================================

/// Flush the whole queue on connectivity regained and the due items on
/// elapsed retry timers
///
/// Holds only a weak reference so that dropping the last [`Transport`]
/// handle ends the worker.
async fn run_worker(
    transport: Weak<TransportInner>,
    mut network: watch::Receiver<NetworkStatus>,
    mut triggers: mpsc::UnboundedReceiver<FlushTrigger>,
) {
    loop {
        let scope = tokio::select! {
            changed = network.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = *network.borrow_and_update();
                if !status.is_online() {
                    continue;
                }
                FlushScope::All
            }
            trigger = triggers.recv() => {
                let Some(FlushTrigger::Retry(id)) = trigger else {
                    break;
                };
                let Some(inner) = transport.upgrade() else {
                    break;
                };
                inner.retry_fired(&id);
                // Timers scheduled together fire together; one pass covers them all
                while let Ok(FlushTrigger::Retry(id)) = triggers.try_recv() {
                    inner.retry_fired(&id);
                }
                FlushScope::Due
            }
        };

        let Some(inner) = transport.upgrade() else {
            break;
        };
        if inner.is_destroyed() {
            break;
        }

        debug!(?scope, "Background flush triggered");
        let result = match scope {
            FlushScope::All => inner.flush().await,
            FlushScope::Due => inner.flush_due().await,
        };
        match result {
            Ok(outcomes) => debug!(?scope, batches = outcomes.len(), "Background flush finished"),
            Err(e) => warn!(?scope, error = %e, "Background flush failed"),
        }
    }

    debug!("Transport worker stopped");
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
