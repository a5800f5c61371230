//! # Delivery Queue
//!
//! Ordered, bounded collection of items awaiting delivery, plus its persisted
//! JSON form.
//!
//! Items are kept sorted by priority (lower first) and then by insertion
//! sequence. The queue itself performs no I/O; the transport writes the
//! snapshot produced by [`DeliveryQueue::to_snapshot`] to storage after every
//! mutation.

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::item::{ItemId, QueueItem};

/// Version written into persisted snapshots
pub const SNAPSHOT_VERSION: u32 = 1;

/// Persisted form of the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub version: u32,
    pub items: Vec<QueueItem>,
}

/// Accepted on restore: the versioned document or a bare item array
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredForm {
    Versioned(QueueSnapshot),
    Bare(Vec<QueueItem>),
}

/// Priority-ordered queue of pending items
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    items: Vec<QueueItem>,
    next_sequence: u64,
    capacity: usize,
}

impl DeliveryQueue {
    /// Create an empty queue holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            next_sequence: 0,
            capacity: capacity.max(1),
        }
    }

    /// Insert a new item, assigning it the next insertion sequence
    ///
    /// Returns the item evicted to stay within capacity, if any. The evicted
    /// item is always the last in delivery order and may be `item` itself.
    pub fn push(&mut self, mut item: QueueItem) -> Option<QueueItem> {
        item.sequence = self.next_sequence;
        self.next_sequence += 1;
        self.insert_sorted(item)
    }

    /// Put back an item that was taken for delivery, keeping its sequence
    pub fn requeue(&mut self, item: QueueItem) -> Option<QueueItem> {
        if item.sequence >= self.next_sequence {
            self.next_sequence = item.sequence + 1;
        }
        self.insert_sorted(item)
    }

    /// Remove an item by identifier
    pub fn remove(&mut self, id: &ItemId) -> Option<QueueItem> {
        let index = self.items.iter().position(|item| &item.id == id)?;
        Some(self.items.remove(index))
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.items.iter().any(|item| &item.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Items in delivery order
    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    /// Build the persisted form of the current state
    pub fn to_snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            version: SNAPSHOT_VERSION,
            items: self.items.clone(),
        }
    }

    /// Serialize the queue for storage
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_snapshot())
    }

    /// Restore a queue from its stored JSON form
    ///
    /// Bare arrays carry no reliable sequence numbers, so their items are
    /// renumbered by position before sorting. Items beyond `capacity` are
    /// dropped from the end of the delivery order; their count is returned
    /// alongside the queue.
    pub fn from_json(json: &str, capacity: usize) -> Result<(Self, usize), StorageError> {
        let stored: StoredForm = serde_json::from_str(json).map_err(|e| StorageError::Corrupt {
            message: format!("Failed to deserialize queue: {}", e),
        })?;

        let items = match stored {
            StoredForm::Versioned(snapshot) => {
                if snapshot.version > SNAPSHOT_VERSION {
                    return Err(StorageError::Corrupt {
                        message: format!(
                            "Unsupported queue snapshot version {} (max {})",
                            snapshot.version, SNAPSHOT_VERSION
                        ),
                    });
                }
                snapshot.items
            }
            StoredForm::Bare(mut items) => {
                for (index, item) in items.iter_mut().enumerate() {
                    item.sequence = index as u64;
                }
                items
            }
        };

        let mut queue = Self::new(capacity);
        queue.items = items;
        queue.items.sort_by(|a, b| a.delivery_order(b));
        let dropped = queue.items.len().saturating_sub(queue.capacity);
        queue.items.truncate(queue.capacity);
        queue.next_sequence = queue
            .items
            .iter()
            .map(|item| item.sequence + 1)
            .max()
            .unwrap_or(0);

        Ok((queue, dropped))
    }

    fn insert_sorted(&mut self, item: QueueItem) -> Option<QueueItem> {
        let index = self
            .items
            .partition_point(|existing| existing.delivery_order(&item).is_le());
        self.items.insert(index, item);

        if self.items.len() > self.capacity {
            self.items.pop()
        } else {
            None
        }
    }
}

impl Default for DeliveryQueue {
    fn default() -> Self {
        Self::new(1_000)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
