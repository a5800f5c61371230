//! Tests for queue item types.

use super::*;
use serde_json::json;

#[test]
fn test_item_id_generation() {
    let id1 = ItemId::new();
    let id2 = ItemId::new();
    assert_ne!(id1, id2);
    assert!(!id1.as_str().is_empty());
}

#[test]
fn test_item_id_from_str_rejects_empty() {
    assert!("".parse::<ItemId>().is_err());
    assert!("   ".parse::<ItemId>().is_err());

    let id: ItemId = "abc-123".parse().unwrap();
    assert_eq!(id.as_str(), "abc-123");
    assert_eq!(id.to_string(), "abc-123");
}

#[test]
fn test_new_item_starts_unattempted() {
    let item = QueueItem::new(json!({"event": "page_view"}), Priority::HIGH);

    assert_eq!(item.retry_count, 0);
    assert_eq!(item.priority, Priority::HIGH);
    assert_eq!(item.payload["event"], "page_view");
}

#[test]
fn test_priority_default_and_ordering() {
    assert_eq!(Priority::default(), Priority::NORMAL);
    assert!(Priority::HIGHEST < Priority::HIGH);
    assert!(Priority::HIGH < Priority::LOW);
    assert_eq!(Priority::from(3).value(), 3);
}

#[test]
fn test_delivery_order_uses_priority_then_sequence() {
    let mut urgent = QueueItem::new(json!(1), Priority::new(1));
    urgent.sequence = 10;
    let mut early = QueueItem::new(json!(2), Priority::new(3));
    early.sequence = 1;
    let mut late = QueueItem::new(json!(3), Priority::new(3));
    late.sequence = 2;

    assert_eq!(urgent.delivery_order(&early), Ordering::Less);
    assert_eq!(early.delivery_order(&late), Ordering::Less);
    assert_eq!(late.delivery_order(&early), Ordering::Greater);
}

#[test]
fn test_priority_serializes_as_plain_number() {
    let item = QueueItem::new(json!(null), Priority::new(7));
    let value = serde_json::to_value(&item).unwrap();
    assert_eq!(value["priority"], 7);
    assert_eq!(value["retry_count"], 0);
}
