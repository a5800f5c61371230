//! # Delivery Outcomes
//!
//! Result types describing what happened to a payload: the classified HTTP
//! response of a single attempt ([`TransportResponse`]), the outcome of a
//! `send` call ([`SendOutcome`]) and the per-batch results of a flush
//! ([`BatchOutcome`]).

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::error::TransportError;
use crate::item::ItemId;

/// Message reported when a plugin vetoes a payload
pub const FILTERED_MESSAGE: &str = "Payload filtered by plugin";

// ============================================================================
// Transport Response
// ============================================================================

/// Classified result of one delivery attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransportResponse {
    /// Endpoint accepted the payloads
    Success { data: Option<Value> },

    /// Terminal failure, the payloads must not be retried
    Error {
        status: Option<u16>,
        message: String,
    },

    /// Transient failure, eligible for backoff
    Retry {
        status: Option<u16>,
        message: String,
        #[serde(skip)]
        retry_after: Option<Duration>,
    },
}

impl TransportResponse {
    /// Classify an HTTP status code
    ///
    /// 2xx is success, 429 and 5xx are retryable, any other status is terminal.
    pub fn from_status(status: u16, body: Option<Value>, retry_after: Option<Duration>) -> Self {
        match status {
            200..=299 => Self::Success { data: body },
            429 | 500..=599 => Self::Retry {
                status: Some(status),
                message: Self::describe(status, body.as_ref()),
                retry_after,
            },
            _ => Self::Error {
                status: Some(status),
                message: Self::describe(status, body.as_ref()),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_retry(&self) -> bool {
        matches!(self, Self::Retry { .. })
    }

    /// Server-requested delay before the next attempt, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Retry { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Convert a failed response into the matching error
    pub fn to_error(&self) -> Option<TransportError> {
        match self {
            Self::Success { .. } => None,
            Self::Error {
                status: Some(status),
                message,
            } => Some(TransportError::Rejected {
                status: *status,
                message: message.clone(),
            }),
            Self::Error {
                status: None,
                message,
            } => Some(TransportError::InvalidRequest {
                message: message.clone(),
            }),
            Self::Retry {
                status: Some(status),
                message,
                ..
            } => Some(TransportError::ServerUnavailable {
                status: *status,
                message: message.clone(),
            }),
            Self::Retry {
                status: None,
                message,
                ..
            } => Some(TransportError::ConnectionFailed {
                message: message.clone(),
            }),
        }
    }

    fn describe(status: u16, body: Option<&Value>) -> String {
        let detail = body.and_then(|b| {
            b.get("error")
                .or_else(|| b.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| b.as_str().map(str::to_string))
        });

        match detail {
            Some(detail) => detail,
            None => format!("HTTP {}", status),
        }
    }
}

// ============================================================================
// Send Outcome
// ============================================================================

/// Outcome of [`Transport::send`](crate::Transport::send) and
/// [`Transport::send_batch`](crate::Transport::send_batch)
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Delivered to the endpoint
    Sent { response: Option<Value> },

    /// Stored in the delivery queue for a later attempt
    Queued { item_ids: Vec<ItemId> },

    /// Vetoed by a plugin; nothing was sent or queued
    Filtered { message: String },

    /// Failed permanently
    Failed { error: TransportError },
}

impl SendOutcome {
    pub(crate) fn filtered() -> Self {
        Self::Filtered {
            message: FILTERED_MESSAGE.to_string(),
        }
    }

    /// Sent and filtered outcomes both count as success
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Sent { .. } | Self::Filtered { .. })
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Human-readable status message
    pub fn message(&self) -> String {
        match self {
            Self::Sent { .. } => "Payload sent".to_string(),
            Self::Queued { item_ids } => format!("{} item(s) queued for delivery", item_ids.len()),
            Self::Filtered { message } => message.clone(),
            Self::Failed { error } => error.to_string(),
        }
    }

    pub fn error(&self) -> Option<&TransportError> {
        match self {
            Self::Failed { error } => Some(error),
            _ => None,
        }
    }
}

// ============================================================================
// Batch Outcome
// ============================================================================

/// Result of delivering one batch during a flush
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// Items included in the request
    pub attempted: Vec<ItemId>,

    /// Classified response of the request
    pub response: TransportResponse,

    /// Items put back into the queue for another attempt
    pub requeued: Vec<ItemId>,

    /// Items discarded after a terminal error or exhausted retries
    pub dropped: Vec<ItemId>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.response.is_success()
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
