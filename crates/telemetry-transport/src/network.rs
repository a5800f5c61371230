//! Connectivity observation.
//!
//! The host publishes connectivity changes through a [`NetworkMonitor`]; the
//! transport subscribes and reacts to transitions. Publishing the state it
//! already holds does not wake subscribers.

use tokio::sync::watch;
use tracing::info;

/// Current connectivity as last reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Online,
    Offline,
}

impl NetworkStatus {
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }
}

impl From<bool> for NetworkStatus {
    fn from(online: bool) -> Self {
        if online {
            Self::Online
        } else {
            Self::Offline
        }
    }
}

/// Publisher of connectivity transitions
///
/// Cloning yields another handle to the same state.
///
/// # Examples
///
/// ```
/// use telemetry_transport::network::{NetworkMonitor, NetworkStatus};
///
/// let monitor = NetworkMonitor::new(true);
/// let mut watcher = monitor.subscribe();
///
/// monitor.set_online(false);
/// assert_eq!(*watcher.borrow_and_update(), NetworkStatus::Offline);
/// ```
#[derive(Debug, Clone)]
pub struct NetworkMonitor {
    sender: watch::Sender<NetworkStatus>,
}

impl NetworkMonitor {
    /// Create a monitor with an initial connectivity state
    pub fn new(online: bool) -> Self {
        let (sender, _) = watch::channel(NetworkStatus::from(online));
        Self { sender }
    }

    /// Report the current connectivity
    ///
    /// Returns `true` if the state changed.
    pub fn set_online(&self, online: bool) -> bool {
        let status = NetworkStatus::from(online);
        let changed = self.sender.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });

        if changed {
            info!(status = ?status, "Network connectivity changed");
        }
        changed
    }

    pub fn status(&self) -> NetworkStatus {
        *self.sender.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.status().is_online()
    }

    /// Receiver that is notified on every transition
    pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.sender.subscribe()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
#[path = "network_tests.rs"]
mod tests;
