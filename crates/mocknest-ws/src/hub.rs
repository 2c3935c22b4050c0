//! Broadcast fan-out and connection accounting

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// Named fan-out channels shared by broadcast-mode connections and the
/// control plane
#[derive(Debug, Default)]
pub struct BroadcastHub {
    channels: RwLock<HashMap<String, broadcast::Sender<String>>>,
}

impl BroadcastHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `channel`, creating it on first use
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<String> {
        if let Some(sender) = self.channels.read().get(channel) {
            return sender.subscribe();
        }
        let mut channels = self.channels.write();
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Emit `message` to every subscriber of `channel`. Returns how many
    /// subscribers received it.
    pub fn publish(&self, channel: &str, message: String) -> usize {
        match self.channels.read().get(channel) {
            Some(sender) => sender.send(message).unwrap_or(0),
            None => 0,
        }
    }

    /// Names of channels that currently exist
    pub fn channels(&self) -> Vec<String> {
        self.channels.read().keys().cloned().collect()
    }
}

/// Live-connection counts per mock, enforcing `max_connections`
#[derive(Debug, Default)]
pub struct ConnectionGauge {
    active: Mutex<HashMap<String, usize>>,
}

impl ConnectionGauge {
    /// Create an empty gauge
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a slot for `mock`. Returns `None` when `max` (non-zero)
    /// connections are already live; the permit releases the slot on drop.
    pub fn try_acquire(self: &Arc<Self>, mock: &str, max: usize) -> Option<ConnectionPermit> {
        let mut active = self.active.lock();
        let slot = active.entry(mock.to_string()).or_insert(0);
        if max > 0 && *slot >= max {
            return None;
        }
        *slot += 1;
        Some(ConnectionPermit {
            gauge: self.clone(),
            mock: mock.to_string(),
        })
    }

    /// Current live connections for `mock`
    pub fn active(&self, mock: &str) -> usize {
        self.active.lock().get(mock).copied().unwrap_or(0)
    }

    fn release(&self, mock: &str) {
        let mut active = self.active.lock();
        if let Some(slot) = active.get_mut(mock) {
            *slot = slot.saturating_sub(1);
        }
    }
}

/// RAII handle for one reserved connection slot
#[derive(Debug)]
pub struct ConnectionPermit {
    gauge: Arc<ConnectionGauge>,
    mock: String,
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        self.gauge.release(&self.mock);
    }
}
