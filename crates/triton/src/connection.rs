//! Connection lifecycle management
//!
//! The connection manager owns the single live [`TritonClient`] handle
//! behind one mutex. Every operation that touches the handle (connect,
//! disconnect, reconfigure, and locking it for an invocation) goes
//! through that mutex, so a reconfiguration can never close or
//! replace the handle while an inference call is using it. The handle is
//! either fully connected or fully absent; no partially-initialized
//! handle is ever observable.

use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info};

use crate::client::{TritonClient, CONNECT_TIMEOUT, REQUEST_TIMEOUT};
use crate::Result;

/// Connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No handle; inference calls are refused
    Disconnected,
    /// A handle is being opened
    Connecting,
    /// A live handle is available
    Connected,
}

/// Guarded slot holding the connection state and the handle
#[derive(Debug)]
pub(crate) struct Slot {
    state: ConnectionState,
    client: Option<TritonClient>,
}

impl Slot {
    /// The live handle, if connected
    pub(crate) fn client(&self) -> Option<&TritonClient> {
        self.client.as_ref()
    }
}

/// Owns the live handle to the remote inference server
#[derive(Debug)]
pub struct ConnectionManager {
    slot: Mutex<Slot>,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl ConnectionManager {
    /// Create a manager in the `Disconnected` state with default timeouts
    pub fn new() -> Self {
        Self::with_timeouts(CONNECT_TIMEOUT, REQUEST_TIMEOUT)
    }

    /// Create a manager with explicit connect and per-call timeouts
    pub fn with_timeouts(connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            slot: Mutex::new(Slot {
                state: ConnectionState::Disconnected,
                client: None,
            }),
            connect_timeout,
            request_timeout,
        }
    }

    /// Open a handle to `address` (`host:port`)
    ///
    /// On failure the manager stays `Disconnected`; the error is logged
    /// and returned so the caller can continue in degraded mode.
    pub async fn connect(&self, address: &str) -> Result<()> {
        let mut slot = self.slot.lock().await;
        self.connect_locked(&mut slot, address).await
    }

    /// Close the handle if one is open; a no-op when already disconnected
    pub async fn disconnect(&self) {
        let mut slot = self.slot.lock().await;
        disconnect_locked(&mut slot);
    }

    /// Close the current handle and open a new one against `address`
    ///
    /// Both halves run under one guard so an in-flight invocation can
    /// never observe the swap; a handle is never reused across an
    /// address change.
    pub async fn reconfigure(&self, address: &str) -> Result<()> {
        let mut slot = self.slot.lock().await;
        disconnect_locked(&mut slot);
        self.connect_locked(&mut slot, address).await
    }

    /// Current lifecycle state
    pub async fn state(&self) -> ConnectionState {
        self.slot.lock().await.state
    }

    /// Whether inference calls may be issued right now
    pub async fn is_ready(&self) -> bool {
        self.state().await == ConnectionState::Connected
    }

    /// Lock the slot for the duration of an invocation
    pub(crate) async fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().await
    }

    async fn connect_locked(&self, slot: &mut Slot, address: &str) -> Result<()> {
        slot.state = ConnectionState::Connecting;
        match TritonClient::connect_with_timeouts(
            address,
            self.connect_timeout,
            self.request_timeout,
        )
        .await
        {
            Ok(client) => {
                slot.client = Some(client);
                slot.state = ConnectionState::Connected;
                info!("connected to inference server {}", address);
                Ok(())
            }
            Err(e) => {
                slot.client = None;
                slot.state = ConnectionState::Disconnected;
                error!("cannot connect to inference server {}: {}", address, e);
                Err(e)
            }
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

fn disconnect_locked(slot: &mut Slot) {
    if let Some(client) = slot.client.take() {
        debug!("closing connection to inference server {}", client.address());
        drop(client);
    }
    slot.state = ConnectionState::Disconnected;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_starts_disconnected() {
        let manager = ConnectionManager::new();
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
        assert!(!manager.is_ready().await);
    }

    #[tokio::test]
    async fn test_connect_failure_stays_disconnected() {
        let manager = ConnectionManager::new();
        // nothing listens on port 1
        let result = manager.connect("127.0.0.1:1").await;
        assert!(result.is_err());
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
        assert!(manager.slot().await.client().is_none());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let manager = ConnectionManager::new();
        manager.disconnect().await;
        manager.disconnect().await;
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_reconfigure_to_unreachable_address() {
        let manager = ConnectionManager::new();
        assert!(manager.reconfigure("127.0.0.1:1").await.is_err());
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
    }
}
