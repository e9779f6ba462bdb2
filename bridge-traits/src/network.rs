//! Connectivity probe used while a remote stream is playing.

use crate::error::Result;

/// How the device reaches the network, when the platform can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkType {
    Cellular,
    WiFi,
    Ethernet,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Connected,
    Disconnected,
    /// The platform could not decide. Treated as offline.
    Indeterminate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub status: NetworkStatus,
    pub network_type: Option<NetworkType>,
}

impl NetworkInfo {
    pub fn online(network_type: NetworkType) -> Self {
        Self {
            status: NetworkStatus::Connected,
            network_type: Some(network_type),
        }
    }

    pub fn offline() -> Self {
        Self {
            status: NetworkStatus::Disconnected,
            network_type: None,
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == NetworkStatus::Connected
    }
}

/// Reachability as seen by the host platform.
///
/// Polled, never pushed: the continuity guard asks whether the device is
/// online when a remote stream stops advancing, so it can tell a dropped
/// connection apart from a renderer that is merely buffering.
///
/// Desktop probes a well-known TCP endpoint; Android and iOS adapters wrap
/// ConnectivityManager and NWPathMonitor.
#[async_trait::async_trait]
pub trait NetworkMonitor: Send + Sync {
    async fn get_network_info(&self) -> Result<NetworkInfo>;

    /// Probe failures count as offline.
    async fn is_connected(&self) -> bool {
        self.get_network_info()
            .await
            .map(|info| info.is_online())
            .unwrap_or(false)
    }
}
