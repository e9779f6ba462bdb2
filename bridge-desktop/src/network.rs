//! TCP reachability probe standing in for the platform connectivity API.

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{NetworkInfo, NetworkMonitor, NetworkType},
};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

/// Public DNS resolvers, tried in order.
const DEFAULT_PROBES: &[&str] = &["1.1.1.1:53", "8.8.8.8:53"];
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Connectivity for desktop hosts.
///
/// The device is online when any probe endpoint accepts a TCP connection
/// within the timeout. The continuity guard only asks while a remote
/// stream is stalled, so probes are rare.
pub struct DesktopNetworkMonitor {
    probes: Vec<String>,
    probe_timeout: Duration,
    last: Mutex<Option<NetworkInfo>>,
}

impl DesktopNetworkMonitor {
    pub fn new() -> Self {
        Self {
            probes: DEFAULT_PROBES.iter().map(|addr| addr.to_string()).collect(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            last: Mutex::new(None),
        }
    }

    /// Probe a single `host:port` instead of the defaults.
    pub fn with_probe(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            probes: vec![addr.into()],
            probe_timeout: timeout,
            last: Mutex::new(None),
        }
    }

    pub async fn last_info(&self) -> Option<NetworkInfo> {
        self.last.lock().await.clone()
    }

    async fn reachable(&self, addr: &str) -> bool {
        matches!(
            tokio::time::timeout(self.probe_timeout, TcpStream::connect(addr)).await,
            Ok(Ok(_))
        )
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        let mut info = NetworkInfo::offline();
        for addr in &self.probes {
            if self.reachable(addr).await {
                // A TCP probe cannot tell wired from wireless.
                info = NetworkInfo::online(NetworkType::Other);
                break;
            }
            debug!(probe = %addr, "Probe unreachable");
        }

        debug!(online = info.is_online(), "Connectivity probed");
        *self.last.lock().await = Some(info.clone());
        Ok(info)
    }
}
