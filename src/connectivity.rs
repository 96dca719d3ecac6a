//! Outbound network availability check.

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, instrument};

/// Answers whether the device can currently reach the Internet.
///
/// One check per call, no retries.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Returns `true` if outbound network access is available.
    async fn is_online(&self) -> bool;
}

/// Probe that opens (and immediately drops) a TCP connection to a well-known host.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    target: String,
    timeout: Duration,
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new("www.google.com:443", Duration::from_secs(5))
    }
}

impl TcpProbe {
    /// Creates a probe connecting to `target` ("host:port") within `timeout`.
    #[must_use]
    pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target: target.into(),
            timeout,
        }
    }

    /// Returns the probed address.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }
}

#[async_trait]
impl ConnectivityProbe for TcpProbe {
    #[instrument(name = "TcpProbe::is_online", skip(self), fields(target = %self.target))]
    async fn is_online(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(self.target.as_str())).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(error = %e, "Connectivity probe failed");
                false
            }
            Err(_) => {
                debug!(timeout_secs = self.timeout.as_secs(), "Connectivity probe timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_probe_reaches_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let probe = TcpProbe::new(addr.to_string(), Duration::from_secs(1));
        assert!(probe.is_online().await);
    }

    #[tokio::test]
    async fn test_probe_reports_offline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = TcpProbe::new(addr.to_string(), Duration::from_secs(1));
        assert!(!probe.is_online().await);
    }

    #[test]
    fn test_default_target() {
        assert_eq!(TcpProbe::default().target(), "www.google.com:443");
    }
}
