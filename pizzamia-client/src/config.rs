//! Channel configuration and endpoint addressing

use crate::error::{TransportError, TransportResult};
use shared::Frame;
use std::time::Duration;
use tokio::sync::broadcast;

/// Reconnection policy of the order-state channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Delay before the first connect retry
    pub retry_delay: Duration,
    /// Exponential backoff cap
    pub max_retry_delay: Duration,
    /// Maximum connect attempts (0 means retry forever)
    pub max_retry_attempts: u32,
    /// Liveness probe interval used by the connection supervisor
    pub probe_interval: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(5), // first retry after 5s
            max_retry_delay: Duration::from_secs(60), // backoff cap
            max_retry_attempts: 0,               // retry forever
            probe_interval: Duration::from_secs(5), // supervisor probe
        }
    }
}

impl ChannelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = delay;
        self
    }

    /// Set the connect attempt limit (0 means retry forever).
    pub fn with_max_retry_attempts(mut self, attempts: u32) -> Self {
        self.max_retry_attempts = attempts;
        self
    }

    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    /// Backoff step: double the current delay up to the cap.
    pub(crate) fn next_delay(&self, actual: Duration) -> Duration {
        (actual * 2).min(self.max_retry_delay)
    }
}

/// Broker endpoint.
///
/// Network endpoints parse from URL strings supplied by deployment
/// configuration; the memory endpoint wires a client directly to an
/// in-process broker through broadcast channels.
#[derive(Debug, Clone)]
pub enum Endpoint {
    /// Plain TCP, `tcp://host:port`
    Tcp(String),
    /// TLS with server authentication, `tls://host:port`
    Tls { addr: String, domain: String },
    /// In-process loopback
    Memory {
        to_broker: broadcast::Sender<Frame>,
        from_broker: broadcast::Sender<Frame>,
    },
}

impl Endpoint {
    /// Parse a `tcp://host:port` or `tls://host:port` URL.
    pub fn parse(url: &str) -> TransportResult<Self> {
        if let Some(addr) = url.strip_prefix("tcp://") {
            if addr.is_empty() {
                return Err(TransportError::Connection(format!(
                    "missing address in endpoint url: {url}"
                )));
            }
            return Ok(Endpoint::Tcp(addr.to_string()));
        }

        if let Some(addr) = url.strip_prefix("tls://") {
            let domain = addr.rsplit_once(':').map(|(host, _)| host).unwrap_or(addr);
            if domain.is_empty() {
                return Err(TransportError::Connection(format!(
                    "missing host in endpoint url: {url}"
                )));
            }
            return Ok(Endpoint::Tls {
                addr: addr.to_string(),
                domain: domain.to_string(),
            });
        }

        Err(TransportError::Connection(format!(
            "unsupported endpoint url: {url}"
        )))
    }

    pub fn memory(
        to_broker: &broadcast::Sender<Frame>,
        from_broker: &broadcast::Sender<Frame>,
    ) -> Self {
        Endpoint::Memory {
            to_broker: to_broker.clone(),
            from_broker: from_broker.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ChannelConfig::default();
        assert_eq!(config.retry_delay, Duration::from_secs(5));
        assert_eq!(config.max_retry_delay, Duration::from_secs(60));
        assert_eq!(config.max_retry_attempts, 0); // retry forever
        assert_eq!(config.probe_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_config_builder() {
        let config = ChannelConfig::new()
            .with_retry_delay(Duration::from_millis(100))
            .with_max_retry_attempts(3);

        assert_eq!(config.retry_delay, Duration::from_millis(100));
        assert_eq!(config.max_retry_attempts, 3);
    }

    #[test]
    fn test_next_delay_dobla_hasta_el_tope() {
        let config = ChannelConfig::new()
            .with_retry_delay(Duration::from_secs(5))
            .with_max_retry_delay(Duration::from_secs(12));

        let d1 = config.next_delay(config.retry_delay);
        let d2 = config.next_delay(d1);
        let d3 = config.next_delay(d2);

        assert_eq!(d1, Duration::from_secs(10));
        assert_eq!(d2, Duration::from_secs(12)); // capped
        assert_eq!(d3, Duration::from_secs(12));
    }

    #[test]
    fn test_endpoint_parse_tcp() {
        match Endpoint::parse("tcp://192.168.0.10:9040").unwrap() {
            Endpoint::Tcp(addr) => assert_eq!(addr, "192.168.0.10:9040"),
            otro => panic!("unexpected endpoint: {otro:?}"),
        }
    }

    #[test]
    fn test_endpoint_parse_tls_extrae_dominio() {
        match Endpoint::parse("tls://broker.pizzamia.com:9041").unwrap() {
            Endpoint::Tls { addr, domain } => {
                assert_eq!(addr, "broker.pizzamia.com:9041");
                assert_eq!(domain, "broker.pizzamia.com");
            }
            otro => panic!("unexpected endpoint: {otro:?}"),
        }
    }

    #[test]
    fn test_endpoint_parse_rechaza_esquemas_desconocidos() {
        assert!(Endpoint::parse("http://localhost:8080/pizzamia-websocket").is_err());
        assert!(Endpoint::parse("tcp://").is_err());
        assert!(Endpoint::parse("localhost:9040").is_err());
    }
}
