//! Production transports.
//!
//! [`NetTransport`] opens links to the lock service over WebSocket or HTTP
//! long-polling, whichever the connection state machine asks for. Which
//! transport is tried first, and whether to fall back, is decided by
//! [`distlock_core::Connection`], not here.

mod endpoint;
mod long_poll;
mod websocket;

use async_trait::async_trait;
use distlock_core::{
    ConnectionConfig, Link, LinkEvent, Transport, TransportError, TransportKind,
};
pub use endpoint::{LOCK_PATH, LinkConfig, TRACKING_ID, endpoint, with_tracking_id};
pub use long_poll::LongPollLink;
pub use websocket::WebSocketLink;

/// Link produced by [`NetTransport`].
pub enum NetLink {
    /// WebSocket link.
    WebSocket(WebSocketLink),
    /// Long-polling link.
    LongPolling(LongPollLink),
}

#[async_trait]
impl Link for NetLink {
    async fn send(&mut self, raw: String) -> Result<(), TransportError> {
        match self {
            Self::WebSocket(link) => link.send(raw).await,
            Self::LongPolling(link) => link.send(raw).await,
        }
    }

    async fn recv(&mut self) -> Option<LinkEvent> {
        match self {
            Self::WebSocket(link) => link.recv().await,
            Self::LongPolling(link) => link.recv().await,
        }
    }

    async fn close(&mut self) {
        match self {
            Self::WebSocket(link) => link.close().await,
            Self::LongPolling(link) => link.close().await,
        }
    }
}

/// Network transport to one lock service endpoint.
pub struct NetTransport {
    config: LinkConfig,
    content_type: String,
    http: reqwest::Client,
}

impl NetTransport {
    /// Create a transport for `config.base_url`, announcing the content type
    /// of `channel`.
    ///
    /// # Errors
    ///
    /// `InvalidEndpoint` if the base URL is unusable or the HTTP client
    /// cannot be built.
    pub fn new(config: LinkConfig, channel: &ConnectionConfig) -> Result<Self, TransportError> {
        let content_type = channel.content_type.clone();
        endpoint(&config.base_url, TransportKind::LongPolling, &content_type)?;

        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| TransportError::InvalidEndpoint { reason: e.to_string() })?;

        Ok(Self { config, content_type, http })
    }

    /// Link configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }
}

#[async_trait]
impl Transport for NetTransport {
    type Link = NetLink;

    async fn connect(&self, kind: TransportKind) -> Result<NetLink, TransportError> {
        let url = endpoint(&self.config.base_url, kind, &self.content_type)?;
        tracing::info!(transport = %kind, %url, "connecting");

        match kind {
            TransportKind::WebSocket => WebSocketLink::connect(&url).await.map(NetLink::WebSocket),
            TransportKind::LongPolling => LongPollLink::connect(
                self.http.clone(),
                url,
                self.content_type.clone(),
                self.config.poll_timeout,
            )
            .await
            .map(NetLink::LongPolling),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_base_url_up_front() {
        let config = LinkConfig { base_url: "::".into(), ..LinkConfig::default() };
        let channel = ConnectionConfig::default();
        assert!(matches!(
            NetTransport::new(config, &channel),
            Err(TransportError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn content_type_follows_channel_config() {
        let channel =
            ConnectionConfig { content_type: "text/plain".into(), ..ConnectionConfig::default() };
        let transport = NetTransport::new(LinkConfig::default(), &channel).unwrap();
        assert_eq!(transport.content_type, "text/plain");
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        // Port 9 (discard) on localhost is closed in test environments.
        let config =
            LinkConfig { base_url: "http://127.0.0.1:9/distlock/".into(), ..LinkConfig::default() };
        let transport = NetTransport::new(config, &ConnectionConfig::default()).unwrap();

        for kind in [TransportKind::WebSocket, TransportKind::LongPolling] {
            let result = transport.connect(kind).await;
            assert!(
                matches!(result, Err(TransportError::Unavailable { transport, .. }) if transport == kind),
                "{kind}"
            );
        }
    }
}
