//! Service endpoint addressing.
//!
//! The lock service lives at `<base>/lock`. Every transport opens it with
//! the same handshake query, differing only in the advertised transport and,
//! for WebSocket, the URL scheme.

use std::time::Duration;

use distlock_core::{TransportError, TransportKind};
use url::Url;

/// Resource path of the lock service, relative to the base URL.
pub const LOCK_PATH: &str = "lock";

/// Query parameter and response header carrying the session tracking id.
pub const TRACKING_ID: &str = "X-Atmosphere-tracking-id";

/// Framework version advertised in the handshake.
const FRAMEWORK_VERSION: &str = "1.0";

/// Configuration shared by the production links.
///
/// The content type comes from the channel's
/// [`distlock_core::ConnectionConfig`].
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Base URL of the hosting application, e.g. `http://host:8080/distlock/`.
    pub base_url: String,
    /// How long a single long-poll request may be held open.
    pub poll_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/distlock/".to_string(),
            poll_timeout: Duration::from_secs(30),
        }
    }
}

/// Build the lock endpoint for `kind`.
///
/// # Errors
///
/// `InvalidEndpoint` if `base_url` does not parse or is not `http(s)`.
pub fn endpoint(base_url: &str, kind: TransportKind, content_type: &str) -> Result<Url, TransportError> {
    let mut base = Url::parse(base_url)
        .map_err(|e| TransportError::InvalidEndpoint { reason: format!("{base_url}: {e}") })?;

    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    let mut url = base
        .join(LOCK_PATH)
        .map_err(|e| TransportError::InvalidEndpoint { reason: e.to_string() })?;

    let scheme = match (kind, url.scheme()) {
        (TransportKind::WebSocket, "http") => "ws",
        (TransportKind::WebSocket, "https") => "wss",
        (TransportKind::LongPolling, scheme @ ("http" | "https")) => scheme,
        (_, other) => {
            return Err(TransportError::InvalidEndpoint {
                reason: format!("unsupported scheme {other:?}, expected http or https"),
            });
        },
    }
    .to_string();

    url.set_scheme(&scheme).map_err(|()| TransportError::InvalidEndpoint {
        reason: format!("cannot switch {url} to {scheme}"),
    })?;

    url.query_pairs_mut()
        .clear()
        .append_pair(TRACKING_ID, "0")
        .append_pair("X-Atmosphere-Framework", FRAMEWORK_VERSION)
        .append_pair("X-Atmosphere-Transport", kind.as_str())
        .append_pair("X-Cache-Date", "0")
        .append_pair("Content-Type", content_type);

    Ok(url)
}

/// `url` with its tracking id replaced by the one the service assigned.
pub fn with_tracking_id(url: &Url, tracking_id: &str) -> Url {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| {
            let value = if key == TRACKING_ID { tracking_id.to_string() } else { value.into_owned() };
            (key.into_owned(), value)
        })
        .collect();

    let mut url = url.clone();
    url.query_pairs_mut().clear().extend_pairs(pairs);
    url
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn websocket_endpoint_switches_scheme() {
        let url = endpoint("http://host:8080/distlock/", TransportKind::WebSocket, "application/json")
            .unwrap();
        assert_eq!(url.scheme(), "ws");
        assert_eq!(url.path(), "/distlock/lock");
        assert_eq!(
            url.query(),
            Some(
                "X-Atmosphere-tracking-id=0&X-Atmosphere-Framework=1.0\
                 &X-Atmosphere-Transport=websocket&X-Cache-Date=0\
                 &Content-Type=application%2Fjson"
            )
        );
    }

    #[test]
    fn secure_base_maps_to_wss() {
        let url = endpoint("https://host/app/", TransportKind::WebSocket, "application/json").unwrap();
        assert_eq!(url.scheme(), "wss");
    }

    #[test]
    fn long_polling_keeps_http() {
        let url = endpoint("http://host/app", TransportKind::LongPolling, "application/json").unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.path(), "/app/lock");
        assert!(url.query().unwrap().contains("X-Atmosphere-Transport=long-polling"));
    }

    #[test]
    fn tracking_id_replaces_handshake_placeholder() {
        let url = endpoint("http://host/app/", TransportKind::LongPolling, "application/json").unwrap();

        let tracked = with_tracking_id(&url, "5f6e-77");

        let query = tracked.query().unwrap();
        assert!(query.starts_with("X-Atmosphere-tracking-id=5f6e-77&"));
        assert!(query.contains("X-Atmosphere-Transport=long-polling"));
        assert_eq!(tracked.path(), url.path());
    }

    #[test]
    fn rejects_unusable_base() {
        assert!(matches!(
            endpoint("not a url", TransportKind::WebSocket, "application/json"),
            Err(TransportError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            endpoint("ftp://host/", TransportKind::LongPolling, "application/json"),
            Err(TransportError::InvalidEndpoint { .. })
        ));
    }
}
