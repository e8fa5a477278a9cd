//! In-memory transport with fault injection.
//!
//! Links deliver frames straight into the [`SimServer`] and receive its
//! replies over unbounded channels, so every reply is ready by the time the
//! send returns. Faults are switched on through the shared handle:
//!
//! - a transport kind can be made unavailable (negotiation fails)
//! - the next `n` connects can be made to fail (reconnect exhaustion)
//! - sends on open links can be made to fail
//! - all links can be dropped (transient loss) or closed by the service

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use distlock_core::{Link, LinkEvent, Transport, TransportError, TransportKind};
use tokio::sync::mpsc;

use crate::sim_server::{LinkId, SharedSimServer, lock_server};

#[derive(Debug, Default)]
struct Faults {
    unavailable: HashSet<TransportKind>,
    failing_connects: u32,
    failing_sends: bool,
    connects: Vec<TransportKind>,
}

/// Transport whose links terminate in a [`crate::SimServer`].
#[derive(Debug, Clone)]
pub struct SimTransport {
    server: SharedSimServer,
    faults: Arc<Mutex<Faults>>,
}

impl SimTransport {
    /// Create a transport connected to `server`.
    pub fn new(server: SharedSimServer) -> Self {
        Self { server, faults: Arc::new(Mutex::new(Faults::default())) }
    }

    /// The server behind this transport.
    pub fn server(&self) -> &SharedSimServer {
        &self.server
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `kind` fail negotiation (or succeed again).
    pub fn set_unavailable(&self, kind: TransportKind, unavailable: bool) {
        let mut faults = self.faults();
        if unavailable {
            faults.unavailable.insert(kind);
        } else {
            faults.unavailable.remove(&kind);
        }
    }

    /// Fail the next `count` connect attempts regardless of kind.
    pub fn fail_next_connects(&self, count: u32) {
        self.faults().failing_connects = count;
    }

    /// Make every send on an open link fail (or succeed again).
    pub fn fail_sends(&self, failing: bool) {
        self.faults().failing_sends = failing;
    }

    /// Every connect attempt so far, in order.
    pub fn connect_attempts(&self) -> Vec<TransportKind> {
        self.faults().connects.clone()
    }

    /// Break every link as a transient loss.
    pub fn drop_links(&self) {
        lock_server(&self.server).sever_all(&LinkEvent::Lost("simulated link drop".to_string()));
    }

    /// Close every link from the service side.
    pub fn close_links(&self) {
        lock_server(&self.server).sever_all(&LinkEvent::Closed);
    }

    /// Push a raw frame to every link.
    pub fn inject_frame(&self, raw: &str) {
        lock_server(&self.server).broadcast(raw);
    }
}

#[async_trait]
impl Transport for SimTransport {
    type Link = SimLink;

    async fn connect(&self, kind: TransportKind) -> Result<SimLink, TransportError> {
        {
            let mut faults = self.faults();
            faults.connects.push(kind);

            if faults.unavailable.contains(&kind) {
                return Err(TransportError::Unavailable {
                    transport: kind,
                    reason: "simulated negotiation failure".to_string(),
                });
            }
            if faults.failing_connects > 0 {
                faults.failing_connects -= 1;
                return Err(TransportError::Unavailable {
                    transport: kind,
                    reason: "simulated connect failure".to_string(),
                });
            }
        }

        let (tx, inbound) = mpsc::unbounded_channel();
        let id = lock_server(&self.server).attach(tx);
        tracing::debug!(link = id, transport = %kind, "sim link open");

        Ok(SimLink {
            id,
            server: self.server.clone(),
            faults: Arc::clone(&self.faults),
            inbound,
            closed: false,
        })
    }
}

/// Link into the simulated server.
#[derive(Debug)]
pub struct SimLink {
    id: LinkId,
    server: SharedSimServer,
    faults: Arc<Mutex<Faults>>,
    inbound: mpsc::UnboundedReceiver<LinkEvent>,
    closed: bool,
}

impl SimLink {
    /// Server-side identifier of this link.
    pub fn id(&self) -> LinkId {
        self.id
    }
}

#[async_trait]
impl Link for SimLink {
    async fn send(&mut self, raw: String) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if self.faults.lock().unwrap_or_else(PoisonError::into_inner).failing_sends {
            return Err(TransportError::Send { reason: "simulated send failure".to_string() });
        }
        lock_server(&self.server).receive(self.id, &raw);
        Ok(())
    }

    async fn recv(&mut self) -> Option<LinkEvent> {
        self.inbound.recv().await
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            lock_server(&self.server).detach(self.id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{SimEnv, create_shared_server};

    #[tokio::test]
    async fn unavailable_kind_fails_negotiation() {
        let transport = SimTransport::new(create_shared_server(SimEnv::new()));
        transport.set_unavailable(TransportKind::WebSocket, true);

        let result = transport.connect(TransportKind::WebSocket).await;
        assert!(matches!(result, Err(TransportError::Unavailable { .. })));
        assert!(transport.connect(TransportKind::LongPolling).await.is_ok());
        assert_eq!(transport.connect_attempts(), [
            TransportKind::WebSocket,
            TransportKind::LongPolling
        ]);
    }

    #[tokio::test]
    async fn replies_are_ready_after_send() {
        let transport = SimTransport::new(create_shared_server(SimEnv::new()));
        let mut link = transport.connect(TransportKind::WebSocket).await.unwrap();

        link.send(r#"{"action":"connect","params":["alice"]}"#.into()).await.unwrap();

        let Some(LinkEvent::Frame(raw)) = link.recv().await else {
            unreachable!("expected a reply frame");
        };
        assert!(raw.contains("Open session: alice"));
    }

    #[tokio::test]
    async fn closed_link_refuses_sends() {
        let transport = SimTransport::new(create_shared_server(SimEnv::new()));
        let mut link = transport.connect(TransportKind::WebSocket).await.unwrap();

        link.close().await;

        assert!(matches!(link.send("x".into()).await, Err(TransportError::Closed)));
        assert_eq!(lock_server(transport.server()).link_count(), 0);
    }

    #[tokio::test]
    async fn failing_sends_never_reach_the_server() {
        let transport = SimTransport::new(create_shared_server(SimEnv::new()));
        let mut link = transport.connect(TransportKind::WebSocket).await.unwrap();

        transport.fail_sends(true);
        let result = link.send(r#"{"action":"connect","params":["alice"]}"#.into()).await;

        assert!(matches!(result, Err(TransportError::Send { .. })));
        assert!(lock_server(transport.server()).received_frames().is_empty());
    }

    #[tokio::test]
    async fn drop_links_reports_loss() {
        let transport = SimTransport::new(create_shared_server(SimEnv::new()));
        let mut link = transport.connect(TransportKind::WebSocket).await.unwrap();

        transport.drop_links();

        assert!(matches!(link.recv().await, Some(LinkEvent::Lost(_))));
    }
}
