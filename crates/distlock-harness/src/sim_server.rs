//! In-memory model of the remote lock service.
//!
//! Follows the service's observable behavior closely enough to drive the
//! client end to end:
//!
//! - `connect <sid>` binds the link to session `sid`; `close <sid>` unbinds it
//! - `lock` on a free (or expired) lock acquires it for 120 s, re-locking an
//!   owned lock refreshes it, and a contended lock queues the caller as a
//!   waiter and answers `WAIT`
//! - `unlock` by the owner frees the lock and pushes `RETRY <lock>` to every
//!   waiter still attached
//! - lock actions from a link with no session answer `FAIL`
//! - `mlock`/`munlock` behave as the single-name action applied to each name
//!   in order, one notification per name
//!
//! Undecodable requests are logged and ignored, like the real service.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use distlock_core::LinkEvent;
use distlock_proto::{Notification, Request, Status};
use tokio::sync::mpsc;

use crate::SimEnv;

/// Lock lease granted on acquire or refresh.
pub const LOCK_LEASE: Duration = Duration::from_secs(120);

/// Identifier of one attached link.
pub type LinkId = u64;

/// Server shared between the transport and the test.
pub type SharedSimServer = Arc<Mutex<SimServer>>;

/// Create a server behind a shared handle.
pub fn create_shared_server(env: SimEnv) -> SharedSimServer {
    Arc::new(Mutex::new(SimServer::new(env)))
}

/// Lock the shared server, ignoring poisoning from a panicked test thread.
pub fn lock_server(server: &SharedSimServer) -> std::sync::MutexGuard<'_, SimServer> {
    server.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone)]
struct Lease {
    owner: String,
    expires_at: u64,
}

/// The simulated lock service.
#[derive(Debug)]
pub struct SimServer {
    env: SimEnv,
    next_link: LinkId,
    links: HashMap<LinkId, mpsc::UnboundedSender<LinkEvent>>,
    sessions: HashMap<LinkId, String>,
    session_links: HashMap<String, LinkId>,
    leases: HashMap<String, Lease>,
    waiters: HashMap<String, BTreeSet<String>>,
    received: Vec<(LinkId, String)>,
}

impl SimServer {
    /// Create an empty server using `env` for timestamps and lease expiry.
    pub fn new(env: SimEnv) -> Self {
        Self {
            env,
            next_link: 1,
            links: HashMap::new(),
            sessions: HashMap::new(),
            session_links: HashMap::new(),
            leases: HashMap::new(),
            waiters: HashMap::new(),
            received: Vec::new(),
        }
    }

    /// Attach a link; events for it are pushed to `tx`.
    pub fn attach(&mut self, tx: mpsc::UnboundedSender<LinkEvent>) -> LinkId {
        let id = self.next_link;
        self.next_link += 1;
        self.links.insert(id, tx);
        tracing::debug!(link = id, "link attached");
        id
    }

    /// Detach a link. Its session binding is dropped; its locks are kept
    /// until they expire.
    pub fn detach(&mut self, link: LinkId) {
        self.links.remove(&link);
        if let Some(sid) = self.sessions.remove(&link) {
            if self.session_links.get(&sid) == Some(&link) {
                self.session_links.remove(&sid);
            }
        }
        tracing::debug!(link, "link detached");
    }

    /// Number of attached links.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Every frame received so far, with the link it arrived on.
    pub fn received(&self) -> &[(LinkId, String)] {
        &self.received
    }

    /// Received frames only, in arrival order.
    pub fn received_frames(&self) -> Vec<String> {
        self.received.iter().map(|(_, raw)| raw.clone()).collect()
    }

    /// Session bound to `link`, if any.
    pub fn session(&self, link: LinkId) -> Option<&str> {
        self.sessions.get(&link).map(String::as_str)
    }

    /// Current owner of `lock`, if held and not expired.
    pub fn owner(&self, lock: &str) -> Option<&str> {
        let now = self.env.now_millis();
        self.leases
            .get(lock)
            .filter(|lease| lease.expires_at > now)
            .map(|lease| lease.owner.as_str())
    }

    /// Sessions waiting for `lock`.
    pub fn waiters(&self, lock: &str) -> Vec<String> {
        self.waiters.get(lock).map(|set| set.iter().cloned().collect()).unwrap_or_default()
    }

    /// Push `event` to every link and detach them all.
    pub fn sever_all(&mut self, event: &LinkEvent) {
        let ids: Vec<LinkId> = self.links.keys().copied().collect();
        for id in ids {
            if let Some(tx) = self.links.get(&id) {
                let _ = tx.send(event.clone());
            }
            self.detach(id);
        }
    }

    /// Push a raw frame to every attached link.
    pub fn broadcast(&self, raw: &str) {
        for tx in self.links.values() {
            let _ = tx.send(LinkEvent::Frame(raw.to_string()));
        }
    }

    /// Process one inbound frame from `link`.
    pub fn receive(&mut self, link: LinkId, raw: &str) {
        self.received.push((link, raw.to_string()));

        let request = match Request::decode(raw) {
            Ok(request) => request,
            Err(error) => {
                tracing::error!(%error, frame = raw, "undecodable request");
                return;
            },
        };

        match request {
            Request::Connect { name } => {
                self.sessions.insert(link, name.clone());
                self.session_links.insert(name.clone(), link);
                self.reply(link, Status::Ok, format!("Open session: {name}"));
            },
            Request::Close { name } => {
                self.sessions.remove(&link);
                self.session_links.remove(&name);
                self.reply(link, Status::Ok, format!("Close session: {name}"));
            },
            Request::Lock { name } => self.lock(link, &name),
            Request::Unlock { name } => self.unlock(link, &name),
            Request::MultiLock { names } => {
                for name in names.as_slice() {
                    self.lock(link, name);
                }
            },
            Request::MultiUnlock { names } => {
                for name in names.as_slice() {
                    self.unlock(link, name);
                }
            },
        }
    }

    fn lock(&mut self, link: LinkId, lock: &str) {
        let Some(sid) = self.sessions.get(&link).cloned() else {
            self.reply(link, Status::Fail, "Not sid, connect first".to_string());
            return;
        };

        let expires_at = self.env.now_millis() + LOCK_LEASE.as_millis() as u64;
        match self.owner(lock).map(str::to_owned) {
            None => {
                self.leases.insert(lock.to_string(), Lease { owner: sid, expires_at });
                self.reply(link, Status::Ok, "Acquired".to_string());
            },
            Some(owner) if owner == sid => {
                self.leases.insert(lock.to_string(), Lease { owner, expires_at });
                self.reply(link, Status::Ok, "Already own the lock".to_string());
            },
            Some(owner) => {
                self.waiters.entry(lock.to_string()).or_default().insert(sid);
                self.reply(link, Status::Wait, format!("Lock owned by {owner}"));
            },
        }
    }

    fn unlock(&mut self, link: LinkId, lock: &str) {
        let Some(sid) = self.sessions.get(&link).cloned() else {
            self.reply(link, Status::Fail, "Not sid, connect first".to_string());
            return;
        };

        match self.owner(lock).map(str::to_owned) {
            Some(owner) if owner == sid => {
                self.leases.remove(lock);
                self.reply(link, Status::Ok, format!("Unlocked {lock}"));
                self.notify_waiters(lock);
            },
            owner => {
                let owner = owner.unwrap_or_else(|| "nil".to_string());
                self.reply(link, Status::Fail, format!("lock owned by {owner}"));
            },
        }
    }

    fn notify_waiters(&mut self, lock: &str) {
        let Some(waiting) = self.waiters.remove(lock) else {
            return;
        };

        let mut unreachable = BTreeSet::new();
        for sid in waiting {
            match self.session_links.get(&sid).copied() {
                Some(link) => self.reply(link, Status::Retry, lock.to_string()),
                None => {
                    tracing::debug!(%sid, lock, "waiter not attached");
                    unreachable.insert(sid);
                },
            }
        }

        if !unreachable.is_empty() {
            self.waiters.insert(lock.to_string(), unreachable);
        }
    }

    fn reply(&self, link: LinkId, status: Status, message: String) {
        let Some(tx) = self.links.get(&link) else {
            return;
        };

        let frame = Notification::at_epoch_millis(self.env.now_millis(), status, message)
            .and_then(|notification| notification.encode());
        match frame {
            Ok(raw) => {
                let _ = tx.send(LinkEvent::Frame(raw));
            },
            Err(error) => tracing::error!(%error, "failed to encode notification"),
        }
    }
}
