//! HTTP long-polling link.
//!
//! Inbound frames arrive on held `GET` requests: `200` carries one frame,
//! `204` means the hold expired with nothing to deliver, `410` means the
//! service ended the session. Outbound frames are `POST`ed to the same
//! endpoint, and a reply written to the `POST` response is delivered like
//! any other frame.
//!
//! The service assigns a tracking id on the first poll. Every later request
//! carries it, which is what ties the requests to one service session.

use std::{collections::VecDeque, time::Duration};

use async_trait::async_trait;
use distlock_core::{Link, LinkEvent, TransportError, TransportKind};
use reqwest::{StatusCode, header::CONTENT_TYPE};
use tokio::{sync::mpsc, task::JoinHandle};
use url::Url;

use crate::transport::endpoint::{TRACKING_ID, with_tracking_id};

const INBOUND_CAPACITY: usize = 64;

/// Outcome of a single poll.
enum Poll {
    Frame(String),
    Empty,
    Gone,
}

/// Established long-polling link.
pub struct LongPollLink {
    http: reqwest::Client,
    url: Url,
    content_type: String,
    /// Frames that arrived outside the poll loop (handshake, `POST` replies).
    replies: VecDeque<LinkEvent>,
    inbound: mpsc::Receiver<LinkEvent>,
    poller: JoinHandle<()>,
    closed: bool,
}

impl LongPollLink {
    /// Open the link with an initial poll.
    ///
    /// The service counts as reachable once the first poll returns a success
    /// status; any frame it carries is delivered first.
    ///
    /// # Errors
    ///
    /// `Unavailable` if the first poll fails.
    pub async fn connect(
        http: reqwest::Client,
        url: Url,
        content_type: String,
        poll_timeout: Duration,
    ) -> Result<Self, TransportError> {
        tracing::debug!(%url, "long-polling handshake");

        let (first, tracking_id) = poll(&http, &url, poll_timeout).await.map_err(|reason| {
            TransportError::Unavailable { transport: TransportKind::LongPolling, reason }
        })?;

        let mut replies = VecDeque::new();
        match first {
            Poll::Frame(frame) => replies.push_back(LinkEvent::Frame(frame)),
            Poll::Gone => {
                return Err(TransportError::Unavailable {
                    transport: TransportKind::LongPolling,
                    reason: "session gone".to_string(),
                });
            },
            Poll::Empty => {},
        }

        let url = match tracking_id {
            Some(id) => {
                tracing::debug!(tracking_id = %id, "tracking id assigned");
                with_tracking_id(&url, &id)
            },
            None => {
                tracing::warn!("service assigned no tracking id");
                url
            },
        };

        let (tx, inbound) = mpsc::channel(INBOUND_CAPACITY);
        let poller = tokio::spawn(poll_loop(http.clone(), url.clone(), poll_timeout, tx));

        Ok(Self { http, url, content_type, replies, inbound, poller, closed: false })
    }
}

/// One held `GET`, with the tracking id the service put on the response.
async fn poll(
    http: &reqwest::Client,
    url: &Url,
    timeout: Duration,
) -> Result<(Poll, Option<String>), String> {
    let response = match http.get(url.clone()).timeout(timeout).send().await {
        Ok(response) => response,
        Err(e) if e.is_timeout() => return Ok((Poll::Empty, None)),
        Err(e) => return Err(e.to_string()),
    };

    let tracking_id = response
        .headers()
        .get(TRACKING_ID)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && *id != "0")
        .map(str::to_string);

    let outcome = match response.status() {
        StatusCode::OK => {
            let body = response.text().await.map_err(|e| e.to_string())?;
            if body.trim().is_empty() { Poll::Empty } else { Poll::Frame(body) }
        },
        StatusCode::NO_CONTENT => Poll::Empty,
        StatusCode::GONE => Poll::Gone,
        other => return Err(format!("unexpected status {other}")),
    };
    Ok((outcome, tracking_id))
}

async fn poll_loop(
    http: reqwest::Client,
    url: Url,
    timeout: Duration,
    tx: mpsc::Sender<LinkEvent>,
) {
    loop {
        let event = match poll(&http, &url, timeout).await {
            Ok((Poll::Frame(frame), _)) => LinkEvent::Frame(frame),
            Ok((Poll::Empty, _)) => continue,
            Ok((Poll::Gone, _)) => {
                let _ = tx.send(LinkEvent::Closed).await;
                return;
            },
            Err(reason) => {
                let _ = tx.send(LinkEvent::Lost(reason)).await;
                return;
            },
        };

        if tx.send(event).await.is_err() {
            return;
        }
    }
}

#[async_trait]
impl Link for LongPollLink {
    async fn send(&mut self, raw: String) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        let response = self
            .http
            .post(self.url.clone())
            .header(CONTENT_TYPE, self.content_type.as_str())
            .body(raw)
            .send()
            .await
            .map_err(|e| TransportError::Send { reason: e.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Send { reason: format!("status {status}") });
        }

        let body = response.text().await.map_err(|e| TransportError::Send { reason: e.to_string() })?;
        if !body.trim().is_empty() {
            self.replies.push_back(LinkEvent::Frame(body));
        }
        Ok(())
    }

    async fn recv(&mut self) -> Option<LinkEvent> {
        if let Some(event) = self.replies.pop_front() {
            return Some(event);
        }
        self.inbound.recv().await
    }

    async fn close(&mut self) {
        self.closed = true;
        self.poller.abort();
    }
}

impl Drop for LongPollLink {
    fn drop(&mut self) {
        self.poller.abort();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
    };

    use super::*;
    use crate::transport::endpoint::endpoint;

    const FRAME: &str = r#"{"time":1000,"status":"OK","message":"Acquired"}"#;

    /// Canned reply for one request.
    #[derive(Debug, Clone)]
    enum Reply {
        Raw(String),
        /// Keep the request open and never answer.
        Hold,
    }

    fn reply(status: &str, headers: &[(&str, &str)], body: &str) -> Reply {
        let mut raw = format!("HTTP/1.1 {status}\r\nConnection: close\r\n");
        if !status.starts_with("204") {
            raw.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
        for (name, value) in headers {
            raw.push_str(&format!("{name}: {value}\r\n"));
        }
        raw.push_str("\r\n");
        raw.push_str(body);
        Reply::Raw(raw)
    }

    /// Requests beyond the script are held.
    #[derive(Debug, Default)]
    struct Script {
        gets: VecDeque<Reply>,
        posts: VecDeque<Reply>,
        /// Request head and body, in arrival order.
        seen: Vec<(String, String)>,
    }

    impl Script {
        fn heads(&self, method: &str) -> Vec<String> {
            self.seen
                .iter()
                .filter(|(head, _)| head.starts_with(method))
                .map(|(head, _)| head.clone())
                .collect()
        }
    }

    async fn serve(gets: Vec<Reply>, posts: Vec<Reply>) -> (Url, Arc<Mutex<Script>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/app/", listener.local_addr().unwrap());
        let url = endpoint(&base, TransportKind::LongPolling, "application/json").unwrap();

        let script = Arc::new(Mutex::new(Script {
            gets: gets.into(),
            posts: posts.into(),
            seen: Vec::new(),
        }));
        let shared = Arc::clone(&script);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(respond(stream, Arc::clone(&shared)));
            }
        });

        (url, script)
    }

    async fn respond(mut stream: TcpStream, script: Arc<Mutex<Script>>) {
        let Some((head, body)) = read_request(&mut stream).await else {
            return;
        };

        let next = {
            let mut script = script.lock().unwrap();
            let next = if head.starts_with("POST") {
                script.posts.pop_front()
            } else {
                script.gets.pop_front()
            };
            script.seen.push((head, body));
            next.unwrap_or(Reply::Hold)
        };

        match next {
            Reply::Raw(raw) => {
                let _ = stream.write_all(raw.as_bytes()).await;
                let _ = stream.shutdown().await;
            },
            Reply::Hold => std::future::pending::<()>().await,
        }
    }

    async fn read_request(stream: &mut TcpStream) -> Option<(String, String)> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];

        let end = loop {
            let n = stream.read(&mut chunk).await.ok().filter(|n| *n > 0)?;
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break end;
            }
        };

        let head = String::from_utf8_lossy(&buf[..end]).to_string();
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        while buf.len() < end + 4 + length {
            let n = stream.read(&mut chunk).await.ok().filter(|n| *n > 0)?;
            buf.extend_from_slice(&chunk[..n]);
        }

        let body = String::from_utf8_lossy(&buf[end + 4..]).to_string();
        Some((head, body))
    }

    async fn open(url: Url, timeout: Duration) -> Result<LongPollLink, TransportError> {
        LongPollLink::connect(reqwest::Client::new(), url, "application/json".into(), timeout)
            .await
    }

    fn handshake() -> Reply {
        reply("200 OK", &[(TRACKING_ID, "abc-123")], "")
    }

    #[tokio::test]
    async fn poll_statuses_map_to_link_events() {
        let (url, script) = serve(
            vec![
                handshake(),
                reply("204 No Content", &[], ""),
                reply("200 OK", &[], FRAME),
                reply("200 OK", &[], "  "),
                reply("410 Gone", &[], ""),
            ],
            vec![],
        )
        .await;

        let mut link = open(url, Duration::from_secs(5)).await.unwrap();

        assert_eq!(link.recv().await, Some(LinkEvent::Frame(FRAME.to_string())));
        assert_eq!(link.recv().await, Some(LinkEvent::Closed));
        assert_eq!(script.lock().unwrap().heads("GET").len(), 5);
    }

    #[tokio::test]
    async fn unexpected_status_loses_the_link() {
        let (url, _script) =
            serve(vec![handshake(), reply("500 Internal Server Error", &[], "")], vec![]).await;

        let mut link = open(url, Duration::from_secs(5)).await.unwrap();

        let Some(LinkEvent::Lost(reason)) = link.recv().await else {
            unreachable!("a 500 should end the link");
        };
        assert!(reason.contains("500"), "{reason}");
    }

    #[tokio::test]
    async fn expired_hold_polls_again() {
        let (url, script) =
            serve(vec![handshake(), Reply::Hold, reply("200 OK", &[], FRAME)], vec![]).await;

        let mut link = open(url, Duration::from_millis(200)).await.unwrap();

        assert_eq!(link.recv().await, Some(LinkEvent::Frame(FRAME.to_string())));
        assert!(script.lock().unwrap().heads("GET").len() >= 3);
    }

    #[tokio::test]
    async fn handshake_frame_is_delivered_first() {
        let (url, _script) =
            serve(vec![reply("200 OK", &[(TRACKING_ID, "abc-123")], FRAME)], vec![]).await;

        let mut link = open(url, Duration::from_secs(5)).await.unwrap();

        assert_eq!(link.recv().await, Some(LinkEvent::Frame(FRAME.to_string())));
    }

    #[tokio::test]
    async fn gone_on_handshake_is_unavailable() {
        let (url, _script) = serve(vec![reply("410 Gone", &[], "")], vec![]).await;

        let result = open(url, Duration::from_secs(5)).await;

        assert!(matches!(
            result,
            Err(TransportError::Unavailable { transport: TransportKind::LongPolling, .. })
        ));
    }

    #[tokio::test]
    async fn assigned_tracking_id_is_sent_on_later_requests() {
        let (url, script) = serve(
            vec![handshake(), reply("204 No Content", &[], "")],
            vec![reply("200 OK", &[], "")],
        )
        .await;

        let mut link = open(url, Duration::from_secs(5)).await.unwrap();
        link.send(r#"{"action":"connect","params":["alice"]}"#.into()).await.unwrap();

        let script = script.lock().unwrap();
        let gets = script.heads("GET");
        assert!(gets[0].contains("X-Atmosphere-tracking-id=0&"), "{}", gets[0]);

        let posts = script.heads("POST");
        assert_eq!(posts.len(), 1);
        assert!(posts[0].contains("X-Atmosphere-tracking-id=abc-123&"), "{}", posts[0]);
        assert!(posts[0].to_ascii_lowercase().contains("content-type: application/json"));

        let posted: Vec<&str> = script
            .seen
            .iter()
            .filter(|(head, _)| head.starts_with("POST"))
            .map(|(_, body)| body.as_str())
            .collect();
        assert_eq!(posted, [r#"{"action":"connect","params":["alice"]}"#]);
    }

    #[tokio::test]
    async fn post_reply_body_is_delivered() {
        let (url, _script) = serve(vec![handshake()], vec![reply("200 OK", &[], FRAME)]).await;

        let mut link = open(url, Duration::from_secs(5)).await.unwrap();
        link.send(r#"{"action":"lock","params":["printer"]}"#.into()).await.unwrap();

        assert_eq!(link.recv().await, Some(LinkEvent::Frame(FRAME.to_string())));
    }

    #[tokio::test]
    async fn rejected_post_is_a_send_error() {
        let (url, _script) =
            serve(vec![handshake()], vec![reply("503 Service Unavailable", &[], "")]).await;

        let mut link = open(url, Duration::from_secs(5)).await.unwrap();
        let result = link.send("{}".into()).await;

        assert!(matches!(result, Err(TransportError::Send { reason }) if reason.contains("503")));
    }

    #[tokio::test]
    async fn closed_link_refuses_sends() {
        let (url, _script) = serve(vec![handshake()], vec![]).await;

        let mut link = open(url, Duration::from_secs(5)).await.unwrap();
        link.close().await;

        assert!(matches!(link.send("{}".into()).await, Err(TransportError::Closed)));
    }
}
