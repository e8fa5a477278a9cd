//! Scripted frontend for runtime tests.

use std::{collections::VecDeque, convert::Infallible, future::Future};

use distlock_app::{App, Driver, NotificationSink, notification_text};
use distlock_client::{AuditEvent, Info};
use distlock_core::TransportKind;
use distlock_proto::Notification;

use crate::SimTransport;

/// One scripted step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Type this line.
    Line(String),
    /// Drop every link (transient loss).
    DropLinks,
    /// Close every link from the service side.
    CloseLinks,
    /// Push a raw frame to every link.
    InjectFrame(String),
    /// Toggle availability of a transport kind.
    SetUnavailable(TransportKind, bool),
    /// Fail the next `n` connect attempts.
    FailNextConnects(u32),
    /// Make sends on open links fail (or succeed again).
    FailSends(bool),
}

impl Step {
    /// Shorthand for [`Step::Line`].
    pub fn line(text: &str) -> Self {
        Self::Line(text.to_string())
    }
}

/// Everything the runtime showed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEntry {
    /// Service notification.
    Notification(Notification),
    /// Local audit.
    Audit(AuditEvent),
    /// Channel info.
    Info(Info),
    /// Locally rejected input.
    Rejected(String),
}

/// Sink that records every line.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    entries: Vec<SinkEntry>,
}

impl RecordingSink {
    /// All entries in order.
    pub fn entries(&self) -> &[SinkEntry] {
        &self.entries
    }

    /// Notifications rendered as `STATUS: message`.
    pub fn notifications(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                SinkEntry::Notification(n) => Some(notification_text(n)),
                _ => None,
            })
            .collect()
    }

    /// Audit descriptions.
    pub fn audits(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                SinkEntry::Audit(event) => Some(event.description.clone()),
                _ => None,
            })
            .collect()
    }

    /// Info messages.
    pub fn infos(&self) -> Vec<Info> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                SinkEntry::Info(info) => Some(info.clone()),
                _ => None,
            })
            .collect()
    }

    /// Rejection reasons.
    pub fn rejections(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                SinkEntry::Rejected(reason) => Some(reason.clone()),
                _ => None,
            })
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notification(&mut self, notification: &Notification) {
        self.entries.push(SinkEntry::Notification(notification.clone()));
    }

    fn audit(&mut self, event: &AuditEvent) {
        self.entries.push(SinkEntry::Audit(event.clone()));
    }

    fn info(&mut self, info: &Info) {
        self.entries.push(SinkEntry::Info(info.clone()));
    }

    fn rejected(&mut self, reason: &str) {
        self.entries.push(SinkEntry::Rejected(reason.to_string()));
    }
}

/// Driver that replays a script and records what it is shown.
///
/// Fault steps act on the transport and then yield a blank line, which gives
/// the runtime a turn to process the resulting link events before the next
/// scripted line. When the script runs out, input ends and the runtime
/// shuts down.
#[derive(Debug)]
pub struct ScriptedDriver {
    steps: VecDeque<Step>,
    transport: Option<SimTransport>,
    sink: RecordingSink,
    statuses: Vec<String>,
    stopped: bool,
}

impl ScriptedDriver {
    /// Replay `steps`; fault steps act on `transport`.
    pub fn new(steps: Vec<Step>, transport: SimTransport) -> Self {
        Self {
            steps: steps.into(),
            transport: Some(transport),
            sink: RecordingSink::default(),
            statuses: Vec::new(),
            stopped: false,
        }
    }

    /// Replay input lines only.
    pub fn lines(lines: &[&str]) -> Self {
        Self {
            steps: lines.iter().map(|line| Step::line(line)).collect(),
            transport: None,
            sink: RecordingSink::default(),
            statuses: Vec::new(),
            stopped: false,
        }
    }

    /// What the sink received.
    pub fn recorded(&self) -> &RecordingSink {
        &self.sink
    }

    /// Every distinct status prompt rendered, in order.
    pub fn statuses(&self) -> &[String] {
        &self.statuses
    }

    /// Whether the runtime stopped the driver.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn apply(&self, step: Step) -> String {
        let Some(transport) = &self.transport else {
            return match step {
                Step::Line(line) => line,
                _ => String::new(),
            };
        };

        match step {
            Step::Line(line) => return line,
            Step::DropLinks => transport.drop_links(),
            Step::CloseLinks => transport.close_links(),
            Step::InjectFrame(raw) => transport.inject_frame(&raw),
            Step::SetUnavailable(kind, unavailable) => transport.set_unavailable(kind, unavailable),
            Step::FailNextConnects(count) => transport.fail_next_connects(count),
            Step::FailSends(failing) => transport.fail_sends(failing),
        }
        String::new()
    }
}

impl Driver for ScriptedDriver {
    type Error = Infallible;
    type Sink = RecordingSink;

    fn next_input(&mut self) -> impl Future<Output = Result<Option<String>, Infallible>> + Send {
        // Pop only when polled, so a step is not lost when the runtime's
        // select picks a link event instead.
        async move {
            let next = self.steps.pop_front().map(|step| self.apply(step));
            Ok(next)
        }
    }

    fn sink(&mut self) -> &mut RecordingSink {
        &mut self.sink
    }

    fn render(&mut self, app: &App) -> Result<(), Infallible> {
        if self.statuses.last().map(String::as_str) != Some(app.status()) {
            self.statuses.push(app.status().to_string());
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}
