//! Line-oriented terminal frontend.
//!
//! Input is read on a dedicated thread and handed over a channel, so waiting
//! for the next line is cancel safe. Output lines are stamped `HH:MM:SS` in
//! local time and colored by [`Tone`].

use std::{
    future::Future,
    io::{self, BufRead, Write},
    thread,
    time::SystemTime,
};

use chrono::{DateTime, Local};
use distlock_app::{App, Driver, NotificationSink, Tone, notification_text};
use distlock_client::{AuditEvent, Info};
use distlock_proto::Notification;
use thiserror::Error;
use tokio::sync::mpsc;

/// Terminal errors.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// Reading stdin or writing stdout failed.
    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),
}

fn ansi(tone: Tone) -> Option<&'static str> {
    match tone.color() {
        "red" => Some("\x1b[31m"),
        "blue" => Some("\x1b[34m"),
        "yellow" => Some("\x1b[33m"),
        _ => None,
    }
}

fn clock(at: SystemTime) -> String {
    DateTime::<Local>::from(at).format("%H:%M:%S").to_string()
}

/// Sink writing to stdout, keeping the prompt on the last line.
pub struct TerminalSink {
    color: bool,
    prompt: String,
    at_prompt: bool,
}

impl TerminalSink {
    fn new(color: bool) -> Self {
        Self { color, prompt: String::new(), at_prompt: false }
    }

    fn line(&mut self, tone: Tone, at: SystemTime, text: &str) {
        if let Err(error) = self.write_line(tone, at, text) {
            tracing::warn!(%error, "failed to write to terminal");
        }
    }

    fn write_line(&mut self, tone: Tone, at: SystemTime, text: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        if self.at_prompt {
            writeln!(out)?;
        }

        match ansi(tone).filter(|_| self.color) {
            Some(start) => writeln!(out, "{start}{}: {text}\x1b[0m", clock(at))?,
            None => writeln!(out, "{}: {text}", clock(at))?,
        }

        self.at_prompt = !self.prompt.is_empty();
        write!(out, "{}", self.prompt)?;
        out.flush()
    }

    fn set_prompt(&mut self, prompt: &str) -> io::Result<()> {
        if self.at_prompt && self.prompt == prompt {
            return Ok(());
        }

        let mut out = io::stdout().lock();
        if self.at_prompt {
            writeln!(out)?;
        }
        self.prompt = prompt.to_string();
        self.at_prompt = !prompt.is_empty();
        write!(out, "{prompt}")?;
        out.flush()
    }
}

impl NotificationSink for TerminalSink {
    fn notification(&mut self, notification: &Notification) {
        self.line(Tone::Notification, notification.time, &notification_text(notification));
    }

    fn audit(&mut self, event: &AuditEvent) {
        self.line(Tone::Audit, event.at, &event.description);
    }

    fn info(&mut self, info: &Info) {
        self.line(Tone::Info, SystemTime::now(), &info.to_string());
    }

    fn rejected(&mut self, reason: &str) {
        self.line(Tone::Error, SystemTime::now(), reason);
    }
}

/// Driver reading commands from stdin.
pub struct TerminalDriver {
    lines: mpsc::Receiver<io::Result<String>>,
    sink: TerminalSink,
}

impl TerminalDriver {
    /// Start reading stdin.
    pub fn new(color: bool) -> Self {
        let (tx, lines) = mpsc::channel(16);
        // Detached: a blocked stdin read must not hold up exit.
        thread::spawn(move || read_lines(&tx));
        Self { lines, sink: TerminalSink::new(color) }
    }
}

fn read_lines(tx: &mpsc::Sender<io::Result<String>>) {
    for line in io::stdin().lock().lines() {
        let failed = line.is_err();
        if tx.blocking_send(line).is_err() || failed {
            break;
        }
    }
}

impl Driver for TerminalDriver {
    type Error = TerminalError;
    type Sink = TerminalSink;

    fn next_input(&mut self) -> impl Future<Output = Result<Option<String>, TerminalError>> + Send {
        async move {
            match self.lines.recv().await {
                Some(Ok(line)) => {
                    // the user's newline ended the prompt line
                    self.sink.at_prompt = false;
                    Ok(Some(line))
                },
                Some(Err(error)) => Err(error.into()),
                None => Ok(None),
            }
        }
    }

    fn sink(&mut self) -> &mut TerminalSink {
        &mut self.sink
    }

    fn render(&mut self, app: &App) -> Result<(), TerminalError> {
        // no prompt while a lock outcome is pending
        let prompt = if app.input_enabled() { app.status() } else { "" };
        self.sink.set_prompt(prompt).map_err(TerminalError::from)
    }

    fn stop(&mut self) {
        self.lines.close();
        let _ = writeln!(io::stdout());
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn tones_map_to_ansi() {
        assert_eq!(ansi(Tone::Notification), Some("\x1b[31m"));
        assert_eq!(ansi(Tone::Audit), Some("\x1b[34m"));
        assert_eq!(ansi(Tone::Error), Some("\x1b[33m"));
        assert_eq!(ansi(Tone::Info), None);
    }

    #[test]
    fn clock_is_two_digit_fields() {
        let stamp = clock(SystemTime::UNIX_EPOCH + Duration::from_secs(3661));
        assert_eq!(stamp.len(), 8);
        assert_eq!(stamp.matches(':').count(), 2);
    }
}
