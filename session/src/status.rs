//! Transient status messages that expire after a fixed interval.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
    pub posted_at: Instant,
}

/// The most recent status message, until it expires.
#[derive(Debug, Clone)]
pub struct StatusLine {
    current: Option<StatusMessage>,
    ttl: Duration,
}

impl StatusLine {
    pub fn new(ttl: Duration) -> Self {
        Self { current: None, ttl }
    }

    pub fn info(&mut self, text: impl Into<String>) -> &StatusMessage {
        self.post(StatusKind::Info, text.into())
    }

    pub fn error(&mut self, text: impl Into<String>) -> &StatusMessage {
        self.post(StatusKind::Error, text.into())
    }

    fn post(&mut self, kind: StatusKind, text: String) -> &StatusMessage {
        match kind {
            StatusKind::Info => tracing::info!("{}", text),
            StatusKind::Error => tracing::warn!("{}", text),
        }
        self.current.insert(StatusMessage {
            kind,
            text,
            posted_at: Instant::now(),
        })
    }

    pub fn current(&self) -> Option<&StatusMessage> {
        self.current_at(Instant::now())
    }

    /// The message still visible at `now`.
    pub fn current_at(&self, now: Instant) -> Option<&StatusMessage> {
        self.current
            .as_ref()
            .filter(|m| now.saturating_duration_since(m.posted_at) < self.ttl)
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_expires_after_ttl() {
        let mut status = StatusLine::new(Duration::from_millis(500));
        let posted_at = status.error("Invalid position").posted_at;

        let visible = status.current_at(posted_at + Duration::from_millis(100));
        assert_eq!(visible.map(|m| m.kind), Some(StatusKind::Error));
        assert!(status
            .current_at(posted_at + Duration::from_millis(500))
            .is_none());
    }

    #[test]
    fn test_newer_message_replaces_older() {
        let mut status = StatusLine::new(Duration::from_secs(60));
        status.error("first");
        status.info("second");
        let current = status.current().unwrap();
        assert_eq!(current.text, "second");
        assert_eq!(current.kind, StatusKind::Info);

        status.clear();
        assert!(status.current().is_none());
    }
}
