use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
    pub expires_at: Instant,
}

/// Single message slot. A new message replaces the old one; messages only
/// leave by expiring.
#[derive(Debug, Clone)]
pub struct Notifier {
    ttl: Duration,
    current: Option<Toast>,
}

impl Notifier {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, current: None }
    }

    pub fn show<S: Into<String>>(&mut self, kind: ToastKind, message: S, now: Instant) {
        let message = message.into();
        tracing::debug!(?kind, %message, "toast");
        self.current = Some(Toast {
            kind,
            message,
            expires_at: now + self.ttl,
        });
    }

    pub fn success<S: Into<String>>(&mut self, message: S, now: Instant) {
        self.show(ToastKind::Success, message, now);
    }

    pub fn error<S: Into<String>>(&mut self, message: S, now: Instant) {
        self.show(ToastKind::Error, message, now);
    }

    pub fn current(&self, now: Instant) -> Option<&Toast> {
        self.current.as_ref().filter(|toast| now < toast.expires_at)
    }

    /// Drops an expired message; returns true if one was dropped.
    pub fn poll(&mut self, now: Instant) -> bool {
        match &self.current {
            Some(toast) if now >= toast.expires_at => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.current.as_ref().map(|toast| toast.expires_at)
    }
}
