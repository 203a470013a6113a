use std::time::Instant;

use crate::config::AuthConfig;
use crate::contact::{digits_only, format_identity};

/// Where the mock login currently stands. The two timed steps carry the
/// instant at which they complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStep {
    PhoneEntry,
    SendingCode { ready_at: Instant },
    CodeEntry,
    Verifying { ready_at: Instant },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    CodeSent,
    Authenticated { identity: String },
}

/// Phone → code → authenticated. No code is ever sent or checked; the only
/// gates are input lengths.
#[derive(Debug, Clone)]
pub struct AuthFlow {
    config: AuthConfig,
    step: AuthStep,
    phone: String,
    code: String,
}

impl AuthFlow {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            step: AuthStep::PhoneEntry,
            phone: String::new(),
            code: String::new(),
        }
    }

    pub fn step(&self) -> AuthStep {
        self.step
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self.step,
            AuthStep::SendingCode { .. } | AuthStep::Verifying { .. }
        )
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match self.step {
            AuthStep::SendingCode { ready_at } | AuthStep::Verifying { ready_at } => {
                Some(ready_at)
            }
            _ => None,
        }
    }

    /// Replaces the phone input; ignored outside phone entry.
    pub fn set_phone(&mut self, input: &str) {
        if self.step == AuthStep::PhoneEntry {
            self.phone = digits_only(input, Some(self.config.phone_digits));
        }
    }

    pub fn set_code(&mut self, input: &str) {
        if self.step == AuthStep::CodeEntry {
            self.code = digits_only(input, Some(self.config.code_digits));
        }
    }

    pub fn can_submit_phone(&self) -> bool {
        self.step == AuthStep::PhoneEntry && self.phone.len() >= self.config.phone_digits
    }

    pub fn can_submit_code(&self) -> bool {
        self.step == AuthStep::CodeEntry && self.code.len() == self.config.code_digits
    }

    /// Starts the "send code" delay. Returns false, changing nothing, when the
    /// phone is too short or the flow is elsewhere.
    pub fn submit_phone(&mut self, now: Instant) -> bool {
        if !self.can_submit_phone() {
            return false;
        }
        tracing::debug!(phone = %self.phone, "requesting mock confirmation code");
        self.step = AuthStep::SendingCode {
            ready_at: now + self.config.delay(),
        };
        true
    }

    pub fn submit_code(&mut self, now: Instant) -> bool {
        if !self.can_submit_code() {
            return false;
        }
        self.step = AuthStep::Verifying {
            ready_at: now + self.config.delay(),
        };
        true
    }

    /// Back from code entry to phone entry; the typed code is dropped.
    pub fn change_phone(&mut self) {
        if self.step == AuthStep::CodeEntry {
            self.code.clear();
            self.step = AuthStep::PhoneEntry;
        }
    }

    /// Completes a timed step once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<AuthEvent> {
        match self.step {
            AuthStep::SendingCode { ready_at } if now >= ready_at => {
                self.step = AuthStep::CodeEntry;
                Some(AuthEvent::CodeSent)
            }
            AuthStep::Verifying { ready_at } if now >= ready_at => {
                let identity = format_identity(&self.config, &self.phone);
                self.reset();
                Some(AuthEvent::Authenticated { identity })
            }
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.step = AuthStep::PhoneEntry;
        self.phone.clear();
        self.code.clear();
    }
}
