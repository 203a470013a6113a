use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::compose::{AiDispatcher, DescriptionGenerator};
use crate::config::AppConfig;
use crate::session::AuthEvent;
use crate::storage::SharedStore;

pub mod state;
pub mod toast;

pub use state::{format_created, format_price, ContactLinks, DeleteOutcome, MarketState, SubmitOutcome};
pub use toast::{Toast, ToastKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickEvent {
    /// A generated description landed in the open draft.
    DescriptionApplied,
    /// A reply arrived for a draft that no longer exists.
    DescriptionDropped,
    Auth(AuthEvent),
}

/// Market state plus the background worker that feeds it generated text.
pub struct App {
    pub config: Arc<AppConfig>,
    state: MarketState,
    dispatcher: AiDispatcher,
    tick_rate: Duration,
}

impl App {
    pub fn new(
        config: Arc<AppConfig>,
        store: SharedStore,
        generator: Arc<dyn DescriptionGenerator>,
    ) -> Self {
        let state = MarketState::load(config.clone(), store);
        Self {
            config,
            state,
            dispatcher: AiDispatcher::new(generator),
            tick_rate: Duration::from_millis(100),
        }
    }

    pub fn state(&self) -> &MarketState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut MarketState {
        &mut self.state
    }

    /// Starts generating a description for the open draft. False when there
    /// is no draft, no title, or a request is already running.
    pub fn request_description(&mut self) -> bool {
        let Some((ticket, request)) = self.state.begin_description() else {
            return false;
        };
        tracing::info!(generation = ticket.generation, "description requested");
        self.dispatcher.spawn(ticket, request);
        true
    }

    /// Applies finished work and advances timers.
    pub fn tick(&mut self, now: Instant) -> Vec<TickEvent> {
        let mut events = Vec::new();
        while let Some(completion) = self.dispatcher.try_recv() {
            events.push(if self.state.apply_description(completion) {
                TickEvent::DescriptionApplied
            } else {
                TickEvent::DescriptionDropped
            });
        }
        if let Some(event) = self.state.tick(now) {
            events.push(TickEvent::Auth(event));
        }
        events
    }

    /// Blocks until the pending description lands or `timeout` passes.
    pub fn wait_for_description(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        tracing::warn!("gave up waiting for description");
                        return false;
                    }
                    deadline - now
                }
                None => timeout,
            };
            if let Some(completion) = self.dispatcher.recv_timeout(wait) {
                if self.state.apply_description(completion) {
                    return true;
                }
            }
        }
    }

    /// Sleeps through timed steps until `done` holds or nothing is scheduled.
    pub fn settle<F>(&mut self, mut done: F) -> Vec<TickEvent>
    where
        F: FnMut(&MarketState) -> bool,
    {
        let mut events = Vec::new();
        loop {
            events.extend(self.tick(Instant::now()));
            if done(&self.state) {
                return events;
            }
            let Some(deadline) = self.state.next_deadline() else {
                return events;
            };
            let wait = deadline
                .saturating_duration_since(Instant::now())
                .min(self.tick_rate);
            thread::sleep(wait);
        }
    }
}
