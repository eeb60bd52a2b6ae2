//! When to run a pass.
//!
//! Two debounce timers drive the engine: a slow fallback re-armed by every
//! document change, and a fast commit timer armed by keys that usually end
//! a word or move the caret. Whichever fires first cancels the other, so at
//! most one pass is ever pending. The host owns the clock and calls
//! [`TriggerScheduler::poll`] at or after [`TriggerScheduler::next_deadline`].

use crate::config::schema::EngineConfig;
use std::time::{Duration, Instant};

/// A key press as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStroke {
    Char(char),
    Enter,
    Tab,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Home,
    End,
    PageUp,
    PageDown,
    Backspace,
    Delete,
    Escape,
}

const COMMIT_CHARS: &[char] = &[' ', '.', ',', ';', ':', '!', '?', ')', ']', '}', '"', '\''];

impl KeyStroke {
    /// Keys that end a token or move the caret away from it.
    pub fn is_commit(&self) -> bool {
        match self {
            KeyStroke::Char(c) => COMMIT_CHARS.contains(c),
            KeyStroke::Enter
            | KeyStroke::Tab
            | KeyStroke::ArrowUp
            | KeyStroke::ArrowDown
            | KeyStroke::ArrowLeft
            | KeyStroke::ArrowRight
            | KeyStroke::Home
            | KeyStroke::End
            | KeyStroke::PageUp
            | KeyStroke::PageDown => true,
            KeyStroke::Backspace | KeyStroke::Delete | KeyStroke::Escape => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A commit key was pressed and the short delay elapsed.
    Commit,
    /// The document went quiet for the long delay.
    Fallback,
}

#[derive(Debug, Clone)]
pub struct TriggerScheduler {
    fallback_delay: Duration,
    commit_delay: Duration,
    fallback_at: Option<Instant>,
    commit_at: Option<Instant>,
}

impl TriggerScheduler {
    pub fn new(fallback_delay: Duration, commit_delay: Duration) -> Self {
        Self {
            fallback_delay,
            commit_delay,
            fallback_at: None,
            commit_at: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.fallback_delay(), config.commit_delay())
    }

    /// Re-arm the fallback timer. Returns the next deadline.
    pub fn on_document_changed(&mut self, now: Instant) -> Option<Instant> {
        self.fallback_at = Some(now + self.fallback_delay);
        self.next_deadline()
    }

    /// Arm the commit timer for commit keys typed inside the editor.
    /// Returns the next deadline.
    pub fn on_key(&mut self, key: KeyStroke, focus_in_editor: bool, now: Instant) -> Option<Instant> {
        if focus_in_editor && key.is_commit() {
            self.commit_at = Some(now + self.commit_delay);
        }
        self.next_deadline()
    }

    /// Fire at most one trigger whose deadline has passed. Firing clears
    /// both timers; when both are due the commit trigger wins.
    pub fn poll(&mut self, now: Instant) -> Option<Trigger> {
        let due = |deadline: Option<Instant>| deadline.is_some_and(|at| at <= now);
        let trigger = if due(self.commit_at) {
            Trigger::Commit
        } else if due(self.fallback_at) {
            Trigger::Fallback
        } else {
            return None;
        };
        self.cancel();
        Some(trigger)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.commit_at, self.fallback_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn cancel(&mut self) {
        self.commit_at = None;
        self.fallback_at = None;
    }

    pub fn is_idle(&self) -> bool {
        self.commit_at.is_none() && self.fallback_at.is_none()
    }
}

impl Default for TriggerScheduler {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}
