//! The incoming-call interruption.
//!
//! Armed when a question is revealed. If the learner leaves it unanswered for
//! the configured delay, a call "rings" and must be answered or declined.
//! Runs on the same virtual clock as the timeline but is not part of it.

use serde::{Deserialize, Serialize};

use crate::config::InterruptConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterruptState {
    Idle,
    Armed { due_ms: u64, step: usize },
    Ringing { step: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallOutcome {
    Answered,
    Declined,
    /// The learner answered the question while the phone was ringing.
    Dismissed,
}

#[derive(Debug, Clone)]
pub struct InterruptScheduler {
    config: InterruptConfig,
    state: InterruptState,
    calls_placed: u32,
}

impl InterruptScheduler {
    pub fn new(config: InterruptConfig) -> Self {
        Self {
            config,
            state: InterruptState::Idle,
            calls_placed: 0,
        }
    }

    pub fn state(&self) -> InterruptState {
        self.state
    }

    pub fn calls_placed(&self) -> u32 {
        self.calls_placed
    }

    pub fn bonus(&self) -> u32 {
        self.config.bonus
    }

    pub fn is_ringing(&self) -> bool {
        matches!(self.state, InterruptState::Ringing { .. })
    }

    pub fn due_ms(&self) -> Option<u64> {
        match self.state {
            InterruptState::Armed { due_ms, .. } => Some(due_ms),
            _ => None,
        }
    }

    /// Arm for a freshly revealed question. Returns false if calls are
    /// disabled or already used up.
    pub fn arm(&mut self, step: usize, now_ms: u64) -> bool {
        if !self.config.enabled || self.is_ringing() {
            return false;
        }
        if self.config.once_per_session && self.calls_placed > 0 {
            return false;
        }
        self.state = InterruptState::Armed {
            due_ms: now_ms.saturating_add(self.config.delay_ms),
            step,
        };
        true
    }

    /// Cancel a pending call that has not rung yet.
    pub fn disarm(&mut self) {
        if let InterruptState::Armed { .. } = self.state {
            self.state = InterruptState::Idle;
        }
    }

    /// Start ringing if the armed call is due. Returns the step it rang on.
    pub fn poll(&mut self, now_ms: u64) -> Option<usize> {
        match self.state {
            InterruptState::Armed { due_ms, step } if now_ms >= due_ms => {
                self.state = InterruptState::Ringing { step };
                self.calls_placed += 1;
                Some(step)
            }
            _ => None,
        }
    }

    /// End a ringing call.
    pub fn resolve(&mut self, outcome: CallOutcome) -> Option<CallOutcome> {
        if self.is_ringing() {
            self.state = InterruptState::Idle;
            Some(outcome)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.state = InterruptState::Idle;
        self.calls_placed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rings_after_delay() {
        let mut calls = InterruptScheduler::new(InterruptConfig::default());
        assert!(calls.arm(0, 1000));
        assert_eq!(calls.poll(15_999), None);
        assert_eq!(calls.poll(16_000), Some(0));
        assert!(calls.is_ringing());
        assert_eq!(calls.resolve(CallOutcome::Answered), Some(CallOutcome::Answered));
        assert_eq!(calls.state(), InterruptState::Idle);
    }

    #[test]
    fn test_once_per_session() {
        let mut calls = InterruptScheduler::new(InterruptConfig::default());
        calls.arm(0, 0);
        calls.poll(20_000);
        calls.resolve(CallOutcome::Declined);

        assert!(!calls.arm(1, 20_000));
        calls.reset();
        assert!(calls.arm(1, 20_000));
    }

    #[test]
    fn test_disarm_before_due() {
        let mut calls = InterruptScheduler::new(InterruptConfig::default());
        calls.arm(0, 0);
        calls.disarm();
        assert_eq!(calls.poll(100_000), None);
        assert_eq!(calls.calls_placed(), 0);
    }

    #[test]
    fn test_disabled_never_arms() {
        let config = InterruptConfig {
            enabled: false,
            ..InterruptConfig::default()
        };
        let mut calls = InterruptScheduler::new(config);
        assert!(!calls.arm(0, 0));
        assert_eq!(calls.resolve(CallOutcome::Answered), None);
    }
}
