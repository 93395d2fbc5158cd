//! Headless session driver.
//!
//! Runs the engine on a virtual clock with no terminal. It's designed for:
//! - Integration tests that walk a whole script
//! - Scripted runs of the `--headless` line protocol
//! - Producing JSON transcripts of a session
//!
//! # Example
//!
//! ```ignore
//! use chatsim_core::headless::HeadlessSession;
//! use chatsim_core::EngineConfig;
//!
//! let mut session = HeadlessSession::builtin(EngineConfig::default())?;
//! session.start();
//! session.settle();
//!
//! while session.is_awaiting_answer() {
//!     session.choose(0);
//!     session.settle();
//! }
//! println!("{}", session.status_line());
//! ```

use serde::Serialize;
use std::path::Path;

use crate::config::EngineConfig;
use crate::engine::{Engine, EngineEvent};
use crate::router::{ChannelId, ChannelMessage};
use crate::script::{Script, ScriptError, ScriptOption};
use crate::session::{SessionMode, SessionStatus};

/// A message as it appeared, in posting order across all channels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptEntry {
    /// Virtual time of posting.
    pub at_ms: u64,
    pub channel: ChannelId,
    pub message: ChannelMessage,
}

/// An engine plus a transcript, driven by explicit clock moves.
pub struct HeadlessSession {
    engine: Engine,
    transcript: Vec<TranscriptEntry>,
    events: Vec<EngineEvent>,
}

impl HeadlessSession {
    /// Wrap an engine that already has a script.
    pub fn with_engine(engine: Engine) -> Self {
        let mut session = Self {
            engine,
            transcript: Vec::new(),
            events: Vec::new(),
        };
        session.collect();
        session
    }

    pub fn new(config: EngineConfig, script: Script) -> Result<Self, ScriptError> {
        Ok(Self::with_engine(Engine::with_script(config, script)?))
    }

    /// Session over the built-in scenario.
    pub fn builtin(config: EngineConfig) -> Result<Self, ScriptError> {
        Self::new(config, Script::builtin()?)
    }

    /// Session over a script file.
    pub async fn load(config: EngineConfig, path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let script = Script::load(path).await?;
        Self::new(config, script)
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    // ------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------

    pub fn select_mode(&mut self, mode: SessionMode) -> bool {
        self.engine.select_mode(mode)
    }

    /// First engagement (playing the opening audio).
    pub fn start(&mut self) -> bool {
        let started = self.engine.start();
        self.collect();
        started
    }

    /// Choose the option at a display position (0-based).
    pub fn choose(&mut self, position: usize) -> bool {
        let index = self.engine.current_options().get(position).map(|(i, _)| *i);
        let accepted = match index {
            Some(index) => self.engine.submit_answer(index),
            None => false,
        };
        self.collect();
        accepted
    }

    /// Choose the highest-scoring option on offer.
    pub fn choose_best(&mut self) -> bool {
        let best = self
            .engine
            .current_options()
            .iter()
            .enumerate()
            .max_by_key(|(_, (_, o))| o.score)
            .map(|(position, _)| position);
        match best {
            Some(position) => self.choose(position),
            None => false,
        }
    }

    pub fn answer_call(&mut self) -> bool {
        let answered = self.engine.answer_call();
        self.collect();
        answered
    }

    pub fn decline_call(&mut self) -> bool {
        let declined = self.engine.decline_call();
        self.collect();
        declined
    }

    pub fn reset(&mut self) {
        self.engine.reset();
        self.collect();
    }

    pub fn terminate(&mut self) -> bool {
        let terminated = self.engine.terminate();
        self.collect();
        terminated
    }

    /// Move the virtual clock forward.
    pub fn advance(&mut self, delta_ms: u64) {
        self.engine.advance(delta_ms);
        self.collect();
    }

    /// Fast-forward until no dramatization step is pending. An armed call
    /// timer is left alone unless a step lies beyond it.
    pub fn settle(&mut self) {
        while let Some(due) = self.engine.next_step_due() {
            self.engine.tick(due);
            self.collect();
        }
    }

    /// Answer every node with the best option until the session ends.
    pub fn play_best(&mut self) {
        self.start();
        self.settle();
        while self.choose_best() {
            self.settle();
        }
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    fn collect(&mut self) {
        let now = self.engine.now();
        for event in self.engine.drain_events() {
            if let EngineEvent::MessagePosted { channel, id } = &event {
                let message = self
                    .engine
                    .router()
                    .history(*channel)
                    .iter()
                    .rev()
                    .find(|m| m.id == *id)
                    .cloned();
                if let Some(message) = message {
                    self.transcript.push(TranscriptEntry {
                        at_ms: now,
                        channel: *channel,
                        message,
                    });
                }
            }
            self.events.push(event);
        }
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// Every event seen so far.
    pub fn events(&self) -> &[EngineEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn status(&self) -> SessionStatus {
        self.engine.status()
    }

    pub fn score(&self) -> u32 {
        self.engine.state().score
    }

    pub fn step(&self) -> usize {
        self.engine.state().step
    }

    pub fn is_awaiting_answer(&self) -> bool {
        self.engine.state().is_awaiting_answer()
    }

    pub fn options(&self) -> Vec<&ScriptOption> {
        self.engine.current_options().into_iter().map(|(_, o)| o).collect()
    }

    pub fn is_ringing(&self) -> bool {
        matches!(
            self.engine.call_state(),
            crate::interrupt::InterruptState::Ringing { .. }
        )
    }

    /// Contents of one channel, oldest first.
    pub fn texts(&self, channel: ChannelId) -> Vec<&str> {
        self.engine
            .router()
            .history(channel)
            .iter()
            .map(|m| m.content.as_str())
            .collect()
    }

    /// One-line summary for the `#status` command.
    pub fn status_line(&self) -> String {
        let state = self.engine.state();
        let total = self.engine.script().map(Script::len).unwrap_or(0);
        format!(
            "status={} mode={:?} step={}/{} score={}/{} awaiting={} call={:?}",
            state.status,
            self.engine.mode(),
            if total == 0 { 0 } else { state.step + 1 },
            total,
            state.score,
            self.engine.config().total_score,
            self.is_awaiting_answer(),
            self.engine.call_state(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_best_run_passes() {
        let mut session = HeadlessSession::builtin(EngineConfig::new().without_interrupt()).unwrap();
        session.play_best();

        assert_eq!(session.status(), SessionStatus::Finished);
        assert_eq!(session.score(), 18);
        assert!(session
            .events()
            .iter()
            .any(|e| matches!(e, EngineEvent::Completed(_))));
    }

    #[test]
    fn test_transcript_follows_posting_order() {
        let mut session = HeadlessSession::builtin(EngineConfig::new().without_interrupt()).unwrap();
        session.start();
        session.settle();

        let kinds: Vec<_> = session
            .transcript()
            .iter()
            .map(|e| e.message.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![crate::router::MessageKind::Image, crate::router::MessageKind::Ai]
        );
        assert_eq!(session.transcript()[0].at_ms, 5000);
        assert_eq!(session.transcript()[1].at_ms, 12_000);
    }

    #[test]
    fn test_choose_out_of_range_is_ignored() {
        let mut session = HeadlessSession::builtin(EngineConfig::new().without_interrupt()).unwrap();
        session.start();
        session.settle();
        assert!(!session.choose(9));
        assert!(session.is_awaiting_answer());
    }
}
