//! Testing utilities for the chat simulation.
//!
//! This module provides tools for integration testing:
//! - `RecordingAudio` and `RecordingSink` test doubles for host capabilities
//! - `TestHarness` for scripted session scenarios
//! - Assertion helpers for verifying session state

use std::sync::{Arc, Mutex};

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::headless::HeadlessSession;
use crate::notify::{AudioCapability, CompletionSignal, CompletionSink, Cue, PlaybackError, SoundKind};
use crate::router::ChannelId;
use crate::script::{Script, ScriptNode, ScriptOption};
use crate::session::SessionStatus;

/// Audio double that records every cue it is asked to play.
#[derive(Debug, Clone, Default)]
pub struct RecordingAudio {
    cues: Arc<Mutex<Vec<Cue>>>,
    failing: bool,
}

impl RecordingAudio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records cues but reports every playback as blocked.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn cues(&self) -> Vec<Cue> {
        self.cues.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn count(&self, cue: Cue) -> usize {
        self.cues().iter().filter(|c| **c == cue).count()
    }

    fn record(&self, cue: Cue) -> Result<(), PlaybackError> {
        if let Ok(mut cues) = self.cues.lock() {
            cues.push(cue);
        }
        if self.failing {
            Err(PlaybackError::Blocked("autoplay disabled".to_string()))
        } else {
            Ok(())
        }
    }
}

impl AudioCapability for RecordingAudio {
    fn play(&self, sound: SoundKind) -> Result<(), PlaybackError> {
        self.record(Cue::Sound(sound))
    }

    fn vibrate(&self, duration_ms: u64) -> Result<(), PlaybackError> {
        if self.failing {
            return Err(PlaybackError::Unsupported);
        }
        self.record(Cue::Vibrate(duration_ms))
    }
}

/// Completion sink that records every signal.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    signals: Arc<Mutex<Vec<CompletionSignal>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signals(&self) -> Vec<CompletionSignal> {
        self.signals.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.signals().len()
    }
}

impl CompletionSink for RecordingSink {
    fn complete(&self, signal: &CompletionSignal) {
        if let Ok(mut signals) = self.signals.lock() {
            signals.push(signal.clone());
        }
    }
}

/// A script whose intro reveals the first prompt immediately.
pub fn quick_script(nodes: Vec<ScriptNode>) -> Script {
    let mut script = Script::from_nodes(nodes);
    script.intro.media_delay_ms = 0;
    script.intro.prompt_delay_ms = 0;
    script
}

/// A node with a generated prompt.
pub fn node(id: u32, options: Vec<ScriptOption>) -> ScriptNode {
    ScriptNode::new(id, format!("Pregunta {id}"), options).with_time("08:12")
}

/// Test harness for running session scenarios.
pub struct TestHarness {
    pub session: HeadlessSession,
    pub audio: RecordingAudio,
    pub sink: RecordingSink,
}

impl TestHarness {
    /// Harness over a script, with recording doubles wired in.
    pub fn new(config: EngineConfig, script: Script) -> Self {
        let audio = RecordingAudio::new();
        let sink = RecordingSink::new();
        let engine = Engine::new(config)
            .with_audio(Box::new(audio.clone()))
            .with_completion_sink(Box::new(sink.clone()));
        let mut session = HeadlessSession::with_engine(engine);
        if let Err(e) = session.engine_mut().load_script(script) {
            panic!("test script is invalid: {e}");
        }
        Self {
            session,
            audio,
            sink,
        }
    }

    /// Harness with the call interruption disabled.
    pub fn quiet(script: Script) -> Self {
        Self::new(EngineConfig::new().without_interrupt(), script)
    }

    /// Start and run the intro until the first prompt is on offer.
    pub fn begin(&mut self) -> &mut Self {
        self.session.start();
        self.session.settle();
        self
    }

    /// Choose by display position and let the dramatization finish.
    pub fn answer(&mut self, position: usize) -> &mut Self {
        self.session.choose(position);
        self.session.settle();
        self
    }

    pub fn engine(&self) -> &Engine {
        self.session.engine()
    }

    pub fn texts(&self, channel: ChannelId) -> Vec<&str> {
        self.session.texts(channel)
    }

    pub fn unread(&self, channel: ChannelId) -> u32 {
        self.engine().router().unread(channel)
    }
}

#[track_caller]
pub fn assert_status(harness: &TestHarness, status: SessionStatus) {
    assert_eq!(harness.engine().status(), status, "unexpected session status");
}

#[track_caller]
pub fn assert_score(harness: &TestHarness, score: u32) {
    assert_eq!(harness.engine().state().score, score, "unexpected score");
}

#[track_caller]
pub fn assert_step(harness: &TestHarness, step: usize) {
    assert_eq!(harness.engine().state().step, step, "unexpected step");
}

#[track_caller]
pub fn assert_awaiting(harness: &TestHarness) {
    assert!(
        harness.engine().state().is_awaiting_answer(),
        "expected options to be on offer"
    );
}

#[track_caller]
pub fn assert_not_awaiting(harness: &TestHarness) {
    assert!(
        !harness.engine().state().is_awaiting_answer(),
        "expected no options on offer"
    );
}

#[track_caller]
pub fn assert_channel_contains(harness: &TestHarness, channel: ChannelId, text: &str) {
    let texts = harness.texts(channel);
    assert!(
        texts.iter().any(|t| t.contains(text)),
        "{channel} has no message containing {text:?}: {texts:?}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::SoundKind;

    fn two_nodes() -> Script {
        quick_script(vec![
            node(1, vec![ScriptOption::new("a", 2, "ok").with_feedback("+2")]),
            node(2, vec![ScriptOption::new("b", 0, "uy")]),
        ])
    }

    #[test]
    fn test_harness_walks_script() {
        let mut harness = TestHarness::quiet(two_nodes());
        harness.begin();
        assert_awaiting(&harness);
        assert_step(&harness, 0);

        harness.answer(0);
        assert_step(&harness, 1);
        assert_score(&harness, 2);
        assert_channel_contains(&harness, ChannelId::Partner, "+2");

        harness.answer(0);
        assert_status(&harness, SessionStatus::Finished);
        assert_not_awaiting(&harness);
    }

    #[test]
    fn test_recording_audio_sees_cues() {
        let mut harness = TestHarness::quiet(two_nodes());
        harness.begin().answer(0);

        assert!(harness.audio.count(Cue::Sound(SoundKind::Sent)) >= 1);
        assert!(harness.audio.count(Cue::Sound(SoundKind::Received)) >= 2);
    }

    #[test]
    fn test_failing_audio_does_not_stop_session() {
        let audio = RecordingAudio::failing();
        let engine = Engine::with_script(EngineConfig::new().without_interrupt(), two_nodes())
            .unwrap()
            .with_audio(Box::new(audio.clone()));
        let mut session = HeadlessSession::with_engine(engine);
        session.play_best();

        assert_eq!(session.status(), SessionStatus::Finished);
        assert!(!audio.cues().is_empty());
    }
}
