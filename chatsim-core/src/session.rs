//! Session state machine.
//!
//! Pure bookkeeping: status, step, score and per-topic mastery. The engine
//! decides *when* to call these transitions; this module decides whether
//! they are allowed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::script::ScriptOption;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No valid script yet.
    Idle,
    /// Script loaded, waiting for the learner's first engagement.
    Ready,
    Playing,
    Finished,
    Terminated,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Finished | SessionStatus::Terminated)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Ready => "ready",
            SessionStatus::Playing => "playing",
            SessionStatus::Finished => "finished",
            SessionStatus::Terminated => "terminated",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Feedback, supervisor comments and the mastery gate.
    #[default]
    Practice,
    /// Scores recorded silently.
    Evaluation,
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "practice" | "practica" | "práctica" => Ok(SessionMode::Practice),
            "evaluation" | "eval" | "evaluacion" | "evaluación" => Ok(SessionMode::Evaluation),
            other => Err(format!("Unknown mode: {other}")),
        }
    }
}

/// Earned and possible points for one topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicScore {
    pub earned: u32,
    pub possible: u32,
}

impl TopicScore {
    /// Mastery ratio, or `None` if nothing has been scored.
    pub fn ratio(&self) -> Option<f64> {
        if self.possible == 0 {
            None
        } else {
            Some(f64::from(self.earned) / f64::from(self.possible))
        }
    }
}

/// One accepted answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub step: usize,
    pub node_id: u32,
    pub option_index: usize,
    pub score: u8,
    pub topic: Option<String>,
}

/// Everything that is discarded on reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: Uuid,
    pub step: usize,
    pub score: u32,
    pub status: SessionStatus,
    pub mode: Option<SessionMode>,
    pub topic_scores: BTreeMap<String, TopicScore>,
    pub topic_attempts: BTreeMap<String, u32>,
    /// The step whose options are currently on offer.
    pub awaiting_answer_for_step: Option<usize>,
    /// Bumped on every reset and termination.
    pub epoch: u64,
    pub completion_emitted: bool,
    pub remediated_topics: BTreeSet<String>,
    pub answers: Vec<AnswerRecord>,
    pub call_bonus: u32,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            step: 0,
            score: 0,
            status: SessionStatus::Idle,
            mode: None,
            topic_scores: BTreeMap::new(),
            topic_attempts: BTreeMap::new(),
            awaiting_answer_for_step: None,
            epoch: 0,
            completion_emitted: false,
            remediated_topics: BTreeSet::new(),
            answers: Vec::new(),
            call_bonus: 0,
        }
    }

    /// A fresh state for the next epoch.
    pub fn next_epoch(&self) -> Self {
        Self {
            epoch: self.epoch + 1,
            ..Self::new()
        }
    }

    /// Whether two states have identical progress, ignoring identity.
    pub fn same_progress(&self, other: &SessionState) -> bool {
        self.step == other.step
            && self.score == other.score
            && self.status == other.status
            && self.mode == other.mode
            && self.topic_scores == other.topic_scores
            && self.topic_attempts == other.topic_attempts
            && self.awaiting_answer_for_step == other.awaiting_answer_for_step
            && self.completion_emitted == other.completion_emitted
            && self.remediated_topics == other.remediated_topics
            && self.answers == other.answers
            && self.call_bonus == other.call_bonus
    }

    pub fn mark_ready(&mut self) -> bool {
        if self.status != SessionStatus::Idle {
            return false;
        }
        self.status = SessionStatus::Ready;
        true
    }

    pub fn select_mode(&mut self, mode: SessionMode) -> bool {
        if !matches!(self.status, SessionStatus::Idle | SessionStatus::Ready) {
            return false;
        }
        self.mode = Some(mode);
        true
    }

    pub fn mode_or(&self, fallback: SessionMode) -> SessionMode {
        self.mode.unwrap_or(fallback)
    }

    /// `ready → playing`. Anything else is a no-op.
    pub fn begin(&mut self, default_mode: SessionMode) -> bool {
        if self.status != SessionStatus::Ready {
            return false;
        }
        self.mode.get_or_insert(default_mode);
        self.status = SessionStatus::Playing;
        true
    }

    /// Offer the current step's options.
    pub fn offer(&mut self) {
        if self.status == SessionStatus::Playing {
            self.awaiting_answer_for_step = Some(self.step);
        }
    }

    pub fn is_awaiting_answer(&self) -> bool {
        self.status == SessionStatus::Playing && self.awaiting_answer_for_step == Some(self.step)
    }

    /// Accept an answer for the current step. Returns false (and changes
    /// nothing) unless the step's options are on offer.
    pub fn record_answer(&mut self, node_id: u32, option_index: usize, option: &ScriptOption) -> bool {
        if !self.is_awaiting_answer() {
            return false;
        }
        self.awaiting_answer_for_step = None;
        self.score += u32::from(option.score);

        if let Some(topic) = &option.topic {
            let entry = self.topic_scores.entry(topic.clone()).or_default();
            entry.earned += u32::from(option.score);
            entry.possible += u32::from(option.possible_score());
            *self.topic_attempts.entry(topic.clone()).or_default() += 1;
        }

        self.answers.push(AnswerRecord {
            step: self.step,
            node_id,
            option_index,
            score: option.score,
            topic: option.topic.clone(),
        });
        true
    }

    pub fn add_bonus(&mut self, bonus: u32) -> bool {
        if self.status != SessionStatus::Playing {
            return false;
        }
        self.score += bonus;
        self.call_bonus += bonus;
        true
    }

    /// Move past a resolved node. Returns true if another node follows,
    /// false once the session has finished.
    pub fn advance(&mut self, script_len: usize) -> bool {
        if self.status != SessionStatus::Playing {
            return false;
        }
        if self.step + 1 < script_len {
            self.step += 1;
            true
        } else {
            self.awaiting_answer_for_step = None;
            self.status = SessionStatus::Finished;
            false
        }
    }

    /// Any non-terminal state → terminated.
    pub fn terminate(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = SessionStatus::Terminated;
        self.awaiting_answer_for_step = None;
        self.epoch += 1;
        true
    }

    pub fn topic_attempts(&self, topic: &str) -> u32 {
        self.topic_attempts.get(topic).copied().unwrap_or(0)
    }

    /// Repeated attempts on a topic without reaching the threshold.
    pub fn needs_remediation(&self, topic: &str, threshold: f64) -> bool {
        if self.topic_attempts(topic) < 2 {
            return false;
        }
        self.topic_scores
            .get(topic)
            .and_then(TopicScore::ratio)
            .map(|r| r < threshold)
            .unwrap_or(false)
    }

    /// A topic with nothing scored yet does not block.
    pub fn mastery_met(&self, topic: &str, threshold: f64) -> bool {
        self.topic_scores
            .get(topic)
            .and_then(TopicScore::ratio)
            .map(|r| r >= threshold)
            .unwrap_or(true)
    }
}
