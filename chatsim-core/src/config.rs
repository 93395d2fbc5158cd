//! Engine configuration.
//!
//! Every timing and threshold the engine uses lives here. All fields have
//! defaults, so a TOML file only needs to name what it overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

use crate::session::SessionMode;

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Delays of the answer, next-question and finale sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Submit to partner reaction.
    pub reaction_ms: u64,
    /// Reaction to sticker.
    pub sticker_after_reaction_ms: u64,
    /// Reaction to reaction media.
    pub media_after_reaction_ms: u64,
    /// Reaction to supervisor comment.
    pub supervisor_after_reaction_ms: u64,
    /// Supervisor comment to feedback.
    pub feedback_after_supervisor_ms: u64,
    /// Feedback to the typing indicator for the next question.
    pub next_pre_delay_ms: u64,
    /// How long the partner "types" the next question.
    pub next_typing_ms: u64,
    /// Last feedback to finished status.
    pub finish_delay_ms: u64,
    /// Finished status to the evaluation message.
    pub evaluation_delay_ms: u64,
    /// Evaluation message to the results link and banner.
    pub results_link_delay_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            reaction_ms: 1500,
            sticker_after_reaction_ms: 600,
            media_after_reaction_ms: 800,
            supervisor_after_reaction_ms: 1500,
            feedback_after_supervisor_ms: 2500,
            next_pre_delay_ms: 2000,
            next_typing_ms: 2000,
            finish_delay_ms: 1000,
            evaluation_delay_ms: 1500,
            results_link_delay_ms: 1000,
        }
    }
}

impl Timings {
    /// Every delay set to zero.
    pub fn instant() -> Self {
        Self {
            reaction_ms: 0,
            sticker_after_reaction_ms: 0,
            media_after_reaction_ms: 0,
            supervisor_after_reaction_ms: 0,
            feedback_after_supervisor_ms: 0,
            next_pre_delay_ms: 0,
            next_typing_ms: 0,
            finish_delay_ms: 0,
            evaluation_delay_ms: 0,
            results_link_delay_ms: 0,
        }
    }

    /// Offset of the feedback step from submission.
    pub fn feedback_at(&self) -> u64 {
        self.reaction_ms
            .saturating_add(self.supervisor_after_reaction_ms)
            .saturating_add(self.feedback_after_supervisor_ms)
    }
}

/// The incoming-call interruption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterruptConfig {
    pub enabled: bool,
    /// Time a question may stay unanswered before the call rings.
    pub delay_ms: u64,
    /// Points awarded for answering the call.
    pub bonus: u32,
    pub once_per_session: bool,
}

impl Default for InterruptConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: 15_000,
            bonus: 1,
            once_per_session: true,
        }
    }
}

/// Banners and sensory cues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub banner_ms: u64,
    pub confetti_ms: u64,
    pub confetti_particles: usize,
    pub vibrate_ms: u64,
    /// Chance of an ambient relative banner after a wrong answer.
    pub relative_chance: f64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            banner_ms: 5000,
            confetti_ms: 2000,
            confetti_particles: 8,
            vibrate_ms: 200,
            relative_chance: 0.35,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub timings: Timings,
    pub interrupt: InterruptConfig,
    pub notify: NotifyConfig,
    /// Minimum score that passes the course.
    pub passing_score: u32,
    /// Denominator shown in the evaluation.
    pub total_score: u32,
    pub default_mode: SessionMode,
    /// Hold back gated nodes until their topic is mastered (practice only).
    pub mastery_gate: bool,
    pub mastery_threshold: f64,
    pub shuffle_options: bool,
    /// Seed for option order, confetti and ambient banners.
    pub seed: u64,
    pub preview_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timings: Timings::default(),
            interrupt: InterruptConfig::default(),
            notify: NotifyConfig::default(),
            passing_score: 14,
            total_score: 18,
            default_mode: SessionMode::Practice,
            mastery_gate: false,
            mastery_threshold: 0.8,
            shuffle_options: false,
            seed: 0x5EED,
            preview_chars: 40,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_interrupt(mut self, interrupt: InterruptConfig) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Turn the incoming call off entirely.
    pub fn without_interrupt(mut self) -> Self {
        self.interrupt.enabled = false;
        self
    }

    pub fn with_notify(mut self, notify: NotifyConfig) -> Self {
        self.notify = notify;
        self
    }

    pub fn with_passing_score(mut self, score: u32) -> Self {
        self.passing_score = score;
        self
    }

    pub fn with_total_score(mut self, total: u32) -> Self {
        self.total_score = total;
        self
    }

    pub fn with_mode(mut self, mode: SessionMode) -> Self {
        self.default_mode = mode;
        self
    }

    pub fn with_mastery_gate(mut self, threshold: f64) -> Self {
        self.mastery_gate = true;
        self.mastery_threshold = threshold;
        self
    }

    pub fn with_shuffled_options(mut self) -> Self {
        self.shuffle_options = true;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).await?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_score == 0 {
            return Err(ConfigError::Invalid("total_score must be positive".into()));
        }
        if self.passing_score > self.total_score {
            return Err(ConfigError::Invalid(format!(
                "passing_score {} exceeds total_score {}",
                self.passing_score, self.total_score
            )));
        }
        if !(0.0..=1.0).contains(&self.mastery_threshold) {
            return Err(ConfigError::Invalid(format!(
                "mastery_threshold {} is outside 0..=1",
                self.mastery_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.notify.relative_chance) {
            return Err(ConfigError::Invalid(format!(
                "relative_chance {} is outside 0..=1",
                self.notify.relative_chance
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.passing_score, 14);
        assert_eq!(config.total_score, 18);
        assert_eq!(config.timings.feedback_at(), 5500);
        assert!(config.interrupt.enabled);
        assert_eq!(config.interrupt.delay_ms, 15_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            passing_score = 10
            default_mode = "evaluation"

            [interrupt]
            enabled = false

            [timings]
            reaction_ms = 100
            "#,
        )
        .unwrap();

        assert_eq!(config.passing_score, 10);
        assert_eq!(config.default_mode, SessionMode::Evaluation);
        assert!(!config.interrupt.enabled);
        assert_eq!(config.interrupt.delay_ms, 15_000);
        assert_eq!(config.timings.reaction_ms, 100);
        assert_eq!(config.timings.next_typing_ms, 2000);
    }

    #[test]
    fn test_invalid_passing_score() {
        let err = EngineConfig::from_toml_str("passing_score = 30").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_timings(Timings::instant())
            .without_interrupt()
            .with_mastery_gate(0.5)
            .with_seed(7);
        assert_eq!(config.timings.feedback_at(), 0);
        assert!(!config.interrupt.enabled);
        assert!(config.mastery_gate);
        assert_eq!(config.seed, 7);
    }
}
