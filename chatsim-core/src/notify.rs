//! Banners, sounds, vibration and confetti.
//!
//! At most one banner is visible at a time; showing a new one replaces the
//! old one. Audio and vibration go through [`AudioCapability`] so a host
//! without sound (or with autoplay blocked) degrades silently.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::router::ChannelId;

/// Sounds the engine may ask the host to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundKind {
    Sent,
    Received,
    Notify,
}

/// A sensory cue, as recorded by hosts and test doubles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cue {
    Sound(SoundKind),
    Vibrate(u64),
}

/// Where clicking a banner takes the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BannerTarget {
    Channel(ChannelId),
    /// Purely atmospheric; clicking only dismisses it.
    Ambient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Banner {
    pub title: String,
    pub icon: String,
    pub message: String,
    pub target: BannerTarget,
    /// Stays until clicked or dismissed.
    pub sticky: bool,
}

impl Banner {
    pub fn new(
        title: impl Into<String>,
        icon: impl Into<String>,
        message: impl Into<String>,
        target: BannerTarget,
    ) -> Self {
        Self {
            title: title.into(),
            icon: icon.into(),
            message: message.into(),
            target,
            sticky: false,
        }
    }

    pub fn sticky(mut self) -> Self {
        self.sticky = true;
        self
    }
}

/// One confetti particle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Particle {
    pub id: u64,
    /// Horizontal position, 10..90 percent of the width.
    pub x_percent: u8,
    pub emoji: &'static str,
}

pub const CONFETTI_EMOJIS: [&str; 4] = ["🎉", "✅", "🌟", "👏"];

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Playback blocked: {0}")]
    Blocked(String),

    #[error("Not supported on this host")]
    Unsupported,
}

/// Host sound and haptics.
pub trait AudioCapability: Send {
    fn play(&self, sound: SoundKind) -> Result<(), PlaybackError>;
    fn vibrate(&self, duration_ms: u64) -> Result<(), PlaybackError>;
}

/// Host without sound or haptics.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAudio;

impl AudioCapability for SilentAudio {
    fn play(&self, _sound: SoundKind) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn vibrate(&self, _duration_ms: u64) -> Result<(), PlaybackError> {
        Ok(())
    }
}

/// Emitted once per session when the learner passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionSignal {
    pub session_id: Uuid,
    pub score: u32,
    pub total: u32,
}

/// Receives the pass signal (an embedding page, an LMS, a log line).
pub trait CompletionSink: Send {
    fn complete(&self, signal: &CompletionSignal);
}

/// Sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl CompletionSink for LogSink {
    fn complete(&self, signal: &CompletionSignal) {
        tracing::info!(
            session = %signal.session_id,
            score = signal.score,
            total = signal.total,
            "Course completed"
        );
    }
}

/// Banner, confetti and vibration state on the virtual clock.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    banner: Option<Banner>,
    banner_hide_at: Option<u64>,
    confetti: Vec<Particle>,
    confetti_until: u64,
    vibrating_until: u64,
    next_particle: u64,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a banner, replacing any visible one.
    pub fn show(&mut self, banner: Banner, now_ms: u64, auto_hide_ms: u64) {
        self.banner_hide_at = if banner.sticky {
            None
        } else {
            Some(now_ms.saturating_add(auto_hide_ms))
        };
        self.banner = Some(banner);
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    pub fn dismiss(&mut self) -> Option<Banner> {
        self.banner_hide_at = None;
        self.banner.take()
    }

    /// Consume the visible banner and return where it points.
    pub fn click(&mut self) -> Option<BannerTarget> {
        self.dismiss().map(|b| b.target)
    }

    pub fn burst_confetti<R: Rng>(&mut self, rng: &mut R, count: usize, now_ms: u64, duration_ms: u64) {
        self.confetti = (0..count)
            .map(|_| {
                self.next_particle += 1;
                Particle {
                    id: self.next_particle,
                    x_percent: rng.gen_range(10..90),
                    emoji: CONFETTI_EMOJIS[rng.gen_range(0..CONFETTI_EMOJIS.len())],
                }
            })
            .collect();
        self.confetti_until = now_ms.saturating_add(duration_ms);
    }

    pub fn confetti(&self) -> &[Particle] {
        &self.confetti
    }

    pub fn start_vibration(&mut self, now_ms: u64, duration_ms: u64) {
        self.vibrating_until = now_ms.saturating_add(duration_ms);
    }

    pub fn is_vibrating(&self, now_ms: u64) -> bool {
        now_ms < self.vibrating_until
    }

    /// Expire timed-out visuals.
    pub fn tick(&mut self, now_ms: u64) {
        if let Some(hide_at) = self.banner_hide_at {
            if now_ms >= hide_at {
                self.banner = None;
                self.banner_hide_at = None;
            }
        }
        if !self.confetti.is_empty() && now_ms >= self.confetti_until {
            self.confetti.clear();
        }
    }

    pub fn clear(&mut self) {
        *self = Self {
            next_particle: self.next_particle,
            ..Self::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn banner() -> Banner {
        Banner::new("LA JEFA", "👩‍💼", "Bien hecho", BannerTarget::Channel(ChannelId::Supervisor))
    }

    #[test]
    fn test_banner_auto_hides() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.show(banner(), 1000, 5000);

        dispatcher.tick(5999);
        assert!(dispatcher.banner().is_some());
        dispatcher.tick(6000);
        assert!(dispatcher.banner().is_none());
    }

    #[test]
    fn test_sticky_banner_stays_until_clicked() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.show(banner().sticky(), 0, 5000);
        dispatcher.tick(1_000_000);
        assert!(dispatcher.banner().is_some());

        assert_eq!(
            dispatcher.click(),
            Some(BannerTarget::Channel(ChannelId::Supervisor))
        );
        assert!(dispatcher.banner().is_none());
        assert_eq!(dispatcher.click(), None);
    }

    #[test]
    fn test_new_banner_replaces_old() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.show(banner(), 0, 5000);
        let other = Banner::new("Mamá", "👵", "¿Todo bien?", BannerTarget::Ambient);
        dispatcher.show(other, 100, 5000);
        assert_eq!(dispatcher.banner().map(|b| b.title.as_str()), Some("Mamá"));
    }

    #[test]
    fn test_confetti_is_seeded_and_expires() {
        let mut a = Dispatcher::new();
        let mut b = Dispatcher::new();
        a.burst_confetti(&mut StdRng::seed_from_u64(3), 8, 0, 2000);
        b.burst_confetti(&mut StdRng::seed_from_u64(3), 8, 0, 2000);

        assert_eq!(a.confetti().len(), 8);
        assert_eq!(a.confetti(), b.confetti());
        assert!(a.confetti().iter().all(|p| (10..90).contains(&p.x_percent)));

        a.tick(2000);
        assert!(a.confetti().is_empty());
    }

    #[test]
    fn test_vibration_window() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.start_vibration(100, 200);
        assert!(dispatcher.is_vibrating(299));
        assert!(!dispatcher.is_vibrating(300));
    }
}
