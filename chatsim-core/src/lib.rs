//! Scripted chat-simulation engine for workplace-safety training.
//!
//! This crate provides:
//! - A validated quiz script model (JSON)
//! - A session state machine with practice and evaluation modes
//! - A cancellable virtual-time scheduler for dramatized replies
//! - Channel histories with previews and unread counts
//! - An incoming-call interruption, banners and sensory cues
//!
//! # Quick Start
//!
//! ```ignore
//! use chatsim_core::{Engine, EngineConfig, Script};
//!
//! let script = Script::builtin()?;
//! let mut engine = Engine::with_script(EngineConfig::default(), script)?;
//!
//! engine.start();
//! engine.tick(12_000);
//! for (index, option) in engine.current_options() {
//!     println!("{index}: {}", option.text);
//! }
//! engine.submit_answer(0);
//! ```

pub mod config;
pub mod engine;
pub mod evaluation;
pub mod headless;
pub mod interrupt;
pub mod notify;
pub mod router;
pub mod script;
pub mod session;
pub mod testing;
pub mod timeline;

// Primary public API
pub use config::{ConfigError, EngineConfig, InterruptConfig, NotifyConfig, Timings};
pub use engine::{Engine, EngineEvent};
pub use evaluation::{Evaluation, Level};
pub use headless::{HeadlessSession, TranscriptEntry};
pub use interrupt::{CallOutcome, InterruptState};
pub use notify::{
    AudioCapability, Banner, BannerTarget, CompletionSignal, CompletionSink, Cue, PlaybackError,
    SilentAudio, SoundKind,
};
pub use router::{ChannelEntry, ChannelId, ChannelMessage, MessageId, MessageKind, View};
pub use script::{Media, MediaKind, Script, ScriptError, ScriptNode, ScriptOption};
pub use session::{SessionMode, SessionState, SessionStatus, TopicScore};
pub use testing::TestHarness;
