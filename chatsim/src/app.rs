//! Main application state and logic

use std::time::Instant;

use chatsim_core::{
    BannerTarget, ChannelId, Engine, EngineEvent, InterruptState, SessionMode, SessionStatus, View,
};
use tracing::debug;

use crate::ui::theme::ChatTheme;

/// Main application state
pub struct App {
    pub engine: Engine,

    // Wall clock that drives the engine's virtual time
    started: Instant,

    // UI state
    pub theme: ChatTheme,
    pub list_cursor: usize,
    pub option_cursor: usize,
    /// Lines scrolled up from the newest message.
    pub scroll: usize,
    pub show_help: bool,

    // Status
    status_message: Option<String>,

    // Animation
    pub animation_frame: u8,
}

impl App {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            started: Instant::now(),
            theme: ChatTheme::default(),
            list_cursor: 0,
            option_cursor: 0,
            scroll: 0,
            show_help: false,
            status_message: Some("Enter abre un chat · s empieza · ? ayuda".to_string()),
            animation_frame: 0,
        }
    }

    /// Milliseconds since the app started.
    pub fn clock_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Advance the engine to the wall clock.
    pub fn tick(&mut self) {
        let now = self.clock_ms();
        self.tick_at(now);
    }

    /// Advance the engine to `now_ms` and fold its events into the UI.
    pub fn tick_at(&mut self, now_ms: u64) {
        self.animation_frame = self.animation_frame.wrapping_add(1);
        self.engine.tick(now_ms);
        self.absorb_events();
    }

    fn absorb_events(&mut self) {
        for event in self.engine.drain_events() {
            debug!(?event, "Engine event");
            match event {
                EngineEvent::StatusChanged(SessionStatus::Finished) => {
                    self.set_status("Simulación terminada");
                }
                EngineEvent::StatusChanged(SessionStatus::Terminated) => {
                    self.set_status("Simulación finalizada");
                }
                EngineEvent::OptionsOffered { .. } => {
                    self.option_cursor = 0;
                }
                EngineEvent::MessagePosted { channel, .. } => {
                    if self.engine.view() == View::Chat(channel) {
                        self.scroll = 0;
                    }
                }
                EngineEvent::CallRinging { .. } => {
                    self.set_status("Llamada entrante: a contesta · d rechaza");
                }
                EngineEvent::MasteryBlocked { topic, .. } => {
                    self.set_status(format!("Repasa el tema {topic} antes de seguir"));
                }
                EngineEvent::Completed(signal) => {
                    self.set_status(format!("Curso aprobado: {}/{}", signal.score, signal.total));
                }
                _ => {}
            }
        }
        self.clamp_cursors();
    }

    fn clamp_cursors(&mut self) {
        let channels = self.engine.router().entries().len();
        self.list_cursor = self.list_cursor.min(channels.saturating_sub(1));
        let options = self.engine.current_options().len();
        self.option_cursor = self.option_cursor.min(options.saturating_sub(1));
    }

    pub fn status(&self) -> SessionStatus {
        self.engine.status()
    }

    pub fn is_ringing(&self) -> bool {
        matches!(self.engine.call_state(), InterruptState::Ringing { .. })
    }

    /// Whether answer options should be shown for the open chat.
    pub fn options_visible(&self) -> bool {
        self.engine.view() == View::Chat(ChannelId::Partner)
            && self.engine.state().is_awaiting_answer()
    }

    // ------------------------------------------------------------------
    // Conversation list
    // ------------------------------------------------------------------

    pub fn cursor_down(&mut self) {
        match self.engine.view() {
            View::List => {
                let len = self.engine.router().entries().len();
                if self.list_cursor + 1 < len {
                    self.list_cursor += 1;
                }
            }
            View::Chat(_) if self.options_visible() => {
                let len = self.engine.current_options().len();
                if self.option_cursor + 1 < len {
                    self.option_cursor += 1;
                }
            }
            View::Chat(_) => self.scroll = self.scroll.saturating_sub(1),
        }
    }

    pub fn cursor_up(&mut self) {
        match self.engine.view() {
            View::List => self.list_cursor = self.list_cursor.saturating_sub(1),
            View::Chat(_) if self.options_visible() => {
                self.option_cursor = self.option_cursor.saturating_sub(1)
            }
            View::Chat(_) => self.scroll = self.scroll.saturating_add(1),
        }
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll = self.scroll.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    /// Open the highlighted conversation.
    pub fn open_selected(&mut self) {
        let Some(channel) = self
            .engine
            .router()
            .entries()
            .get(self.list_cursor)
            .map(|e| e.id)
        else {
            return;
        };
        self.open(channel);
    }

    pub fn open(&mut self, channel: ChannelId) {
        // Opening any chat counts as the first engagement.
        if self.status() == SessionStatus::Ready {
            self.start();
        }
        self.engine.select_channel(channel);
        self.scroll = 0;
        self.absorb_events();
    }

    pub fn back(&mut self) {
        self.engine.back();
        self.list_cursor = 0;
        self.absorb_events();
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    pub fn start(&mut self) {
        if self.engine.start() {
            self.set_status(format!("Modo: {}", mode_label(self.engine.mode())));
        }
        self.absorb_events();
    }

    /// Flip between practice and evaluation before the session starts.
    pub fn toggle_mode(&mut self) {
        let next = match self.engine.state().mode_or(self.engine.config().default_mode) {
            SessionMode::Practice => SessionMode::Evaluation,
            SessionMode::Evaluation => SessionMode::Practice,
        };
        if self.engine.select_mode(next) {
            self.set_status(format!("Modo: {}", mode_label(next)));
        } else {
            self.set_status("El modo solo se elige antes de empezar");
        }
    }

    /// Submit the option at `position` among those on offer.
    pub fn choose(&mut self, position: usize) {
        let Some(index) = self
            .engine
            .current_options()
            .get(position)
            .map(|(index, _)| *index)
        else {
            return;
        };
        if self.engine.submit_answer(index) {
            self.option_cursor = 0;
            self.scroll = 0;
        }
        self.absorb_events();
    }

    pub fn choose_highlighted(&mut self) {
        self.choose(self.option_cursor);
    }

    pub fn answer_call(&mut self) {
        if self.engine.answer_call() {
            self.set_status("Llamada contestada");
        }
        self.absorb_events();
    }

    pub fn decline_call(&mut self) {
        if self.engine.decline_call() {
            self.set_status("Llamada rechazada");
        }
        self.absorb_events();
    }

    pub fn click_banner(&mut self) {
        if let Some(BannerTarget::Channel(_)) = self.engine.click_banner() {
            self.scroll = 0;
        }
        self.absorb_events();
    }

    pub fn dismiss_banner(&mut self) {
        self.engine.dismiss_banner();
    }

    pub fn terminate(&mut self) {
        self.engine.terminate();
        self.absorb_events();
    }

    pub fn reset(&mut self) {
        self.engine.reset();
        self.list_cursor = 0;
        self.option_cursor = 0;
        self.scroll = 0;
        self.set_status("Simulación reiniciada");
        self.absorb_events();
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }
}

pub fn mode_label(mode: SessionMode) -> &'static str {
    match mode {
        SessionMode::Practice => "Práctica",
        SessionMode::Evaluation => "Evaluación",
    }
}
