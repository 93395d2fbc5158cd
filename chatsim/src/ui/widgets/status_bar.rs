//! Status and hotkey bars

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use chatsim_core::{SessionStatus, View};

use crate::ui::theme::ChatTheme;

/// Score, mode and the latest status message.
pub struct StatusBarWidget<'a> {
    status: SessionStatus,
    mode: &'a str,
    score: u32,
    total: u32,
    step: usize,
    steps: usize,
    theme: &'a ChatTheme,
    message: Option<&'a str>,
}

impl<'a> StatusBarWidget<'a> {
    pub fn new(status: SessionStatus, mode: &'a str, theme: &'a ChatTheme) -> Self {
        Self {
            status,
            mode,
            score: 0,
            total: 0,
            step: 0,
            steps: 0,
            theme,
            message: None,
        }
    }

    pub fn score(mut self, score: u32, total: u32) -> Self {
        self.score = score;
        self.total = total;
        self
    }

    pub fn progress(mut self, step: usize, steps: usize) -> Self {
        self.step = step;
        self.steps = steps;
        self
    }

    pub fn message(mut self, message: Option<&'a str>) -> Self {
        self.message = message;
        self
    }
}

impl Widget for StatusBarWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border_style(false));

        let progress = if self.steps == 0 {
            "-".to_string()
        } else {
            format!("{}/{}", (self.step + 1).min(self.steps), self.steps)
        };

        let mut spans = vec![
            Span::styled(
                self.status.as_str().to_uppercase(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(" | "),
            Span::raw(self.mode.to_string()),
            Span::raw(" | "),
            Span::raw(format!("Pregunta {progress}")),
            Span::raw(" | "),
            Span::styled(
                format!("Puntaje {}/{}", self.score, self.total),
                self.theme.header_style(),
            ),
        ];
        if let Some(message) = self.message {
            spans.push(Span::raw(" | "));
            spans.push(Span::styled(
                message.to_string(),
                Style::default().add_modifier(Modifier::DIM),
            ));
        }

        Paragraph::new(Line::from(spans)).block(block).render(area, buf);
    }
}

/// Key hints for the current view.
pub struct HotkeyBarWidget<'a> {
    view: View,
    status: SessionStatus,
    theme: &'a ChatTheme,
}

impl<'a> HotkeyBarWidget<'a> {
    pub fn new(view: View, status: SessionStatus, theme: &'a ChatTheme) -> Self {
        Self {
            view,
            status,
            theme,
        }
    }
}

impl Widget for HotkeyBarWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let hints: &[(&str, &str)] = match (self.view, self.status) {
            (View::List, SessionStatus::Ready) => {
                &[("Enter", "abrir"), ("s", "empezar"), ("m", "modo"), ("?", "ayuda"), ("q", "salir")]
            }
            (View::List, _) => &[("Enter", "abrir"), ("r", "reiniciar"), ("t", "terminar"), ("?", "ayuda"), ("q", "salir")],
            (View::Chat(_), _) => &[("1-9", "responder"), ("Esc", "volver"), ("PgUp/PgDn", "scroll"), ("?", "ayuda")],
        };

        let mut spans = Vec::new();
        for (key, action) in hints {
            spans.push(Span::styled(format!(" {key} "), self.theme.badge_style()));
            spans.push(Span::raw(format!(" {action}  ")));
        }
        Paragraph::new(Line::from(spans)).render(area, buf);
    }
}
