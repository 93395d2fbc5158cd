//! Incoming call overlay

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget},
};

use crate::ui::theme::ChatTheme;

/// Full-screen incoming call with answer and decline keys.
pub struct CallWidget<'a> {
    caller: &'a str,
    icon: &'a str,
    theme: &'a ChatTheme,
    frame: u8,
}

impl<'a> CallWidget<'a> {
    pub fn new(caller: &'a str, icon: &'a str, theme: &'a ChatTheme) -> Self {
        Self {
            caller,
            icon,
            theme,
            frame: 0,
        }
    }

    /// Animation frame for the ringing pulse.
    pub fn frame(mut self, frame: u8) -> Self {
        self.frame = frame;
        self
    }
}

impl Widget for CallWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border_style(true))
            .style(Style::default().bg(self.theme.call_background));

        let pulse = match (self.frame / 5) % 3 {
            0 => "(  )",
            1 => "((  ))",
            _ => "(((  )))",
        };

        let lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                "Llamada entrante...",
                Style::default().add_modifier(Modifier::DIM),
            )),
            Line::from(""),
            Line::from(Span::raw(format!("{pulse} {} {pulse}", self.icon))),
            Line::from(""),
            Line::from(Span::styled(
                self.caller.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled(
                    " [d] Rechazar ",
                    Style::default().fg(Color::White).bg(Color::Red),
                ),
                Span::raw("     "),
                Span::styled(
                    " [a] Contestar ",
                    Style::default().fg(Color::Black).bg(Color::Green),
                ),
            ]),
        ];

        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(block)
            .render(area, buf);
    }
}
