//! Color theme and styling for the chat TUI

use ratatui::style::{Color, Modifier, Style};

use chatsim_core::MessageKind;

/// Chat UI color theme
#[derive(Debug, Clone)]
pub struct ChatTheme {
    // Base colors
    pub foreground: Color,
    pub border: Color,
    pub border_focused: Color,
    pub header: Color,

    // Message colors
    pub user_text: Color,
    pub ai_text: Color,
    pub system_text: Color,
    pub media_text: Color,
    pub link_text: Color,

    // List colors
    pub unread_badge: Color,
    pub preview_text: Color,

    // Options
    pub option_text: Color,
    pub option_selected: Color,

    // Overlays
    pub banner_background: Color,
    pub call_background: Color,
}

impl Default for ChatTheme {
    fn default() -> Self {
        Self {
            foreground: Color::White,
            border: Color::DarkGray,
            border_focused: Color::Green,
            header: Color::LightGreen,

            user_text: Color::LightGreen,
            ai_text: Color::White,
            system_text: Color::Yellow,
            media_text: Color::LightBlue,
            link_text: Color::Cyan,

            unread_badge: Color::Green,
            preview_text: Color::Gray,

            option_text: Color::White,
            option_selected: Color::LightGreen,

            banner_background: Color::Rgb(32, 44, 51),
            call_background: Color::Rgb(11, 20, 26),
        }
    }
}

impl ChatTheme {
    /// Style for a message body by kind
    pub fn message_style(&self, kind: MessageKind) -> Style {
        match kind {
            MessageKind::User => Style::default().fg(self.user_text),
            MessageKind::Ai => Style::default().fg(self.ai_text),
            MessageKind::System => Style::default()
                .fg(self.system_text)
                .add_modifier(Modifier::ITALIC),
            MessageKind::Image | MessageKind::Document | MessageKind::Audio => {
                Style::default().fg(self.media_text)
            }
            MessageKind::Sticker => Style::default().add_modifier(Modifier::BOLD),
            MessageKind::ContactLink => Style::default()
                .fg(self.link_text)
                .add_modifier(Modifier::UNDERLINED),
        }
    }

    pub fn timestamp_style(&self) -> Style {
        Style::default()
            .fg(self.border)
            .add_modifier(Modifier::DIM)
    }

    pub fn preview_style(&self, unread: bool) -> Style {
        if unread {
            Style::default()
                .fg(self.foreground)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(self.preview_text)
        }
    }

    pub fn badge_style(&self) -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(self.unread_badge)
            .add_modifier(Modifier::BOLD)
    }

    pub fn option_style(&self, selected: bool) -> Style {
        if selected {
            Style::default()
                .fg(self.option_selected)
                .add_modifier(Modifier::BOLD | Modifier::REVERSED)
        } else {
            Style::default().fg(self.option_text)
        }
    }

    /// Get border style
    pub fn border_style(&self, focused: bool) -> Style {
        Style::default().fg(if focused {
            self.border_focused
        } else {
            self.border
        })
    }

    pub fn header_style(&self) -> Style {
        Style::default()
            .fg(self.header)
            .add_modifier(Modifier::BOLD)
    }
}
