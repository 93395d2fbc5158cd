//! Conversation list widget

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use chatsim_core::ChannelEntry;

use crate::ui::theme::ChatTheme;

/// The inbox: one row per channel, newest activity first.
pub struct ChatListWidget<'a> {
    entries: &'a [ChannelEntry],
    theme: &'a ChatTheme,
    selected: usize,
    typing: Option<chatsim_core::ChannelId>,
}

impl<'a> ChatListWidget<'a> {
    pub fn new(entries: &'a [ChannelEntry], theme: &'a ChatTheme) -> Self {
        Self {
            entries,
            theme,
            selected: 0,
            typing: None,
        }
    }

    pub fn selected(mut self, selected: usize) -> Self {
        self.selected = selected;
        self
    }

    pub fn typing(mut self, typing: Option<chatsim_core::ChannelId>) -> Self {
        self.typing = typing;
        self
    }
}

impl Widget for ChatListWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" Chats ")
            .borders(Borders::ALL)
            .border_style(self.theme.border_style(true));

        let inner = block.inner(area);
        block.render(area, buf);

        let mut lines: Vec<Line> = Vec::new();
        for (i, entry) in self.entries.iter().enumerate() {
            let is_selected = i == self.selected;
            let marker = if is_selected { "▶ " } else { "  " };
            let name_style = if is_selected {
                self.theme.header_style().add_modifier(Modifier::REVERSED)
            } else {
                self.theme.header_style()
            };

            let mut header = vec![
                Span::raw(marker),
                Span::raw(format!("{} ", entry.avatar)),
                Span::styled(entry.name.clone(), name_style),
                Span::raw("  "),
                Span::styled(entry.last_time.clone(), self.theme.timestamp_style()),
            ];
            if entry.unread_count > 0 {
                header.push(Span::raw(" "));
                header.push(Span::styled(
                    format!(" {} ", entry.unread_count),
                    self.theme.badge_style(),
                ));
            }
            lines.push(Line::from(header));

            let preview = if self.typing == Some(entry.id) {
                Span::styled(
                    "escribiendo...",
                    Style::default()
                        .fg(self.theme.header)
                        .add_modifier(Modifier::ITALIC),
                )
            } else {
                Span::styled(
                    entry.last_preview.clone(),
                    self.theme.preview_style(entry.unread_count > 0),
                )
            };
            lines.push(Line::from(vec![Span::raw("     "), preview]));
            lines.push(Line::from(""));
        }

        if lines.is_empty() {
            lines.push(Line::from(Span::styled(
                "Sin conversaciones",
                self.theme.timestamp_style(),
            )));
        }

        Paragraph::new(lines).render(inner, buf);
    }
}
