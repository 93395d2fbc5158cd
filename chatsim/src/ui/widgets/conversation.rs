//! Conversation display widget

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    symbols::scrollbar,
    text::{Line, Span},
    widgets::{
        Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState,
        StatefulWidget, Widget, Wrap,
    },
};

use chatsim_core::{ChannelMessage, MessageKind};

use crate::ui::theme::ChatTheme;

/// Widget for one channel's history
pub struct ConversationWidget<'a> {
    messages: &'a [ChannelMessage],
    title: String,
    theme: &'a ChatTheme,
    /// Lines scrolled up from the bottom.
    scroll: usize,
    typing: bool,
}

impl<'a> ConversationWidget<'a> {
    pub fn new(messages: &'a [ChannelMessage], theme: &'a ChatTheme) -> Self {
        Self {
            messages,
            title: String::new(),
            theme,
            scroll: 0,
            typing: false,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn scroll(mut self, scroll: usize) -> Self {
        self.scroll = scroll;
        self
    }

    pub fn typing(mut self, typing: bool) -> Self {
        self.typing = typing;
        self
    }
}

/// Display text for a message body, with markdown emphasis stripped.
pub fn message_body(message: &ChannelMessage) -> String {
    let content = message.content.replace("**", "");
    match message.kind {
        MessageKind::Image => format!("📷 {content}"),
        MessageKind::Document => {
            let name = message.file_name.as_deref().unwrap_or("Documento");
            match message.pages.as_deref() {
                Some(pages) => format!("📄 {name} · {pages}"),
                None => format!("📄 {name}"),
            }
        }
        MessageKind::Audio => match message.duration.as_deref() {
            Some(duration) => format!("🎤 ▶ ━━━━━━━━ {duration}"),
            None => "🎤 ▶ ━━━━━━━━".to_string(),
        },
        MessageKind::ContactLink => {
            let label = message.action_label.as_deref().unwrap_or("Abrir");
            format!("👤 {content}  [{label}]")
        }
        _ => content,
    }
}

impl Widget for ConversationWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(format!(" {} [Esc volver] ", self.title))
            .borders(Borders::ALL)
            .border_style(self.theme.border_style(true));

        let inner = block.inner(area);
        block.render(area, buf);

        let mut lines: Vec<Line> = Vec::new();
        for message in self.messages {
            let style = self.theme.message_style(message.kind);
            let alignment = match message.kind {
                MessageKind::User => Alignment::Right,
                MessageKind::System => Alignment::Center,
                _ => Alignment::Left,
            };

            for text in message_body(message).lines() {
                lines.push(Line::from(Span::styled(text.to_string(), style)).alignment(alignment));
            }
            let stamp = match message.kind {
                MessageKind::User => format!("{} ✓✓", message.timestamp),
                _ => message.timestamp.clone(),
            };
            lines.push(
                Line::from(Span::styled(stamp, self.theme.timestamp_style())).alignment(alignment),
            );
            lines.push(Line::from(""));
        }

        if self.typing {
            lines.push(Line::from(Span::styled(
                "escribiendo...",
                Style::default()
                    .fg(self.theme.header)
                    .add_modifier(Modifier::ITALIC),
            )));
        }

        // Anchor to the newest message unless scrolled
        let visible_height = inner.height as usize;
        let total_lines = lines.len();
        let max_scroll = total_lines.saturating_sub(visible_height);
        let top = max_scroll - self.scroll.min(max_scroll);

        Paragraph::new(lines)
            .scroll((top as u16, 0))
            .wrap(Wrap { trim: false })
            .render(inner, buf);

        if total_lines > visible_height {
            let scrollbar_area = Rect {
                x: inner.x + inner.width.saturating_sub(1),
                y: inner.y,
                width: 1,
                height: inner.height,
            };

            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .symbols(scrollbar::VERTICAL)
                .thumb_style(Style::default().fg(Color::DarkGray))
                .track_style(Style::default().fg(Color::Black))
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"));

            let mut scrollbar_state = ScrollbarState::new(max_scroll).position(top);
            scrollbar.render(scrollbar_area, buf, &mut scrollbar_state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatsim_core::MessageId;

    fn message(kind: MessageKind, content: &str) -> ChannelMessage {
        ChannelMessage {
            id: MessageId(1),
            kind,
            content: content.to_string(),
            timestamp: "08:12".to_string(),
            file_name: None,
            pages: None,
            duration: None,
            action_label: None,
            origin: None,
        }
    }

    #[test]
    fn test_body_strips_emphasis() {
        let m = message(MessageKind::Ai, "🏁 **Evaluación Final**");
        assert_eq!(message_body(&m), "🏁 Evaluación Final");
    }

    #[test]
    fn test_document_body_uses_metadata() {
        let mut m = message(MessageKind::Document, "Licencia");
        m.file_name = Some("Licencia_Medica_Nico.pdf".to_string());
        m.pages = Some("1 pág • PDF".to_string());
        assert_eq!(message_body(&m), "📄 Licencia_Medica_Nico.pdf · 1 pág • PDF");
    }

    #[test]
    fn test_contact_link_shows_action() {
        let mut m = message(MessageKind::ContactLink, "Evaluación");
        m.action_label = Some("Ver mensaje".to_string());
        assert_eq!(message_body(&m), "👤 Evaluación  [Ver mensaje]");
    }
}
