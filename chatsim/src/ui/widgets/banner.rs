//! Notification banner widget

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget},
};

use chatsim_core::Banner;

use crate::ui::theme::ChatTheme;

/// A heads-up notification across the top of the screen.
pub struct BannerWidget<'a> {
    banner: &'a Banner,
    theme: &'a ChatTheme,
}

impl<'a> BannerWidget<'a> {
    pub fn new(banner: &'a Banner, theme: &'a ChatTheme) -> Self {
        Self { banner, theme }
    }
}

impl Widget for BannerWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);

        let hint = if self.banner.sticky {
            " [b abrir] "
        } else {
            " [b abrir · x cerrar] "
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title_bottom(hint)
            .border_style(self.theme.border_style(true))
            .style(Style::default().bg(self.theme.banner_background));

        let lines = vec![
            Line::from(vec![
                Span::raw(format!("{} ", self.banner.icon)),
                Span::styled(
                    self.banner.title.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(Span::styled(
                self.banner.message.clone(),
                self.theme.preview_style(false),
            )),
        ];

        Paragraph::new(lines).block(block).render(area, buf);
    }
}
