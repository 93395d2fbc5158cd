//! Answer options widget

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use chatsim_core::script::OptionStyle;
use chatsim_core::ScriptOption;

use crate::ui::theme::ChatTheme;

/// The options on offer, numbered from 1.
pub struct OptionsWidget<'a> {
    options: Vec<&'a ScriptOption>,
    theme: &'a ChatTheme,
    selected: usize,
}

impl<'a> OptionsWidget<'a> {
    pub fn new(options: Vec<&'a ScriptOption>, theme: &'a ChatTheme) -> Self {
        Self {
            options,
            theme,
            selected: 0,
        }
    }

    pub fn selected(mut self, selected: usize) -> Self {
        self.selected = selected;
        self
    }

    /// Rows needed to show `count` options inside a border.
    pub fn height_for(count: usize) -> u16 {
        if count == 0 {
            0
        } else {
            count as u16 + 2
        }
    }
}

fn style_tag(style: Option<OptionStyle>) -> &'static str {
    match style {
        Some(OptionStyle::Truth) => "✔ ",
        Some(OptionStyle::Myth) => "✘ ",
        None => "",
    }
}

impl Widget for OptionsWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" Responde [1-9 / j k Enter] ")
            .borders(Borders::ALL)
            .border_style(self.theme.border_style(true));

        let inner = block.inner(area);
        block.render(area, buf);

        let lines: Vec<Line> = self
            .options
            .iter()
            .enumerate()
            .map(|(i, option)| {
                let style = self.theme.option_style(i == self.selected);
                Line::from(Span::styled(
                    format!("{}. {}{}", i + 1, style_tag(option.style), option.text),
                    style,
                ))
            })
            .collect();

        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .render(inner, buf);
    }
}
