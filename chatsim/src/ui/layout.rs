//! Screen layout for the chat TUI

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Areas of the main screen.
pub struct AppLayout {
    pub title_area: Rect,
    pub main_area: Rect,
    pub options_area: Rect,
    pub status_bar: Rect,
    pub hotkey_bar: Rect,
}

impl AppLayout {
    /// Split the screen; `options_height` is zero when nothing is on offer.
    pub fn calculate(area: Rect, options_height: u16) -> Self {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(5),
                Constraint::Length(options_height),
                Constraint::Length(3),
                Constraint::Length(1),
            ])
            .split(area);

        Self {
            title_area: chunks[0],
            main_area: chunks[1],
            options_area: chunks[2],
            status_bar: chunks[3],
            hotkey_bar: chunks[4],
        }
    }
}

/// A rectangle of fixed size centered in `area`, clipped to fit.
pub fn centered_rect_fixed(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// A full-width strip along the top of `area`.
pub fn top_strip(height: u16, area: Rect) -> Rect {
    Rect {
        height: height.min(area.height),
        ..area
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect_clips_to_area() {
        let area = Rect::new(0, 0, 20, 10);
        let rect = centered_rect_fixed(50, 4, area);
        assert_eq!(rect, Rect::new(0, 3, 20, 4));
    }

    #[test]
    fn test_layout_without_options() {
        let layout = AppLayout::calculate(Rect::new(0, 0, 80, 24), 0);
        assert_eq!(layout.options_area.height, 0);
        assert_eq!(layout.main_area.height, 24 - 1 - 3 - 1);
    }
}
