//! Render orchestration for the chat TUI

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use chatsim_core::{ChannelId, View};

use crate::app::{mode_label, App};
use crate::ui::layout::{centered_rect_fixed, top_strip, AppLayout};
use crate::ui::widgets::{
    BannerWidget, CallWidget, ChatListWidget, ConfettiWidget, ConversationWidget,
    HotkeyBarWidget, OptionsWidget, StatusBarWidget,
};

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let options_height = if app.options_visible() {
        OptionsWidget::height_for(app.engine.current_options().len())
    } else {
        0
    };
    let layout = AppLayout::calculate(area, options_height);

    render_title_bar(frame, app, layout.title_area);

    match app.engine.view() {
        View::List => render_list(frame, app, layout.main_area),
        View::Chat(channel) => render_chat(frame, app, channel, layout.main_area),
    }

    if options_height > 0 {
        let options = app
            .engine
            .current_options()
            .into_iter()
            .map(|(_, o)| o)
            .collect();
        let widget = OptionsWidget::new(options, &app.theme).selected(app.option_cursor);
        frame.render_widget(widget, layout.options_area);
    }

    render_status_bar(frame, app, layout.status_bar);
    frame.render_widget(
        HotkeyBarWidget::new(app.engine.view(), app.status(), &app.theme),
        layout.hotkey_bar,
    );

    // Overlays, lowest first
    let confetti = app.engine.confetti();
    if !confetti.is_empty() {
        frame.render_widget(ConfettiWidget::new(confetti, app.animation_frame), layout.main_area);
    }

    if let Some(banner) = app.engine.banner() {
        frame.render_widget(BannerWidget::new(banner, &app.theme), top_strip(4, area));
    }

    if app.is_ringing() {
        let (caller, icon) = app.engine.caller();
        let popup = centered_rect_fixed(40, 12, area);
        frame.render_widget(
            CallWidget::new(&caller, &icon, &app.theme).frame(app.animation_frame),
            popup,
        );
    }

    if app.show_help {
        render_help_overlay(frame, app, area);
    }
}

/// Render the title bar
fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = app
        .engine
        .script()
        .map(|s| s.title.as_str())
        .unwrap_or("Sin guion");
    let vibrating = if app.engine.is_vibrating() { " 📳" } else { "" };

    let line = Line::from(Span::styled(
        format!(" {title}{vibrating} "),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    ));
    frame.render_widget(Paragraph::new(line), area);
}

fn render_list(frame: &mut Frame, app: &App, area: Rect) {
    let widget = ChatListWidget::new(app.engine.router().entries(), &app.theme)
        .selected(app.list_cursor)
        .typing(app.engine.typing());
    frame.render_widget(widget, area);
}

fn render_chat(frame: &mut Frame, app: &App, channel: ChannelId, area: Rect) {
    let router = app.engine.router();
    let title = router
        .entry(channel)
        .map(|e| format!("{} {}", e.avatar, e.name))
        .unwrap_or_else(|| channel.to_string());

    let widget = ConversationWidget::new(router.history(channel), &app.theme)
        .title(title)
        .scroll(app.scroll)
        .typing(app.engine.typing() == Some(channel));
    frame.render_widget(widget, area);
}

/// Render the status bar
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let state = app.engine.state();
    let steps = app.engine.script().map(|s| s.len()).unwrap_or(0);
    let widget = StatusBarWidget::new(app.status(), mode_label(app.engine.mode()), &app.theme)
        .score(state.score, app.engine.config().total_score)
        .progress(state.step, steps)
        .message(app.status_message());
    frame.render_widget(widget, area);
}

/// Render help overlay
fn render_help_overlay(frame: &mut Frame, app: &App, area: Rect) {
    let popup_area = centered_rect_fixed(54, 22, area);

    // Clear the background
    frame.render_widget(Clear, popup_area);

    let heading = |text: &'static str| {
        Line::from(Span::styled(
            text,
            Style::default().add_modifier(Modifier::UNDERLINED),
        ))
    };

    let help_text = vec![
        Line::from(Span::styled(
            " Simulador de chat - Ayuda ",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        heading("Lista de chats:"),
        Line::from("  j/k or ↑/↓     Mover selección"),
        Line::from("  Enter          Abrir chat"),
        Line::from("  s              Empezar"),
        Line::from("  m              Cambiar modo (antes de empezar)"),
        Line::from(""),
        heading("En un chat:"),
        Line::from("  1-9            Elegir respuesta"),
        Line::from("  j/k + Enter    Mover y confirmar"),
        Line::from("  PgUp/PgDn      Scroll"),
        Line::from("  Esc or h       Volver a la lista"),
        Line::from(""),
        heading("Siempre:"),
        Line::from("  a/d            Contestar/rechazar llamada"),
        Line::from("  b/x            Abrir/cerrar notificación"),
        Line::from("  r/t            Reiniciar/terminar"),
        Line::from("  q or Ctrl+c    Salir"),
        Line::from(""),
        Line::from(Span::styled(
            "Presiona Esc o ? para cerrar",
            Style::default().add_modifier(Modifier::DIM),
        )),
    ];

    let block = Block::default()
        .title(" Ayuda ")
        .borders(Borders::ALL)
        .border_style(app.theme.border_style(true));

    let paragraph = Paragraph::new(help_text)
        .block(block)
        .wrap(Wrap { trim: false });

    frame.render_widget(paragraph, popup_area);
}
