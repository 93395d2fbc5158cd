//! Event handling for the chat TUI

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind};

use chatsim_core::View;

use crate::app::App;

/// Result of handling an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    Continue,
    Quit,
    NeedsRedraw,
}

/// Handle a terminal event
pub fn handle_event(app: &mut App, event: Event) -> EventResult {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => handle_key_event(app, key),
        Event::Mouse(mouse) => handle_mouse_event(app, mouse),
        Event::Resize(_, _) => EventResult::NeedsRedraw,
        _ => EventResult::Continue,
    }
}

/// Handle a mouse event
fn handle_mouse_event(app: &mut App, mouse: MouseEvent) -> EventResult {
    match mouse.kind {
        MouseEventKind::ScrollUp => {
            app.scroll_up(3);
            EventResult::NeedsRedraw
        }
        MouseEventKind::ScrollDown => {
            app.scroll_down(3);
            EventResult::NeedsRedraw
        }
        _ => EventResult::Continue,
    }
}

/// Handle a key event
fn handle_key_event(app: &mut App, key: KeyEvent) -> EventResult {
    // Global shortcuts (always work)
    if let (KeyCode::Char('c'), KeyModifiers::CONTROL) = (key.code, key.modifiers) {
        return EventResult::Quit;
    }

    if app.show_help {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
            app.toggle_help();
        }
        return EventResult::NeedsRedraw;
    }

    // A ringing call takes the keyboard
    if app.is_ringing() {
        match key.code {
            KeyCode::Char('a') | KeyCode::Enter => app.answer_call(),
            KeyCode::Char('d') | KeyCode::Esc => app.decline_call(),
            _ => return EventResult::Continue,
        }
        return EventResult::NeedsRedraw;
    }

    match key.code {
        KeyCode::Char('q') => return EventResult::Quit,
        KeyCode::Char('?') => app.toggle_help(),
        KeyCode::Char('b') => app.click_banner(),
        KeyCode::Char('x') => app.dismiss_banner(),
        KeyCode::Char('r') => app.reset(),
        KeyCode::Char('t') => app.terminate(),
        KeyCode::Char('j') | KeyCode::Down => app.cursor_down(),
        KeyCode::Char('k') | KeyCode::Up => app.cursor_up(),
        KeyCode::PageUp => app.scroll_up(10),
        KeyCode::PageDown => app.scroll_down(10),
        _ => match app.engine.view() {
            View::List => handle_list_key(app, key),
            View::Chat(_) => handle_chat_key(app, key),
        },
    }
    EventResult::NeedsRedraw
}

fn handle_list_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => app.open_selected(),
        KeyCode::Char('s') => app.start(),
        KeyCode::Char('m') => app.toggle_mode(),
        _ => {}
    }
}

fn handle_chat_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('h') | KeyCode::Left => app.back(),
        KeyCode::Enter if app.options_visible() => app.choose_highlighted(),
        KeyCode::Char(c @ '1'..='9') if app.options_visible() => {
            if let Some(digit) = c.to_digit(10) {
                app.choose(digit as usize - 1);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatsim_core::{ChannelId, Engine, EngineConfig, Script, SessionStatus};

    fn app() -> App {
        let engine = Engine::with_script(EngineConfig::default(), Script::builtin().unwrap()).unwrap();
        App::new(engine)
    }

    fn press(app: &mut App, code: KeyCode) -> EventResult {
        handle_event(app, Event::Key(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    #[test]
    fn test_enter_opens_partner_chat() {
        let mut app = app();
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.engine.view(), View::Chat(ChannelId::Partner));
        assert_eq!(app.status(), SessionStatus::Playing);

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.engine.view(), View::List);
    }

    #[test]
    fn test_digit_submits_option() {
        let mut app = app();
        press(&mut app, KeyCode::Enter);
        app.tick_at(12_000);

        press(&mut app, KeyCode::Char('1'));
        assert_eq!(app.engine.state().score, 2);
        // Nothing on offer now.
        press(&mut app, KeyCode::Char('2'));
        assert_eq!(app.engine.state().answers.len(), 1);
    }

    #[test]
    fn test_ringing_call_captures_keys() {
        let mut app = app();
        app.start();
        app.tick_at(27_000);
        assert!(app.is_ringing());

        assert_eq!(press(&mut app, KeyCode::Char('q')), EventResult::Continue);
        press(&mut app, KeyCode::Char('a'));
        assert!(!app.is_ringing());
        assert_eq!(app.engine.view(), View::Chat(ChannelId::Supervisor));
    }

    #[test]
    fn test_ctrl_c_quits() {
        let mut app = app();
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(handle_event(&mut app, Event::Key(ctrl_c)), EventResult::Quit);
    }
}
