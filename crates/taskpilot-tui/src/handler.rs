use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Lines moved per mouse wheel notch.
const WHEEL_STEP: u16 = 3;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
        AppEvent::Completion(result) => app.on_completion(result),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Char('i') | KeyCode::Enter | KeyCode::Char('/') => {
            app.input_mode = InputMode::Editing;
        }

        KeyCode::Char('j') | KeyCode::Down => app.view.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.view.scroll_up(1),
        KeyCode::PageDown => app.view.page_down(),
        KeyCode::PageUp => app.view.page_up(),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => app.view.page_down(),
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => app.view.page_up(),
        KeyCode::Char('g') | KeyCode::Home => app.view.scroll_up(u16::MAX),
        KeyCode::Char('G') | KeyCode::End => app.view.scroll_to_bottom(),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => app.submit(),
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.cursor = (app.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.cursor = 0;
        }
        KeyCode::End => {
            app.cursor = app.input.chars().count();
        }
        // The message list stays scrollable while typing
        KeyCode::PageUp => app.view.page_up(),
        KeyCode::PageDown => app.view.page_down(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.cursor);
            app.input.insert(byte_pos, c);
            app.cursor += 1;
        }
        _ => {}
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    let in_chat = app.chat_area.is_some_and(|r| point_in_rect(x, y, r));
    let on_jump = app.jump_area.is_some_and(|r| point_in_rect(x, y, r));

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) if on_jump => app.view.scroll_to_bottom(),
        MouseEventKind::ScrollDown if in_chat => app.view.scroll_down(WHEEL_STEP),
        MouseEventKind::ScrollUp if in_chat => app.view.scroll_up(WHEEL_STEP),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};
    use taskpilot_core::{AzureClient, ChatMessage};
    use tokio::sync::mpsc;

    fn test_app() -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = AzureClient::new("http://127.0.0.1:9/chat", None);
        (App::new(client, tx), rx)
    }

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c))).unwrap();
        }
    }

    fn lay_out_at_bottom(app: &mut App) {
        app.view.scroll_to_bottom();
        app.view.set_geometry(10, 40);
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> AppEvent {
        AppEvent::Mouse(MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn test_char_to_byte_index() {
        assert_eq!(char_to_byte_index("héllo", 0), 0);
        assert_eq!(char_to_byte_index("héllo", 2), 3);
        assert_eq!(char_to_byte_index("héllo", 99), 6);
    }

    #[test]
    fn test_point_in_rect() {
        let r = Rect::new(2, 2, 4, 2);
        assert!(point_in_rect(2, 2, r));
        assert!(point_in_rect(5, 3, r));
        assert!(!point_in_rect(6, 3, r));
        assert!(!point_in_rect(3, 4, r));
    }

    #[tokio::test]
    async fn test_editing_is_utf8_safe() {
        let (mut app, _rx) = test_app();
        type_text(&mut app, "añb");
        handle_event(&mut app, key(KeyCode::Left)).unwrap();
        handle_event(&mut app, key(KeyCode::Backspace)).unwrap();
        assert_eq!(app.input, "ab");
        assert_eq!(app.cursor, 1);

        handle_event(&mut app, key(KeyCode::Char('é'))).unwrap();
        handle_event(&mut app, key(KeyCode::Home)).unwrap();
        handle_event(&mut app, key(KeyCode::Delete)).unwrap();
        assert_eq!(app.input, "éb");
        assert_eq!(app.cursor, 0);
    }

    #[tokio::test]
    async fn test_enter_submits() {
        let (mut app, _rx) = test_app();
        type_text(&mut app, "Plan my week");
        handle_event(&mut app, key(KeyCode::Enter)).unwrap();

        assert!(app.input.is_empty());
        assert_eq!(app.controller.log().visible(), &[ChatMessage::user("Plan my week")]);
    }

    #[tokio::test]
    async fn test_enter_on_blank_input_does_nothing() {
        let (mut app, _rx) = test_app();
        type_text(&mut app, "  ");
        handle_event(&mut app, key(KeyCode::Enter)).unwrap();
        assert_eq!(app.input, "  ");
        assert_eq!(app.controller.log().visible_len(), 0);
    }

    #[tokio::test]
    async fn test_mode_switching_and_quit() {
        let (mut app, _rx) = test_app();
        assert_eq!(app.input_mode, InputMode::Editing);

        // q is text while editing
        handle_event(&mut app, key(KeyCode::Char('q'))).unwrap();
        assert!(!app.should_quit);
        assert_eq!(app.input, "q");

        handle_event(&mut app, key(KeyCode::Esc)).unwrap();
        assert_eq!(app.input_mode, InputMode::Normal);
        handle_event(&mut app, key(KeyCode::Char('i'))).unwrap();
        assert_eq!(app.input_mode, InputMode::Editing);

        handle_event(&mut app, key(KeyCode::Esc)).unwrap();
        handle_event(&mut app, key(KeyCode::Char('q'))).unwrap();
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_ctrl_c_quits_while_editing() {
        let (mut app, _rx) = test_app();
        let event = KeyEvent {
            code: KeyCode::Char('c'),
            modifiers: KeyModifiers::CONTROL,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        };
        handle_event(&mut app, AppEvent::Key(event)).unwrap();
        assert!(app.should_quit);
        assert!(app.input.is_empty());
    }

    #[tokio::test]
    async fn test_normal_mode_scrolling() {
        let (mut app, _rx) = test_app();
        app.input_mode = InputMode::Normal;
        lay_out_at_bottom(&mut app);
        assert_eq!(app.view.offset(), 30);

        handle_event(&mut app, key(KeyCode::Char('k'))).unwrap();
        assert_eq!(app.view.offset(), 29);
        handle_event(&mut app, key(KeyCode::PageUp)).unwrap();
        assert_eq!(app.view.offset(), 20);
        handle_event(&mut app, key(KeyCode::Char('g'))).unwrap();
        assert_eq!(app.view.offset(), 0);
        assert!(app.view.show_jump_control());

        handle_event(&mut app, key(KeyCode::Char('G'))).unwrap();
        app.view.set_geometry(10, 40);
        assert_eq!(app.view.offset(), 30);
        assert!(!app.view.show_jump_control());
    }

    #[tokio::test]
    async fn test_wheel_scrolls_only_inside_chat() {
        let (mut app, _rx) = test_app();
        lay_out_at_bottom(&mut app);
        app.chat_area = Some(Rect::new(0, 1, 80, 10));

        handle_event(&mut app, mouse(MouseEventKind::ScrollUp, 5, 5)).unwrap();
        assert_eq!(app.view.offset(), 27);
        handle_event(&mut app, mouse(MouseEventKind::ScrollUp, 5, 20)).unwrap();
        assert_eq!(app.view.offset(), 27);
        handle_event(&mut app, mouse(MouseEventKind::ScrollDown, 5, 5)).unwrap();
        assert_eq!(app.view.offset(), 30);
    }

    #[tokio::test]
    async fn test_click_on_jump_control() {
        let (mut app, _rx) = test_app();
        app.view.set_geometry(10, 40);
        app.view.scroll_up(u16::MAX);
        app.jump_area = Some(Rect::new(60, 9, 20, 1));

        handle_event(&mut app, mouse(MouseEventKind::Down(MouseButton::Left), 1, 1)).unwrap();
        app.view.set_geometry(10, 40);
        assert_eq!(app.view.offset(), 0);

        handle_event(&mut app, mouse(MouseEventKind::Down(MouseButton::Left), 65, 9)).unwrap();
        app.view.set_geometry(10, 40);
        assert_eq!(app.view.offset(), 30);
    }

    #[tokio::test]
    async fn test_tick_animates_only_while_busy() {
        let (mut app, _rx) = test_app();
        handle_event(&mut app, AppEvent::Tick).unwrap();
        assert_eq!(app.animation_frame, 0);
    }
}
