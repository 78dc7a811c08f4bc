use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use lumina_core::ViewState;

use crate::app::{App, ChatFocus, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Cursor editing shared by the chat box and the API key box. Returns false
/// for keys it does not handle.
fn edit_line(input: &mut String, cursor: &mut usize, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(input, *cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if *cursor < input.chars().count() {
                let byte_pos = char_to_byte_index(input, *cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Left => *cursor = cursor.saturating_sub(1),
        KeyCode::Right => *cursor = (*cursor + 1).min(input.chars().count()),
        KeyCode::Home => *cursor = 0,
        KeyCode::End => *cursor = input.chars().count(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(input, *cursor);
            input.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => return false,
    }
    true
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await?,
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    // Any key dismisses the last notice
    app.notice = None;

    // Popups take every key while open
    if app.show_api_key_input {
        handle_api_key_input(app, key).await;
        return Ok(());
    }
    if app.show_provider_picker {
        handle_provider_picker(app, key).await;
        return Ok(());
    }
    if app.show_model_picker {
        handle_model_picker(app, key);
        return Ok(());
    }

    if app.chat_open {
        handle_chat(app, key);
        return Ok(());
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key).await,
        InputMode::Editing => handle_editing_mode(app, key),
    }
    Ok(())
}

async fn handle_api_key_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.cancel_api_key(),
        KeyCode::Enter => app.submit_api_key().await,
        _ => {
            edit_line(&mut app.api_key_input, &mut app.api_key_input_cursor, key);
        }
    }
}

async fn handle_provider_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.show_provider_picker = false,
        KeyCode::Char('j') | KeyCode::Down => app.provider_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.provider_picker_nav_up(),
        KeyCode::Enter => app.confirm_provider().await,
        _ => {}
    }
}

fn handle_model_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.show_model_picker = false,
        KeyCode::Char('j') | KeyCode::Down => app.model_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.model_picker_nav_up(),
        KeyCode::Enter => app.select_model(),
        _ => {}
    }
}

fn handle_chat(app: &mut App, key: KeyEvent) {
    match (app.chat_focus, key.code) {
        (_, KeyCode::Esc) => {
            if app.chat_focus == ChatFocus::Recommendations {
                app.chat_focus = ChatFocus::Input;
            } else {
                app.toggle_chat();
            }
        }
        (_, KeyCode::Tab) => {
            app.chat_focus = match app.chat_focus {
                ChatFocus::Input if !app.recommendations().is_empty() => {
                    if app.recommendation_state.selected().is_none() {
                        app.recommendation_state.select(Some(0));
                    }
                    ChatFocus::Recommendations
                }
                _ => ChatFocus::Input,
            };
        }
        (_, KeyCode::PageUp) => app.chat_scroll_up(app.chat_height.max(1)),
        (_, KeyCode::PageDown) => app.chat_scroll_down(app.chat_height.max(1)),

        (ChatFocus::Input, KeyCode::Enter) => app.submit_chat(),
        (ChatFocus::Input, KeyCode::Up) => app.chat_scroll_up(1),
        (ChatFocus::Input, KeyCode::Down) => app.chat_scroll_down(1),
        (ChatFocus::Input, _) => {
            edit_line(&mut app.chat_input, &mut app.chat_cursor, key);
        }

        (ChatFocus::Recommendations, KeyCode::Char('j') | KeyCode::Down) => {
            app.recommendation_nav_down()
        }
        (ChatFocus::Recommendations, KeyCode::Char('k') | KeyCode::Up) => {
            app.recommendation_nav_up()
        }
        (ChatFocus::Recommendations, KeyCode::Enter) => app.open_selected_recommendation(),
        (ChatFocus::Recommendations, _) => {}
    }
}

async fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    // Keys shared by every screen
    match key.code {
        KeyCode::Char('q') => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('a') => {
            app.toggle_chat();
            return;
        }
        KeyCode::Char('1') => {
            app.go_to(ViewState::Home);
            return;
        }
        KeyCode::Char('2') => {
            app.go_to(ViewState::Shop);
            return;
        }
        KeyCode::Char('3') | KeyCode::Char('b') => {
            app.go_to(ViewState::Cart);
            return;
        }
        KeyCode::Char('P') => {
            app.open_provider_picker();
            return;
        }
        KeyCode::Char('M') => {
            app.open_model_picker().await;
            return;
        }
        _ => {}
    }

    match app.view {
        ViewState::Home => handle_home(app, key),
        ViewState::Shop => handle_shop(app, key),
        ViewState::ProductDetails => handle_product(app, key),
        ViewState::Cart => handle_cart(app, key),
        ViewState::Checkout => handle_checkout(app, key),
    }
}

fn handle_home(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down | KeyCode::Char('l') | KeyCode::Right => {
            app.featured_nav_down()
        }
        KeyCode::Char('k') | KeyCode::Up | KeyCode::Char('h') | KeyCode::Left => {
            app.featured_nav_up()
        }
        KeyCode::Enter => app.open_selected_featured(),
        KeyCode::Char('s') => app.go_to(ViewState::Shop),
        _ => {}
    }
}

fn handle_shop(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.shop_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.shop_nav_up(),
        KeyCode::Char('l') | KeyCode::Right | KeyCode::Tab => app.next_category(),
        KeyCode::Char('h') | KeyCode::Left | KeyCode::BackTab => app.prev_category(),
        KeyCode::Enter => app.open_selected_shop_result(),
        KeyCode::Char('/') => app.input_mode = InputMode::Editing,
        KeyCode::Esc => {
            if app.search_input.is_empty() {
                app.go_to(ViewState::Home);
            } else {
                app.clear_search();
            }
        }
        _ => {}
    }
}

fn handle_product(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter | KeyCode::Char('c') => app.add_selected_to_cart(),
        KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('h') | KeyCode::Left => app.close_product(),
        _ => {}
    }
}

fn handle_cart(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.cart_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.cart_nav_up(),
        KeyCode::Char('d') | KeyCode::Delete => app.remove_selected_cart_item(),
        KeyCode::Char('o') => {
            let id = app
                .cart_state
                .selected()
                .and_then(|i| app.cart.items().get(i))
                .map(|item| item.product.id.clone());
            if let Some(id) = id {
                app.open_product(&id);
            }
        }
        // Checkout, or back to the shop when the bag is empty
        KeyCode::Enter => app.go_to(ViewState::Checkout),
        KeyCode::Esc => app.go_to(ViewState::Shop),
        _ => {}
    }
}

fn handle_checkout(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down | KeyCode::Tab => app.checkout.next_field(),
        KeyCode::Char('k') | KeyCode::Up | KeyCode::BackTab => app.checkout.prev_field(),
        KeyCode::Enter | KeyCode::Char('i') => app.input_mode = InputMode::Editing,
        KeyCode::Char('p') => app.pay(),
        KeyCode::Esc => app.go_to(ViewState::Cart),
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match app.view {
        ViewState::Shop => handle_search_editing(app, key),
        ViewState::Checkout => handle_checkout_editing(app, key),
        _ => app.input_mode = InputMode::Normal,
    }
}

fn handle_search_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            app.refresh_shop();
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Backspace => {
            app.search_input.pop();
            app.refresh_shop();
        }
        KeyCode::Char(c) => {
            app.search_input.push(c);
            app.refresh_shop();
        }
        _ => {}
    }
}

fn handle_checkout_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Enter => app.input_mode = InputMode::Normal,
        KeyCode::Tab => app.checkout.next_field(),
        KeyCode::BackTab => app.checkout.prev_field(),
        KeyCode::Backspace => app.checkout.pop_char(),
        KeyCode::Char(c) => {
            app.checkout.push_char(c);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_core::{Catalog, Config};
    use std::sync::Arc;

    fn app() -> App {
        App::new(Arc::new(Catalog::builtin()), Config::new(), None)
    }

    fn press(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    async fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, press(KeyCode::Char(c))).await.unwrap();
        }
    }

    #[test]
    fn test_char_to_byte_index() {
        assert_eq!(char_to_byte_index("héllo", 2), 3);
        assert_eq!(char_to_byte_index("abc", 10), 3);
    }

    #[test]
    fn test_edit_line_inserts_at_cursor() {
        let mut input = "ac".to_string();
        let mut cursor = 1;
        edit_line(&mut input, &mut cursor, KeyEvent::new(KeyCode::Char('b'), KeyModifiers::NONE));
        assert_eq!((input.as_str(), cursor), ("abc", 2));
        edit_line(&mut input, &mut cursor, KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE));
        assert_eq!((input.as_str(), cursor), ("ac", 1));
    }

    #[tokio::test]
    async fn test_shop_browse_and_add_to_bag() {
        let mut app = app();
        handle_event(&mut app, press(KeyCode::Char('2'))).await.unwrap();
        assert_eq!(app.view, ViewState::Shop);

        handle_event(&mut app, press(KeyCode::Char('/'))).await.unwrap();
        type_text(&mut app, "camera").await;
        handle_event(&mut app, press(KeyCode::Enter)).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Normal);
        assert_eq!(app.shop_results.len(), 1);

        handle_event(&mut app, press(KeyCode::Enter)).await.unwrap();
        assert_eq!(app.view, ViewState::ProductDetails);
        handle_event(&mut app, press(KeyCode::Char('c'))).await.unwrap();
        handle_event(&mut app, press(KeyCode::Char('c'))).await.unwrap();
        assert_eq!(app.cart.item_count(), 2);

        handle_event(&mut app, press(KeyCode::Char('b'))).await.unwrap();
        assert_eq!(app.view, ViewState::Cart);
        handle_event(&mut app, press(KeyCode::Enter)).await.unwrap();
        assert_eq!(app.view, ViewState::Checkout);
    }

    #[tokio::test]
    async fn test_checkout_typing_stays_in_form() {
        let mut app = app();
        app.open_product("5");
        app.add_selected_to_cart();
        app.go_to(ViewState::Checkout);

        handle_event(&mut app, press(KeyCode::Enter)).await.unwrap();
        type_text(&mut app, "qa@lumina.test").await;
        assert_eq!(app.view, ViewState::Checkout);
        assert!(!app.should_quit);
        handle_event(&mut app, press(KeyCode::Esc)).await.unwrap();

        handle_event(&mut app, press(KeyCode::Char('p'))).await.unwrap();
        assert!(app.notice.as_deref().unwrap().starts_with("Payments are disabled"));
        assert_eq!(app.cart.item_count(), 1);
    }

    #[tokio::test]
    async fn test_chat_input_captures_global_keys() {
        let mut app = app();
        handle_event(&mut app, press(KeyCode::Char('a'))).await.unwrap();
        assert!(app.chat_open);

        type_text(&mut app, "q1b").await;
        assert_eq!(app.chat_input, "q1b");
        assert!(!app.should_quit);
        assert_eq!(app.view, ViewState::Home);

        handle_event(&mut app, press(KeyCode::Esc)).await.unwrap();
        assert!(!app.chat_open);
        handle_event(&mut app, press(KeyCode::Char('q'))).await.unwrap();
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_ctrl_c_quits_from_popup() {
        let mut app = app();
        app.open_provider_picker();
        let ctrl_c = AppEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        handle_event(&mut app, ctrl_c).await.unwrap();
        assert!(app.should_quit);
    }
}
