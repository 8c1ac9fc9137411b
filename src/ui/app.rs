use std::io::stdout;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;
use tui_widgets::popup::PopupState;

use crate::client::ContactService;
use crate::config::{Config, UiColors};
use crate::controller::Controller;

use super::draw;
use super::form::{AddForm, FormField};

pub struct App<'a, S: ContactService> {
    config: &'a Config,
    pub controller: Controller<S>,
    pub search_input: Input,
    pub search_active: bool,
    /// Index into the favorites-then-others order
    pub selected: usize,
    pub add_form: AddForm,
    // Popup state for the confirm dialog (tui-widgets popup)
    pub modal_popup: PopupState,
}

impl<'a, S: ContactService> App<'a, S> {
    pub fn new(config: &'a Config, mut controller: Controller<S>) -> Self {
        controller.load();
        Self {
            config,
            controller,
            search_input: Input::default(),
            search_active: false,
            selected: 0,
            add_form: AddForm::new(&config.default_country),
            modal_popup: PopupState::default(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop<B>(&mut self, terminal: &mut Terminal<B>) -> Result<()>
    where
        B: ratatui::backend::Backend,
    {
        loop {
            draw::render(terminal, self)?;

            if event::poll(Duration::from_millis(250))? {
                if let Event::Key(key) = event::read()? {
                    if self.handle_key(key) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Returns true when the app should quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        // Ctrl+C always quits
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
        {
            return true;
        }

        let had_modal = self.controller.confirm_modal().is_some();

        let quit = if had_modal {
            self.handle_confirm_modal_key(key);
            false
        } else if self.controller.add_view_open() {
            self.handle_form_key(key);
            false
        } else if self.search_active {
            self.handle_search_key(key);
            false
        } else {
            self.handle_list_key(key)
        };

        if !had_modal && self.controller.confirm_modal().is_some() {
            self.modal_popup = PopupState::default();
        }
        self.clamp_selection();
        quit
    }

    fn handle_confirm_modal_key(&mut self, key: KeyEvent) {
        let config = self.config;
        let modal_keys = &config.keys.modal;

        if key_matches_any(&key, &modal_keys.cancel) {
            self.controller.cancel();
        } else if key_matches_any(&key, &modal_keys.confirm) {
            self.controller.confirm();
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        let config = self.config;
        let form_keys = &config.keys.form;

        if key_matches_any(&key, &form_keys.cancel) {
            self.controller.close_add_view();
            return;
        }

        if key_matches_any(&key, &form_keys.submit) {
            match self.controller.submit_contact(&self.add_form.to_contact_form()) {
                Ok(id) => self.select_id(id),
                Err(err) => self.add_form.error = Some(err.to_string()),
            }
            return;
        }

        if key_matches_any(&key, &form_keys.next_field) {
            self.add_form.focus_next();
            return;
        }
        if key_matches_any(&key, &form_keys.prev_field) {
            self.add_form.focus_prev();
            return;
        }

        if self.add_form.focus == FormField::Country {
            if key_matches_any(&key, &form_keys.next_country) {
                self.add_form.cycle_country(1);
            } else if key_matches_any(&key, &form_keys.prev_country) {
                self.add_form.cycle_country(-1);
            }
            return;
        }

        self.add_form.handle_key_event(key);
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        // Leaving the search box keeps the filter.
        if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Down | KeyCode::Tab) {
            self.search_active = false;
            return;
        }

        if let Some(change) = self.search_input.handle_event(&Event::Key(key)) {
            if change.value {
                self.controller.set_search(self.search_input.value());
                self.selected = 0;
            }
        }
    }

    fn handle_list_key(&mut self, key: KeyEvent) -> bool {
        let config = self.config;
        let global = &config.keys.global;
        let list = &config.keys.list;

        if key_matches_any(&key, &global.quit) {
            return true;
        }

        if key_matches_any(&key, &global.search) {
            self.search_active = true;
        } else if key_matches_any(&key, &global.add) {
            self.add_form = AddForm::new(&config.default_country);
            self.controller.open_add_view();
        } else if key_matches_any(&key, &global.reload) {
            self.controller.reload();
        } else if key_matches_any(&key, &list.next) {
            self.move_selection(1);
        } else if key_matches_any(&key, &list.prev) {
            self.move_selection(-1);
        } else if key_matches_any(&key, &list.favorite) {
            if let Some(id) = self.selected_id() {
                self.controller.request_toggle_favorite(id);
            }
        } else if key_matches_any(&key, &list.delete) {
            if let Some(id) = self.selected_id() {
                self.controller.request_delete(id);
            }
        } else if key_matches_any(&key, &list.clear_favorites) {
            self.controller.request_clear_favorites();
        } else if key_matches_any(&key, &list.clear_others) {
            self.controller.request_clear_others();
        } else if key.code == KeyCode::Esc && !self.search_input.value().is_empty() {
            self.search_input.reset();
            self.controller.set_search("");
        }

        false
    }

    // -------------------------------------------------------------------------
    // Selection
    // -------------------------------------------------------------------------

    fn visible_ids(&self) -> Vec<i64> {
        self.controller
            .grouped()
            .iter()
            .map(|entry| entry.contact.id)
            .collect()
    }

    pub fn selected_id(&self) -> Option<i64> {
        self.visible_ids().get(self.selected).copied()
    }

    fn select_id(&mut self, id: i64) {
        if let Some(index) = self.visible_ids().iter().position(|v| *v == id) {
            self.selected = index;
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let len = self.visible_ids().len() as isize;
        if len == 0 {
            return;
        }
        self.selected = (self.selected as isize + delta).clamp(0, len - 1) as usize;
    }

    fn clamp_selection(&mut self) {
        let len = self.visible_ids().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    pub fn config(&self) -> &Config {
        self.config
    }

    pub fn ui_colors(&self) -> &UiColors {
        &self.config.ui.colors
    }
}

/// Check if the key event matches any of the bindings in the list
pub fn key_matches_any(event: &KeyEvent, bindings: &[String]) -> bool {
    bindings.iter().any(|b| key_matches_single(event, b))
}

/// Check if the key event matches a single binding string
fn key_matches_single(event: &KeyEvent, binding: &str) -> bool {
    let trimmed = binding.trim();
    if trimmed.is_empty() {
        return false;
    }

    // Ctrl/Alt/Super combinations are not bindable
    let disallowed = KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER;
    if event.modifiers.intersects(disallowed) {
        return false;
    }

    let lower = trimmed.to_ascii_lowercase();
    match lower.as_str() {
        "enter" => matches!(event.code, KeyCode::Enter),
        "tab" => matches!(event.code, KeyCode::Tab),
        "backtab" | "shift+tab" => matches!(event.code, KeyCode::BackTab),
        "backspace" => matches!(event.code, KeyCode::Backspace),
        "delete" | "del" => matches!(event.code, KeyCode::Delete),
        "esc" | "escape" => matches!(event.code, KeyCode::Esc),
        "space" => matches!(event.code, KeyCode::Char(' ')),
        "up" => matches!(event.code, KeyCode::Up),
        "down" => matches!(event.code, KeyCode::Down),
        "left" => matches!(event.code, KeyCode::Left),
        "right" => matches!(event.code, KeyCode::Right),
        "pageup" | "page_up" => matches!(event.code, KeyCode::PageUp),
        "pagedown" | "page_down" => matches!(event.code, KeyCode::PageDown),
        "home" => matches!(event.code, KeyCode::Home),
        "end" => matches!(event.code, KeyCode::End),
        name if name.len() > 1 && name.starts_with('f') => name[1..]
            .parse::<u8>()
            .is_ok_and(|n| (1..=12).contains(&n) && event.code == KeyCode::F(n)),
        // Single character - case-sensitive (d != D, since D requires Shift)
        _ => {
            let mut chars = trimmed.chars();
            if let (Some(first), None) = (chars.next(), chars.next()) {
                matches!(event.code, KeyCode::Char(c) if c == first)
            } else {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::bail;

    use super::*;
    use crate::contact::{Contact, NewContact};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    /// Service that is never reachable, so the seed list is shown.
    struct Offline;

    impl ContactService for Offline {
        fn list(&self) -> Result<Vec<Contact>> {
            bail!("offline")
        }
        fn create(&self, _contact: &NewContact) -> Result<Contact> {
            bail!("offline")
        }
        fn toggle_favorite(&self, _id: i64) -> Result<Option<Contact>> {
            bail!("offline")
        }
        fn delete(&self, _id: i64) -> Result<()> {
            bail!("offline")
        }
    }

    fn press_all(app: &mut App<'_, Offline>, keys: &str) {
        for c in keys.chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_selection_follows_favorites_then_others() {
        let config = Config::default();
        let mut app = App::new(&config, Controller::new(Offline));
        // Seed favorites are Ana (1) and Elena (5)
        assert_eq!(app.selected_id(), Some(1));
        press_all(&mut app, "jj");
        assert_eq!(app.selected_id(), Some(2));
        press_all(&mut app, "kkkk");
        assert_eq!(app.selected_id(), Some(1));
    }

    #[test]
    fn test_delete_asks_first() {
        let config = Config::default();
        let mut app = App::new(&config, Controller::new(Offline));
        press_all(&mut app, "jjd");
        assert!(app.controller.confirm_modal().is_some());
        press_all(&mut app, "n");
        assert!(app.controller.confirm_modal().is_none());
        assert!(app.controller.get(2).is_some());

        press_all(&mut app, "dy");
        assert!(app.controller.get(2).is_none());
        assert_eq!(app.selected_id(), Some(3));
    }

    #[test]
    fn test_favorite_key_applies_immediately() {
        let config = Config::default();
        let mut app = App::new(&config, Controller::new(Offline));
        press_all(&mut app, "jjf");
        assert!(app.controller.confirm_modal().is_none());
        assert!(app.controller.get(2).is_some_and(|e| e.contact.favorite));
    }

    #[test]
    fn test_search_then_back_to_list() {
        let config = Config::default();
        let mut app = App::new(&config, Controller::new(Offline));
        press_all(&mut app, "/ele");
        assert!(app.search_active);
        assert_eq!(app.controller.search(), "ele");
        app.handle_key(key(KeyCode::Enter));
        assert!(!app.search_active);
        assert_eq!(app.selected_id(), Some(5));

        // 'q' typed in the search box is text, not quit
        press_all(&mut app, "/");
        assert!(!app.handle_key(key(KeyCode::Char('q'))));
    }

    #[test]
    fn test_add_form_captures_typing() {
        let config = Config::default();
        let mut app = App::new(&config, Controller::new(Offline));
        press_all(&mut app, "a");
        assert!(app.controller.add_view_open());
        press_all(&mut app, "qd");
        assert_eq!(app.add_form.value(FormField::FirstName), "qd");

        app.handle_key(key(KeyCode::Enter));
        assert!(app.add_form.error.is_some());
        assert!(app.controller.add_view_open());

        app.handle_key(key(KeyCode::Esc));
        assert!(!app.controller.add_view_open());
    }

    #[test]
    fn test_named_keys() {
        assert!(key_matches_single(&key(KeyCode::Enter), "Enter"));
        assert!(key_matches_single(&key(KeyCode::Esc), "escape"));
        assert!(key_matches_single(&key(KeyCode::Char(' ')), "Space"));
        assert!(key_matches_single(&key(KeyCode::Delete), "Delete"));
        assert!(key_matches_single(&key(KeyCode::F(5)), "F5"));
        assert!(!key_matches_single(&key(KeyCode::F(5)), "F13"));
        assert!(!key_matches_single(&key(KeyCode::Char('f')), "F5"));
    }

    #[test]
    fn test_single_chars_are_case_sensitive() {
        assert!(key_matches_single(&key(KeyCode::Char('d')), "d"));
        assert!(!key_matches_single(&key(KeyCode::Char('D')), "d"));
        assert!(key_matches_single(
            &KeyEvent::new(KeyCode::Char('D'), KeyModifiers::SHIFT),
            "D"
        ));
    }

    #[test]
    fn test_modifiers_are_rejected() {
        let ctrl_d = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL);
        assert!(!key_matches_single(&ctrl_d, "d"));
    }

    #[test]
    fn test_matches_any() {
        let bindings = vec!["j".to_string(), "Down".to_string()];
        assert!(key_matches_any(&key(KeyCode::Down), &bindings));
        assert!(!key_matches_any(&key(KeyCode::Up), &bindings));
        assert!(!key_matches_any(&key(KeyCode::Char('j')), &[]));
    }
}
