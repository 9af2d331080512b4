use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, Screen};

#[derive(Debug, Clone, Copy)]
pub(crate) enum Action {
    None,
    Quit,
    /// Run `engine.handle_quote`(...) for the form contents
    RequestQuote,
    /// Flip the enabled flag of the highlighted service
    ToggleService,
}

pub(crate) fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    use KeyCode::{BackTab, Backspace, Char, Down, Enter, Esc, F, Left, Tab, Up};

    // Global quit shortcut; plain `q` only where nothing is typed
    if key.code == Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }
    if key.code == Char('q') && key.modifiers.is_empty() && app.screen != Screen::QuoteForm {
        return Action::Quit;
    }

    let mut action = Action::None;

    match app.screen {
        Screen::QuoteForm => match key.code {
            Tab | BackTab | Up | Down => app.toggle_focus(),
            Char(character) => {
                if !key.modifiers.contains(KeyModifiers::CONTROL)
                    && !key.modifiers.contains(KeyModifiers::ALT)
                {
                    app.focused_input().push(character);
                }
            }
            Backspace => {
                app.focused_input().pop();
            }
            Enter => {
                action = Action::RequestQuote;
            }
            F(2) => {
                app.refresh_services();
                app.screen = Screen::Services;
            }
            Esc => {
                if app.response.is_some() {
                    app.screen = Screen::QuoteView;
                }
            }
            _ => {}
        },

        Screen::QuoteView => match key.code {
            Left | Esc | Char('b') => {
                app.screen = Screen::QuoteForm;
            }
            F(2) => {
                app.refresh_services();
                app.screen = Screen::Services;
            }
            _ => {}
        },

        Screen::Services => match key.code {
            Up | Char('k') => {
                if app.service_list_index > 0 {
                    app.service_list_index -= 1;
                }
            }
            Down | Char('j') => {
                if app.service_list_index + 1 < app.services.len() {
                    app.service_list_index += 1;
                }
            }
            Enter | Char(' ') => {
                action = Action::ToggleService;
            }
            Char('r') => app.refresh_services(),
            Left | Esc | Char('b') | F(2) => {
                app.screen = Screen::QuoteForm;
            }
            _ => {}
        },
    }
    action
}
