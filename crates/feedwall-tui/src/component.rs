//! Component trait: the interface every UI panel implements.
//!
//! Components own their selection state and render themselves from the
//! read-only `AppState`.  They never touch the dashboard; they return
//! `Vec<Action>` and the App dispatches them.

use ratatui::crossterm::event::KeyEvent;
use ratatui::{layout::Rect, Frame};

use crate::action::{Action, ComponentId};
use crate::app_state::AppState;

pub trait Component {
    fn id(&self) -> ComponentId;

    /// Handle a key event while this component is on screen.
    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action>;

    /// Called each UI tick (~100ms).
    fn tick(&mut self, _state: &AppState) -> Vec<Action> {
        Vec::new()
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState);
}
