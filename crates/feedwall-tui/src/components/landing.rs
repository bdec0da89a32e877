//! Landing component: station picker shown until a station is opened.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use feedwall_proto::protocol::{Screen, Station};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    dashboard::{LANDING_ERROR_TEXT, NO_STATIONS_TEXT},
    theme::{
        style_default, style_focused_border, style_muted, style_secondary,
        style_selected_focused, style_unfocused_border, C_ERROR, C_TAG,
    },
    widgets::pane_chrome::pane_chrome,
};

const CELL_HEIGHT: u16 = 4;

/// Two or fewer stations are laid out in a single column.
pub fn landing_columns(station_count: usize) -> usize {
    if station_count <= 2 {
        1
    } else {
        2
    }
}

pub fn station_caption(station: &Station) -> String {
    format!("{} cámaras", station.feeds.len())
}

pub struct Landing {
    selected: usize,
}

impl Landing {
    pub fn new() -> Self {
        Self { selected: 0 }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    fn step(&mut self, delta: isize, len: usize) {
        if len == 0 {
            return;
        }
        let next = self.selected as isize + delta;
        if (0..len as isize).contains(&next) {
            self.selected = next as usize;
        }
    }
}

impl Component for Landing {
    fn id(&self) -> ComponentId {
        ComponentId::Landing
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        if key.kind != KeyEventKind::Press || state.snapshot.screen != Screen::Landing {
            return Vec::new();
        }
        let len = state.stations.len();
        let columns = landing_columns(len) as isize;
        self.selected = self.selected.min(len.saturating_sub(1));

        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.step(-columns, len),
            KeyCode::Down | KeyCode::Char('j') => self.step(columns, len),
            KeyCode::Left | KeyCode::Char('h') => self.step(-1, len),
            KeyCode::Right | KeyCode::Char('l') => self.step(1, len),
            KeyCode::Home | KeyCode::Char('g') => self.selected = 0,
            KeyCode::End | KeyCode::Char('G') => self.selected = len.saturating_sub(1),
            KeyCode::Enter => {
                if let Some(station) = state.stations.get(self.selected) {
                    return vec![Action::OpenStation(station.id.clone())];
                }
            }
            KeyCode::Char(c) if c.is_ascii_digit() && c != '0' => {
                let idx = c as usize - '1' as usize;
                if let Some(station) = state.stations.get(idx) {
                    self.selected = idx;
                    return vec![Action::OpenStation(station.id.clone())];
                }
            }
            _ => {}
        }
        Vec::new()
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let block = pane_chrome("Estaciones", None, focused, None);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let message = match state.snapshot.screen {
            Screen::Loading => Some(("Cargando estaciones...", style_secondary())),
            Screen::LandingError => Some((
                LANDING_ERROR_TEXT,
                Style::default().fg(C_ERROR).add_modifier(Modifier::BOLD),
            )),
            _ if state.stations.is_empty() => Some((NO_STATIONS_TEXT, style_secondary())),
            _ => None,
        };
        if let Some((text, style)) = message {
            let mut lines = vec![Line::from(""), Line::from(Span::styled(text, style))];
            if let Some(reason) = &state.source_error {
                lines.push(Line::from(Span::styled(reason.clone(), style_muted())));
            }
            frame.render_widget(
                Paragraph::new(lines)
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true }),
                inner,
            );
            return;
        }

        let columns = landing_columns(state.stations.len());
        self.selected = self.selected.min(state.stations.len() - 1);
        let visible_rows = (inner.height / CELL_HEIGHT).max(1) as usize;
        let selected_row = self.selected / columns;
        let first_row = selected_row.saturating_sub(visible_rows - 1);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![Constraint::Length(CELL_HEIGHT); visible_rows])
            .split(inner);

        for (r, row_area) in rows.iter().enumerate() {
            let cells = Layout::default()
                .direction(Direction::Horizontal)
                .constraints(vec![Constraint::Ratio(1, columns as u32); columns])
                .split(*row_area);
            for (c, cell) in cells.iter().enumerate() {
                let idx = (first_row + r) * columns + c;
                let Some(station) = state.stations.get(idx) else {
                    break;
                };
                draw_station_cell(frame, *cell, station, idx, idx == self.selected && focused);
            }
        }
    }
}

fn draw_station_cell(frame: &mut Frame, area: Rect, station: &Station, idx: usize, selected: bool) {
    let (border, name_style) = if selected {
        (style_focused_border(), style_selected_focused())
    } else {
        (style_unfocused_border(), style_default())
    };
    let block = Block::default().borders(Borders::ALL).border_style(border);

    let mut first = vec![];
    if idx < 9 {
        first.push(Span::styled(format!("{} ", idx + 1), style_muted()));
    }
    first.push(Span::styled(station.name.clone(), name_style));

    let lines = vec![
        Line::from(first),
        Line::from(Span::styled(
            station_caption(station),
            Style::default().fg(C_TAG),
        )),
    ];
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::station;
    use ratatui::crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn landing_state(count: usize) -> AppState {
        let mut state = AppState::new();
        state.snapshot.screen = Screen::Landing;
        state.stations = (1..=count).map(|i| station(&format!("s{}", i), i)).collect();
        state
    }

    #[test]
    fn test_column_hint() {
        assert_eq!(landing_columns(0), 1);
        assert_eq!(landing_columns(2), 1);
        assert_eq!(landing_columns(3), 2);
    }

    #[test]
    fn test_caption_counts_feeds() {
        assert_eq!(station_caption(&station("a", 4)), "4 cámaras");
    }

    #[test]
    fn test_enter_opens_selected_station() {
        let state = landing_state(4);
        let mut landing = Landing::new();
        landing.handle_key(key(KeyCode::Down), &state);
        assert_eq!(landing.selected(), 2);
        landing.handle_key(key(KeyCode::Right), &state);
        assert_eq!(
            landing.handle_key(key(KeyCode::Enter), &state),
            vec![Action::OpenStation("s4".into())]
        );
        // Out of range moves are ignored.
        landing.handle_key(key(KeyCode::Down), &state);
        assert_eq!(landing.selected(), 3);
    }

    #[test]
    fn test_digit_shortcut() {
        let state = landing_state(2);
        let mut landing = Landing::new();
        assert_eq!(
            landing.handle_key(key(KeyCode::Char('2')), &state),
            vec![Action::OpenStation("s2".into())]
        );
        assert!(landing.handle_key(key(KeyCode::Char('5')), &state).is_empty());
    }

    #[test]
    fn test_keys_ignored_on_error_screen() {
        let mut state = landing_state(2);
        state.snapshot.screen = Screen::LandingError;
        let mut landing = Landing::new();
        assert!(landing.handle_key(key(KeyCode::Enter), &state).is_empty());
    }
}
