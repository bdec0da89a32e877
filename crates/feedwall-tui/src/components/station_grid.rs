//! StationGrid component: one card per feed of the open station.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame,
};

use feedwall_proto::protocol::{Feed, FeedCard, FeedStatus, Screen};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    dashboard::NO_FEEDS_TEXT,
    theme::{
        status_color, style_muted, style_secondary, C_CONNECTING, C_MUTED, C_PRIMARY, C_TAG,
    },
    widgets::pane_chrome::{pane_chrome, Badge},
};

const CARD_HEIGHT: u16 = 7;
const CARD_MIN_WIDTH: u16 = 40;

/// `"Puerto <port> · <position>/<total>"`, position counted from 1.
pub fn card_meta(feed: &Feed, index: usize, total: usize) -> String {
    format!("Puerto {} · {}/{}", feed.rtsp_port(), index + 1, total)
}

/// Secondary line: station name, plus the feed description when it has one.
pub fn card_detail(station_name: &str, feed: &Feed) -> String {
    match feed.description.as_deref() {
        Some(d) if !d.is_empty() => format!("{} · {}", station_name, d),
        _ => station_name.to_string(),
    }
}

pub struct StationGrid {
    selected: usize,
    /// Column count of the last draw, used for vertical navigation.
    columns: usize,
}

impl StationGrid {
    pub fn new() -> Self {
        Self {
            selected: 0,
            columns: 1,
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Called when a different station is opened.
    pub fn reset(&mut self) {
        self.selected = 0;
    }

    fn step(&mut self, delta: isize, len: usize) {
        let next = self.selected as isize + delta;
        if (0..len as isize).contains(&next) {
            self.selected = next as usize;
        }
    }
}

impl Component for StationGrid {
    fn id(&self) -> ComponentId {
        ComponentId::StationGrid
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        if key.kind != KeyEventKind::Press || state.snapshot.screen != Screen::Station {
            return Vec::new();
        }
        let cards = &state.snapshot.feeds;
        let len = cards.len();
        let columns = self.columns.max(1) as isize;

        match key.code {
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('b') => {
                return vec![Action::CloseStation]
            }
            KeyCode::Up | KeyCode::Char('k') => self.step(-columns, len),
            KeyCode::Down | KeyCode::Char('j') => self.step(columns, len),
            KeyCode::Left | KeyCode::Char('h') => self.step(-1, len),
            KeyCode::Right | KeyCode::Char('l') => self.step(1, len),
            KeyCode::Enter | KeyCode::Char('r') => {
                if let Some(card) = cards.get(self.selected) {
                    if card.action_enabled {
                        return vec![Action::RetryFeed(card.feed_id.clone())];
                    }
                }
            }
            _ => {}
        }
        Vec::new()
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let cards = &state.snapshot.feeds;
        if cards.is_empty() {
            let block = pane_chrome("Cámaras", None, focused, None);
            let inner = block.inner(area);
            frame.render_widget(block, area);
            frame.render_widget(
                Paragraph::new(vec![
                    Line::from(""),
                    Line::from(Span::styled(NO_FEEDS_TEXT, style_secondary())),
                ])
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true }),
                inner,
            );
            return;
        }

        self.columns = (area.width / CARD_MIN_WIDTH).max(1) as usize;
        self.selected = self.selected.min(cards.len() - 1);
        let columns = self.columns;
        let visible_rows = (area.height / CARD_HEIGHT).max(1) as usize;
        let first_row = (self.selected / columns).saturating_sub(visible_rows - 1);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![Constraint::Length(CARD_HEIGHT); visible_rows])
            .split(area);

        let station_name = state.snapshot.station_name.as_deref().unwrap_or_default();
        for (r, row_area) in rows.iter().enumerate() {
            let cells = Layout::default()
                .direction(Direction::Horizontal)
                .constraints(vec![Constraint::Ratio(1, columns as u32); columns])
                .split(*row_area);
            for (c, cell) in cells.iter().enumerate() {
                let idx = (first_row + r) * columns + c;
                let Some(card) = cards.get(idx) else {
                    return;
                };
                let feed = state.feeds.get(idx);
                let lines = card_lines(card, feed, station_name, idx, cards.len());
                draw_card(frame, *cell, card, lines, focused && idx == self.selected);
            }
        }
    }
}

fn draw_card(frame: &mut Frame, area: Rect, card: &FeedCard, lines: Vec<Line<'static>>, selected: bool) {
    let block = pane_chrome(
        &card.label,
        None,
        selected,
        Some(Badge {
            text: &card.chip_label,
            color: status_color(card.status.class()),
        }),
    );
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn card_lines(
    card: &FeedCard,
    feed: Option<&Feed>,
    station_name: &str,
    index: usize,
    total: usize,
) -> Vec<Line<'static>> {
    let tag_style = match card.status {
        FeedStatus::Live => Style::default()
            .fg(status_color(card.status.class()))
            .add_modifier(Modifier::BOLD),
        _ => style_muted(),
    };
    let mut tag = vec![Span::styled(format!(" {} ", card.tag_text), tag_style)];
    if card.frames > 0 {
        tag.push(Span::styled(
            format!("· {} cuadros", card.frames),
            style_muted(),
        ));
    }

    let indicator_color = if card.suspended {
        C_MUTED
    } else if card.retrying || card.indicator_text == crate::connection::INDICATOR_RECONNECTING {
        C_CONNECTING
    } else {
        status_color(card.status.class())
    };

    let mut lines = vec![
        Line::from(tag),
        Line::from(Span::styled(
            format!(" {}", card.indicator_text),
            Style::default().fg(indicator_color),
        )),
    ];

    if let Some(feed) = feed {
        lines.push(Line::from(Span::styled(
            format!(" {}", card_meta(feed, index, total)),
            Style::default().fg(C_TAG),
        )));
        lines.push(Line::from(Span::styled(
            format!(" {}", card_detail(station_name, feed)),
            style_secondary(),
        )));
    }

    let action_style = if card.action_enabled {
        Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD)
    } else {
        style_muted()
    };
    lines.push(Line::from(Span::styled(
        format!(" [ {} ]", card.action_label),
        action_style,
    )));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{feed, FakeIo};
    use crate::connection::FeedConnection;
    use crate::transport::FeedEvent;
    use ratatui::crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn grid_state(fake: &FakeIo) -> AppState {
        let mut ok = FeedConnection::new(feed("cam-1"), fake.io());
        ok.connect(false);
        let mut broken = FeedConnection::new(feed("cam-2"), fake.io());
        broken.connect(false);
        broken.start_pending_load();
        broken.handle_event(&FeedEvent::Failed {
            feed_id: "cam-2".into(),
            attempt: broken.attempt(),
            reason: "HTTP 502".into(),
        });

        let mut state = AppState::new();
        state.snapshot.screen = Screen::Station;
        state.snapshot.feeds = vec![ok.card(), broken.card()];
        state.feeds = vec![ok.feed().clone(), broken.feed().clone()];
        state
    }

    #[test]
    fn test_card_meta_and_detail() {
        let mut f = feed("cam-1");
        assert_eq!(card_meta(&f, 0, 3), "Puerto 554 · 1/3");
        f.rtsp_url = "rtsp://cam/stream".into();
        assert_eq!(card_meta(&f, 2, 3), "Puerto -- · 3/3");

        assert_eq!(card_detail("Salvio", &f), "Salvio");
        f.description = Some("Andén norte".into());
        assert_eq!(card_detail("Salvio", &f), "Salvio · Andén norte");
    }

    #[test]
    fn test_retry_only_on_errored_card() {
        let fake = FakeIo::new();
        let state = grid_state(&fake);
        let mut grid = StationGrid::new();

        assert!(grid.handle_key(key(KeyCode::Enter), &state).is_empty());
        grid.handle_key(key(KeyCode::Right), &state);
        assert_eq!(grid.selected(), 1);
        assert_eq!(
            grid.handle_key(key(KeyCode::Char('r')), &state),
            vec![Action::RetryFeed("cam-2".into())]
        );
    }

    #[test]
    fn test_back_closes_station() {
        let fake = FakeIo::new();
        let state = grid_state(&fake);
        let mut grid = StationGrid::new();
        assert_eq!(
            grid.handle_key(key(KeyCode::Esc), &state),
            vec![Action::CloseStation]
        );
    }
}
