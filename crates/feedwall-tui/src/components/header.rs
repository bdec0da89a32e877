//! Header component: 2-row top bar.
//!
//! Row 1: app name, open station (or the landing title), overall status chip.
//! Row 2: total / live / error metrics.
//!
//! Not focusable.

use ratatui::crossterm::event::KeyEvent;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use feedwall_proto::protocol::{Aggregate, Screen};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    theme::{style_chip, C_ACCENT, C_ERROR, C_LIVE, C_MODE_PAUSED, C_MUTED, C_PRIMARY, C_SECONDARY},
};

pub struct Header;

impl Header {
    pub fn new() -> Self {
        Self
    }
}

impl Component for Header {
    fn id(&self) -> ComponentId {
        ComponentId::Header
    }

    fn handle_key(&mut self, _key: KeyEvent, _state: &AppState) -> Vec<Action> {
        Vec::new()
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, _focused: bool, state: &AppState) {
        if area.height == 0 {
            return;
        }
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(1)])
            .split(area);

        let halves = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(36)])
            .split(rows[0]);

        frame.render_widget(Paragraph::new(title_line(state)), halves[0]);
        if let Some(aggregate) = &state.snapshot.aggregate {
            frame.render_widget(
                Paragraph::new(overall_line(aggregate)).alignment(Alignment::Right),
                halves[1],
            );
        }
        frame.render_widget(Paragraph::new(metrics_line(state)), rows[1]);
    }
}

fn title_line(state: &AppState) -> Line<'static> {
    let mut spans = vec![Span::styled(
        " feedwall ",
        Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD),
    )];

    let title = match state.snapshot.screen {
        Screen::Station => state
            .snapshot
            .station_name
            .clone()
            .unwrap_or_default(),
        Screen::Loading => "Cargando estaciones".to_string(),
        Screen::Landing | Screen::LandingError => "Estaciones".to_string(),
    };
    spans.push(Span::styled(
        title,
        Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
    ));

    if let Some(description) = &state.station_description {
        spans.push(Span::styled(
            format!("  {}", description),
            Style::default().fg(C_SECONDARY),
        ));
    }
    if state.snapshot.suspended {
        spans.push(Span::styled(
            "  ⏸ en pausa",
            Style::default().fg(C_MODE_PAUSED),
        ));
    }
    Line::from(spans)
}

fn overall_line(aggregate: &Aggregate) -> Line<'static> {
    Line::from(vec![
        Span::styled("● ", style_chip(aggregate.overall_status_class)),
        Span::styled(
            format!("{} ", aggregate.overall_status_text),
            style_chip(aggregate.overall_status_class),
        ),
    ])
}

fn metrics_line(state: &AppState) -> Line<'static> {
    let (total, live, error) = match &state.snapshot.aggregate {
        Some(a) => (
            a.total_label.clone(),
            a.live_count.clone(),
            a.error_count.clone(),
        ),
        None => ("--".to_string(), "--".to_string(), "--".to_string()),
    };
    let label = Style::default().fg(C_MUTED);
    Line::from(vec![
        Span::styled(" Total ", label),
        Span::styled(total, Style::default().fg(C_PRIMARY)),
        Span::styled("   En vivo ", label),
        Span::styled(live, Style::default().fg(C_LIVE)),
        Span::styled("   Errores ", label),
        Span::styled(error, Style::default().fg(C_ERROR)),
    ])
}
