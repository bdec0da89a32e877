//! Status bar: bottom line with the screen mode, focus state and keybindings.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use feedwall_proto::protocol::Screen;

use crate::theme::{C_LIVE, C_MODE_NORMAL, C_MODE_PAUSED, C_MUTED, C_SEPARATOR};

fn keys_for(screen: Screen) -> &'static str {
    match screen {
        Screen::Loading => " q quit",
        Screen::Landing => " ↑↓/jk select  Enter open  K keys  q quit",
        Screen::LandingError => " K keys  q quit",
        Screen::Station => {
            " ←↑↓→/hjkl select  Enter/r retry  Esc/b back  K keys  q quit"
        }
    }
}

/// Draw the keybindings footer bar (one row).
pub fn draw_keys_bar(frame: &mut Frame, area: Rect, screen: Screen, suspended: bool) {
    let (label, color) = match (screen, suspended) {
        (Screen::Station, true) => ("PAUSA", C_MODE_PAUSED),
        (Screen::Station, false) => ("ESTACIÓN", C_MODE_NORMAL),
        _ => ("INICIO", C_MODE_NORMAL),
    };
    let bulb = if suspended { C_MODE_PAUSED } else { C_LIVE };

    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", label),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled("●", Style::default().fg(bulb).add_modifier(Modifier::BOLD)),
        Span::raw(" "),
        Span::styled(keys_for(screen), Style::default().fg(C_MUTED)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

/// Draw a horizontal separator line.
pub fn draw_separator(frame: &mut Frame, area: Rect) {
    let line = Line::from(Span::styled(
        "─".repeat(area.width as usize),
        Style::default().fg(C_SEPARATOR),
    ));
    frame.render_widget(Paragraph::new(line), area);
}
