//! Toast notifications: transient status messages in the top-right corner.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Clear, Paragraph},
    Frame,
};

use unicode_width::UnicodeWidthStr;

use crate::theme::{C_TOAST_ERROR, C_TOAST_INFO, C_TOAST_SUCCESS, C_TOAST_WARNING};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    fn icon(self) -> &'static str {
        match self {
            Self::Info => "·",
            Self::Success => "✓",
            Self::Warning => "!",
            Self::Error => "✗",
        }
    }

    fn style(self) -> Style {
        let color = match self {
            Self::Info => C_TOAST_INFO,
            Self::Success => C_TOAST_SUCCESS,
            Self::Warning => C_TOAST_WARNING,
            Self::Error => C_TOAST_ERROR,
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }
}

struct Toast {
    message: String,
    severity: Severity,
    expires: Instant,
}

/// Persistent spinner shown until resolved (station list loading).
struct SpinnerToast {
    message: String,
    frame: usize,
}

const SPINNER_FRAMES: &[&str] = &["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

pub struct ToastManager {
    toasts: VecDeque<Toast>,
    spinner: Option<SpinnerToast>,
    max_visible: usize,
}

impl ToastManager {
    pub fn new() -> Self {
        Self {
            toasts: VecDeque::new(),
            spinner: None,
            max_visible: 4,
        }
    }

    pub fn push(&mut self, message: impl Into<String>, severity: Severity, duration: Duration) {
        let msg = message.into();
        self.toasts.retain(|t| t.message != msg);
        self.toasts.push_back(Toast {
            message: msg,
            severity,
            expires: Instant::now() + duration,
        });
        while self.toasts.len() > self.max_visible * 2 {
            self.toasts.pop_front();
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(message, Severity::Info, Duration::from_secs(3));
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(message, Severity::Warning, Duration::from_secs(4));
    }

    pub fn spinner(&mut self, message: impl Into<String>) {
        self.spinner = Some(SpinnerToast {
            message: message.into(),
            frame: 0,
        });
    }

    /// Replace the spinner with a normal expiring toast.
    pub fn resolve_spinner(
        &mut self,
        severity: Severity,
        message: impl Into<String>,
        duration: Duration,
    ) {
        self.spinner = None;
        self.push(message, severity, duration);
    }

    /// Remove expired toasts and advance the spinner frame. Call each tick.
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.toasts.retain(|t| t.expires > now);
        if let Some(ref mut s) = self.spinner {
            s.frame = (s.frame + 1) % SPINNER_FRAMES.len();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty() && self.spinner.is_none()
    }

    pub fn len(&self) -> usize {
        self.toasts.len() + usize::from(self.spinner.is_some())
    }

    pub fn draw(&self, frame: &mut Frame, area: Rect) {
        if self.is_empty() {
            return;
        }
        let max_width = (area.width / 2).clamp(30, 60);
        let mut y = area.y + 1;

        let spinner = self.spinner.as_ref().map(|s| {
            (
                format!(" {} {} ", SPINNER_FRAMES[s.frame % SPINNER_FRAMES.len()], s.message),
                Severity::Info.style(),
            )
        });
        let toasts = self
            .toasts
            .iter()
            .rev()
            .take(self.max_visible)
            .map(|t| {
                (
                    format!(" {} {} ", t.severity.icon(), t.message),
                    t.severity.style(),
                )
            });

        for (text, style) in spinner.into_iter().chain(toasts) {
            if y >= area.y + area.height {
                break;
            }
            let w = (text.width() as u16).min(max_width);
            let toast_area = Rect {
                x: area.x + area.width.saturating_sub(w + 1),
                y,
                width: w.min(area.width),
                height: 1,
            };
            frame.render_widget(Clear, toast_area);
            frame.render_widget(Paragraph::new(Line::from(Span::styled(text, style))), toast_area);
            y += 1;
        }
    }
}

impl Default for ToastManager {
    fn default() -> Self {
        Self::new()
    }
}
