//! App: component-based event loop.
//!
//! Architecture:
//! - `App` owns the `Dashboard`, all components and `AppState` (read-only
//!   data for components).
//! - A `tokio::mpsc` channel carries `AppMessage`s in from background tasks:
//!   terminal events, feed transport/timer events, the station list fetch.
//! - The loop draws a frame, issues the loads queued since the previous
//!   frame, then awaits the next message.
//! - Components return `Vec<Action>`; App dispatches each Action.
//! - Every change is published as a `DashboardSnapshot` on a watch channel
//!   for the HTTP status API.

use std::io;
use std::time::Duration;

use feedwall_proto::config::SourceConfig;
use feedwall_proto::protocol::{DashboardSnapshot, FeedStatus, Screen, Station};
use feedwall_proto::stations::load_stations;
use ratatui::crossterm::{
    event::{self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    Terminal,
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    components::{header::Header, landing::Landing, station_grid::StationGrid},
    dashboard::{Dashboard, SourceState},
    transport::FeedEvent,
    visibility::{Visibility, VisibilityOutcome},
    widgets::{
        status_bar,
        toast::{Severity, ToastManager},
    },
};

// ── Internal event bus ────────────────────────────────────────────────────────

enum AppMessage {
    Event(Event),
    Feed(FeedEvent),
    StationsLoaded(Result<Vec<Station>, String>),
}

// ── App ───────────────────────────────────────────────────────────────────────

pub struct App {
    pub state: AppState,
    dashboard: Dashboard,

    // ── Components ────────────────────────────────────────────────────────────
    header: Header,
    landing: Landing,
    station_grid: StationGrid,
    toast: ToastManager,

    snapshot_tx: watch::Sender<DashboardSnapshot>,
    suspend_on_focus_loss: bool,
    should_quit: bool,
}

impl App {
    pub fn new(
        dashboard: Dashboard,
        snapshot_tx: watch::Sender<DashboardSnapshot>,
        suspend_on_focus_loss: bool,
    ) -> Self {
        let mut app = Self {
            state: AppState::new(),
            dashboard,
            header: Header::new(),
            landing: Landing::new(),
            station_grid: StationGrid::new(),
            toast: ToastManager::new(),
            snapshot_tx,
            suspend_on_focus_loss,
            should_quit: false,
        };
        app.sync_state();
        app
    }

    pub async fn run(
        mut self,
        mut feed_rx: mpsc::Receiver<FeedEvent>,
        source: SourceConfig,
    ) -> anyhow::Result<()> {
        debug!("run(): enabling raw mode");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        if self.suspend_on_focus_loss {
            execute!(stdout, EnableFocusChange)?;
        }
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal created, size={:?}", terminal.size());

        let (tx, mut rx) = mpsc::channel::<AppMessage>(1024);

        // ── Background task: terminal events ─────────────────────────────────
        let event_tx = tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        // ── Background task: feed transport/timer events ─────────────────────
        let feed_tx = tx.clone();
        tokio::spawn(async move {
            while let Some(ev) = feed_rx.recv().await {
                if feed_tx.send(AppMessage::Feed(ev)).await.is_err() {
                    break;
                }
            }
        });

        // ── Background task: one-shot station list fetch ─────────────────────
        self.toast.spinner("Cargando estaciones");
        let stations_tx = tx.clone();
        tokio::spawn(async move {
            let result = load_stations(&source).await.map_err(|e| e.to_string());
            let _ = stations_tx.send(AppMessage::StationsLoaded(result)).await;
        });

        // Toast expiry + spinner animation + component ticks.
        let mut ui_tick = tokio::time::interval(Duration::from_millis(100));
        ui_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // ── Main loop ─────────────────────────────────────────────────────────
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }
            // Loads queued by connect() start only once their idle state is on screen.
            needs_redraw = self.start_pending_loads();

            if self.should_quit {
                break;
            }

            tokio::select! {
                Some(msg) = rx.recv() => {
                    const MAX_DRAIN: usize = 256;
                    let mut redraw = self.handle_message(msg);
                    let mut drained = 0usize;
                    while drained < MAX_DRAIN {
                        let Ok(next) = rx.try_recv() else { break };
                        drained += 1;
                        redraw |= self.handle_message(next);
                    }
                    needs_redraw |= redraw;
                }

                _ = ui_tick.tick() => {
                    self.toast.tick();
                    let actions: Vec<Action> = {
                        let s = &self.state;
                        let mut all = Vec::new();
                        all.extend(self.landing.tick(s));
                        all.extend(self.station_grid.tick(s));
                        all
                    };
                    for action in actions {
                        self.dispatch(action);
                    }
                    needs_redraw = true;
                }
            }
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        self.dashboard.close_station();
        disable_raw_mode()?;
        if self.suspend_on_focus_loss {
            execute!(terminal.backend_mut(), DisableFocusChange)?;
        }
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        info!("feedwall exiting");

        Ok(())
    }

    fn start_pending_loads(&mut self) -> bool {
        let changed = self.dashboard.start_pending_loads();
        if changed {
            self.sync_state();
        }
        changed
    }

    /// Apply one message.  Returns whether a redraw is needed.
    fn handle_message(&mut self, msg: AppMessage) -> bool {
        let redraw = match msg {
            AppMessage::Event(Event::Key(key)) => {
                for action in self.handle_key(key) {
                    self.dispatch(action);
                }
                true
            }
            AppMessage::Event(Event::FocusLost) => self.on_visibility(Visibility::Hidden),
            AppMessage::Event(Event::FocusGained) => self.on_visibility(Visibility::Visible),
            AppMessage::Event(Event::Resize(..)) => true,
            AppMessage::Event(_) => false,
            AppMessage::Feed(ev) => self.on_feed_event(&ev),
            AppMessage::StationsLoaded(Ok(stations)) => {
                let count = stations.len();
                self.dashboard.stations_loaded(stations);
                self.toast.resolve_spinner(
                    Severity::Success,
                    format!("{} estaciones", count),
                    Duration::from_secs(3),
                );
                true
            }
            AppMessage::StationsLoaded(Err(reason)) => {
                self.dashboard.stations_failed(reason);
                self.toast.resolve_spinner(
                    Severity::Error,
                    "Backend no disponible",
                    Duration::from_secs(5),
                );
                true
            }
        };
        self.sync_state();
        redraw
    }

    fn on_visibility(&mut self, visibility: Visibility) -> bool {
        if !self.suspend_on_focus_loss {
            return false;
        }
        self.state.focused = visibility == Visibility::Visible;
        match self.dashboard.on_visibility(visibility) {
            VisibilityOutcome::Suspended => self.toast.info("Transmisiones en pausa"),
            VisibilityOutcome::Resumed => self.toast.info("Reanudando transmisiones"),
            VisibilityOutcome::Ignored => {}
        }
        true
    }

    fn on_feed_event(&mut self, ev: &FeedEvent) -> bool {
        let changed = self.dashboard.handle_feed_event(ev);
        if changed && matches!(ev, FeedEvent::Failed { .. }) {
            let failed = self
                .dashboard
                .view()
                .and_then(|v| v.connection(ev.feed_id()))
                .filter(|c| c.status() == FeedStatus::Error)
                .map(|c| c.feed().label.clone());
            if let Some(label) = failed {
                self.toast.warning(format!("Fallo de conexión: {}", label));
            }
        }
        // Frame counters change without a status change.
        changed || matches!(ev, FeedEvent::Frames { .. })
    }

    // ── Keys ──────────────────────────────────────────────────────────────────

    fn focused(&self) -> ComponentId {
        match self.state.snapshot.screen {
            Screen::Station => ComponentId::StationGrid,
            _ => ComponentId::Landing,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if key.kind != KeyEventKind::Press {
            return Vec::new();
        }
        match key.code {
            KeyCode::Char('q') if key.modifiers == KeyModifiers::NONE => {
                return vec![Action::Quit]
            }
            KeyCode::Char('c') if key.modifiers == KeyModifiers::CONTROL => {
                return vec![Action::Quit]
            }
            KeyCode::Char('K') => return vec![Action::ToggleKeys],
            _ => {}
        }

        match self.focused() {
            ComponentId::StationGrid => self.station_grid.handle_key(key, &self.state),
            ComponentId::Landing => self.landing.handle_key(key, &self.state),
            ComponentId::Header => self.header.handle_key(key, &self.state),
        }
    }

    fn dispatch(&mut self, action: Action) {
        debug!("dispatch {:?}", action);
        match action {
            Action::OpenStation(id) => {
                if self.dashboard.open_station(&id) {
                    self.station_grid.reset();
                }
            }
            Action::CloseStation => self.dashboard.close_station(),
            Action::RetryFeed(id) => {
                self.dashboard.retry_feed(&id);
            }
            Action::ToggleKeys => self.state.show_keys_bar = !self.state.show_keys_bar,
            Action::Quit => self.should_quit = true,
            Action::Noop => {}
        }
        self.sync_state();
    }

    /// Refresh `AppState` from the dashboard and publish the snapshot.
    fn sync_state(&mut self) {
        let snapshot = self.dashboard.snapshot();
        let view = self.dashboard.view();

        self.state.stations = self.dashboard.stations().to_vec();
        self.state.feeds = view
            .map(|v| v.connections().map(|c| c.feed().clone()).collect())
            .unwrap_or_default();
        self.state.station_description = view.and_then(|v| v.station().description.clone());
        self.state.source_error = match self.dashboard.source() {
            SourceState::Failed(reason) => Some(reason.clone()),
            _ => None,
        };
        self.state.snapshot = snapshot.clone();
        self.snapshot_tx.send_replace(snapshot);
    }

    // ── Drawing ───────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut ratatui::Frame) {
        use crate::theme::C_BG;
        use ratatui::widgets::Block;
        let area = frame.area();

        frame.render_widget(
            Block::default().style(ratatui::style::Style::default().bg(C_BG)),
            area,
        );

        let status_h = if self.state.show_keys_bar { 1u16 } else { 0 };
        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(status_h),
            ])
            .split(area);

        self.header.draw(frame, outer[0], false, &self.state);
        status_bar::draw_separator(frame, outer[1]);

        let focused = self.state.focused;
        match self.focused() {
            ComponentId::StationGrid => {
                self.station_grid.draw(frame, outer[2], focused, &self.state)
            }
            _ => self.landing.draw(frame, outer[2], focused, &self.state),
        }

        if self.state.show_keys_bar {
            status_bar::draw_keys_bar(
                frame,
                outer[3],
                self.state.snapshot.screen,
                self.state.snapshot.suspended,
            );
        }

        self.toast.draw(frame, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{station, FakeIo};
    use ratatui::backend::TestBackend;

    fn app(fake: &FakeIo) -> (App, watch::Receiver<DashboardSnapshot>) {
        let dashboard = Dashboard::new(fake.io());
        let (tx, rx) = watch::channel(DashboardSnapshot::default());
        (App::new(dashboard, tx, true), rx)
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_message(AppMessage::Event(Event::Key(KeyEvent::new(
            code,
            KeyModifiers::NONE,
        ))));
    }

    #[test]
    fn test_open_station_from_keyboard() {
        let fake = FakeIo::new();
        let (mut app, rx) = app(&fake);
        app.handle_message(AppMessage::StationsLoaded(Ok(vec![
            station("a", 3),
            station("b", 1),
        ])));
        assert_eq!(rx.borrow().screen, Screen::Landing);

        press(&mut app, KeyCode::Enter);
        assert_eq!(rx.borrow().screen, Screen::Station);
        assert_eq!(rx.borrow().feeds.len(), 3);
        assert_eq!(app.state.feeds.len(), 3);

        // Nothing is loaded until the frame showing the idle cards is drawn.
        assert_eq!(fake.opens(), 0);
        app.start_pending_loads();
        assert_eq!(fake.opens(), 3);

        press(&mut app, KeyCode::Esc);
        assert_eq!(rx.borrow().screen, Screen::Landing);
        assert_eq!(fake.live_endpoints(), 0);
    }

    #[test]
    fn test_focus_events_suspend_and_resume() {
        let fake = FakeIo::new();
        let (mut app, rx) = app(&fake);
        app.handle_message(AppMessage::StationsLoaded(Ok(vec![station("a", 2)])));
        app.dispatch(Action::OpenStation("a".into()));
        app.start_pending_loads();

        app.handle_message(AppMessage::Event(Event::FocusLost));
        assert!(rx.borrow().suspended);
        assert!(rx.borrow().feeds.iter().all(|c| c.suspended));
        assert_eq!(fake.live_endpoints(), 0);

        app.handle_message(AppMessage::Event(Event::FocusGained));
        assert!(!rx.borrow().suspended);
        app.start_pending_loads();
        assert_eq!(fake.opens_for("a-1"), 2);
        assert_eq!(fake.opens_for("a-2"), 2);
    }

    #[test]
    fn test_failure_toast_and_retry() {
        let fake = FakeIo::new();
        let (mut app, rx) = app(&fake);
        app.handle_message(AppMessage::StationsLoaded(Ok(vec![station("a", 1)])));
        app.dispatch(Action::OpenStation("a".into()));
        app.start_pending_loads();

        let attempt = app.dashboard.view().unwrap().connection("a-1").unwrap().attempt();
        assert!(app.handle_message(AppMessage::Feed(FeedEvent::Failed {
            feed_id: "a-1".into(),
            attempt,
            reason: "HTTP 502".into(),
        })));
        assert_eq!(rx.borrow().feeds[0].status, FeedStatus::Error);
        assert!(!app.toast.is_empty());

        press(&mut app, KeyCode::Char('r'));
        assert_eq!(rx.borrow().feeds[0].indicator_text, "Reconectando...");
        assert_eq!(fake.live_timers(), 0);
    }

    #[test]
    fn test_station_list_failure() {
        let fake = FakeIo::new();
        let (mut app, rx) = app(&fake);
        app.handle_message(AppMessage::StationsLoaded(Err("connection refused".into())));
        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.screen, Screen::LandingError);
        assert_eq!(
            snapshot.aggregate.unwrap().overall_status_text,
            "Backend no disponible"
        );
        assert_eq!(app.state.source_error.as_deref(), Some("connection refused"));
        press(&mut app, KeyCode::Enter);
        assert_eq!(fake.opens(), 0);
    }

    #[test]
    fn test_draw_every_screen() {
        let fake = FakeIo::new();
        let (mut app, _rx) = app(&fake);
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| app.draw(f)).unwrap();

        app.handle_message(AppMessage::StationsLoaded(Ok(vec![
            station("a", 3),
            station("b", 0),
            station("c", 2),
        ])));
        terminal.draw(|f| app.draw(f)).unwrap();

        app.dispatch(Action::OpenStation("a".into()));
        terminal.draw(|f| app.draw(f)).unwrap();

        app.dispatch(Action::OpenStation("b".into()));
        terminal.draw(|f| app.draw(f)).unwrap();
        let rendered: String = terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(rendered.contains("Cámaras no habilitadas"));
    }

    #[test]
    fn test_quit_key() {
        let fake = FakeIo::new();
        let (mut app, _rx) = app(&fake);
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }
}
