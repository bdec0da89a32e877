//! Dashboard: owns the station list, the open `StationView` and the
//! visibility coordinator.  The UI loop is its only caller.

use std::sync::Arc;

use feedwall_proto::protocol::{Aggregate, DashboardSnapshot, Screen, Station};
use feedwall_proto::stations::total_streams;
use tracing::{debug, info, warn};

use crate::connection::FeedIo;
use crate::station_view::StationView;
use crate::summary::Summary;
use crate::transport::FeedEvent;
use crate::visibility::{Visibility, VisibilityCoordinator, VisibilityOutcome};

pub const LANDING_ERROR_TEXT: &str = "No se pudo conectar al backend. Verifique el servidor.";
pub const NO_STATIONS_TEXT: &str = "No hay estaciones configuradas.";
pub const NO_FEEDS_TEXT: &str = "Cámaras no habilitadas para esta estación.";

/// State of the one-shot station list fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceState {
    Loading,
    Ready,
    Failed(String),
}

pub struct Dashboard {
    io: Arc<FeedIo>,
    stations: Vec<Station>,
    total_streams: usize,
    source: SourceState,
    view: Option<StationView>,
    visibility: VisibilityCoordinator,
}

impl Dashboard {
    pub fn new(io: Arc<FeedIo>) -> Self {
        Self {
            io,
            stations: Vec::new(),
            total_streams: 0,
            source: SourceState::Loading,
            view: None,
            visibility: VisibilityCoordinator::new(),
        }
    }

    // ── Station list ──────────────────────────────────────────────────────────

    pub fn stations_loaded(&mut self, stations: Vec<Station>) {
        self.total_streams = total_streams(&stations);
        info!(
            "{} stations, {} streams",
            stations.len(),
            self.total_streams
        );
        self.stations = stations;
        self.source = SourceState::Ready;
    }

    pub fn stations_failed(&mut self, reason: String) {
        warn!("station list unavailable: {}", reason);
        self.stations.clear();
        self.total_streams = 0;
        self.source = SourceState::Failed(reason);
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn source(&self) -> &SourceState {
        &self.source
    }

    pub fn total_streams(&self) -> usize {
        self.total_streams
    }

    // ── Navigation ────────────────────────────────────────────────────────────

    /// Open a station by id.  Unknown ids are ignored.
    pub fn open_station(&mut self, station_id: &str) -> bool {
        let Some(station) = self.stations.iter().find(|s| s.id == station_id).cloned() else {
            debug!("open_station: unknown station {}", station_id);
            return false;
        };
        self.close_station();
        self.visibility.reset();
        self.view = Some(StationView::open(station, Arc::clone(&self.io)));
        true
    }

    /// Tear down the open station and go back to the landing screen.
    pub fn close_station(&mut self) {
        if let Some(mut view) = self.view.take() {
            view.close();
        }
    }

    pub fn view(&self) -> Option<&StationView> {
        self.view.as_ref()
    }

    pub fn screen(&self) -> Screen {
        match (&self.source, &self.view) {
            (SourceState::Loading, _) => Screen::Loading,
            (SourceState::Failed(_), _) => Screen::LandingError,
            (SourceState::Ready, Some(_)) => Screen::Station,
            (SourceState::Ready, None) => Screen::Landing,
        }
    }

    // ── Feed plumbing ─────────────────────────────────────────────────────────

    pub fn handle_feed_event(&mut self, event: &FeedEvent) -> bool {
        match self.view.as_mut() {
            Some(view) => view.handle_event(event),
            None => {
                debug!("event for {} with no station open", event.feed_id());
                false
            }
        }
    }

    pub fn retry_feed(&mut self, feed_id: &str) -> bool {
        self.view
            .as_mut()
            .map(|view| view.retry_feed(feed_id))
            .unwrap_or(false)
    }

    pub fn start_pending_loads(&mut self) -> bool {
        self.view
            .as_mut()
            .map(StationView::start_pending_loads)
            .unwrap_or(false)
    }

    pub fn on_visibility(&mut self, visibility: Visibility) -> VisibilityOutcome {
        self.visibility.on_change(visibility, self.view.as_mut())
    }

    // ── Rendered output ───────────────────────────────────────────────────────

    pub fn aggregate(&self) -> Option<Aggregate> {
        match (&self.source, &self.view) {
            (SourceState::Loading, _) => None,
            (SourceState::Failed(_), _) => Some(Aggregate::backend_unavailable()),
            (SourceState::Ready, Some(view)) => {
                Some(view.summary().aggregate(self.total_streams))
            }
            (SourceState::Ready, None) => Some(Summary::landing(self.total_streams)),
        }
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            screen: self.screen(),
            station_id: self.view.as_ref().map(|v| v.station().id.clone()),
            station_name: self.view.as_ref().map(|v| v.station().name.clone()),
            suspended: self.view.as_ref().is_some_and(StationView::is_suspended),
            aggregate: self.aggregate(),
            feeds: self.view.as_ref().map(StationView::cards).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{station, FakeIo};
    use feedwall_proto::protocol::{FeedStatus, StatusClass};

    fn ready(fake: &FakeIo) -> Dashboard {
        let mut dashboard = Dashboard::new(fake.io());
        dashboard.stations_loaded(vec![station("a", 3), station("b", 2)]);
        dashboard
    }

    #[test]
    fn test_landing_metrics() {
        let fake = FakeIo::new();
        let dashboard = ready(&fake);
        assert_eq!(dashboard.screen(), Screen::Landing);
        let aggregate = dashboard.aggregate().unwrap();
        assert_eq!(aggregate.total_label, "5");
        assert_eq!(aggregate.live_count, "0");
        assert_eq!(aggregate.overall_status_text, "Sin transmisión");
    }

    #[test]
    fn test_station_list_failure_creates_no_connections() {
        let fake = FakeIo::new();
        let mut dashboard = Dashboard::new(fake.io());
        assert_eq!(dashboard.screen(), Screen::Loading);
        assert!(dashboard.aggregate().is_none());

        dashboard.stations_failed("connection refused".into());
        assert_eq!(dashboard.screen(), Screen::LandingError);
        let aggregate = dashboard.aggregate().unwrap();
        assert_eq!(aggregate.overall_status_text, "Backend no disponible");
        assert_eq!(aggregate.overall_status_class, StatusClass::Error);
        assert_eq!(aggregate.total_label, "--");

        assert!(!dashboard.open_station("a"));
        dashboard.start_pending_loads();
        assert!(dashboard.view().is_none());
        assert_eq!(fake.opens(), 0);
        assert_eq!(fake.timers(), 0);
    }

    #[test]
    fn test_unknown_station_is_ignored() {
        let fake = FakeIo::new();
        let mut dashboard = ready(&fake);
        assert!(!dashboard.open_station("nope"));
        assert_eq!(dashboard.screen(), Screen::Landing);
    }

    #[test]
    fn test_round_trip_leaves_nothing_from_first_station() {
        let fake = FakeIo::new();
        let mut dashboard = ready(&fake);

        assert!(dashboard.open_station("a"));
        dashboard.start_pending_loads();
        let attempt = dashboard.view().unwrap().connection("a-1").unwrap().attempt();
        dashboard.handle_feed_event(&FeedEvent::Failed {
            feed_id: "a-1".into(),
            attempt,
            reason: "HTTP 502".into(),
        });
        assert_eq!(fake.live_timers(), 1);

        dashboard.close_station();
        assert_eq!(dashboard.screen(), Screen::Landing);
        assert_eq!(fake.live_timers(), 0);
        assert_eq!(fake.live_endpoints(), 0);

        assert!(dashboard.open_station("b"));
        dashboard.start_pending_loads();
        assert_eq!(fake.live_endpoints(), 2);
        assert_eq!(fake.live_timers(), 0);

        // The timer of the closed station arrives late: nothing happens.
        let late = FeedEvent::RetryDue {
            feed_id: "a-1".into(),
            attempt,
        };
        assert!(!dashboard.handle_feed_event(&late));
        dashboard.start_pending_loads();
        assert_eq!(fake.opens_for("a-1"), 1);
    }

    #[test]
    fn test_reopened_station_ignores_events_from_previous_session() {
        let fake = FakeIo::new();
        let mut dashboard = ready(&fake);

        dashboard.open_station("a");
        dashboard.start_pending_loads();
        let first = dashboard.view().unwrap().connection("a-1").unwrap().attempt();
        let stale_failure = FeedEvent::Failed {
            feed_id: "a-1".into(),
            attempt: first,
            reason: "timeout".into(),
        };
        let stale_retry = FeedEvent::RetryDue {
            feed_id: "a-1".into(),
            attempt: first,
        };
        dashboard.close_station();

        assert!(dashboard.open_station("a"));
        dashboard.start_pending_loads();
        let second = dashboard.view().unwrap().connection("a-1").unwrap().attempt();
        assert_ne!(first, second);

        assert!(!dashboard.handle_feed_event(&stale_failure));
        assert!(!dashboard.handle_feed_event(&stale_retry));
        let conn = dashboard.view().unwrap().connection("a-1").unwrap();
        assert_eq!(conn.status(), FeedStatus::Idle);
        assert!(!conn.is_retrying());
        assert_eq!(fake.live_timers(), 0);
        assert_eq!(fake.timers(), 0);
        assert_eq!(fake.opens_for("a-1"), 2);
    }

    #[test]
    fn test_switching_station_directly_releases_previous() {
        let fake = FakeIo::new();
        let mut dashboard = ready(&fake);
        dashboard.open_station("a");
        dashboard.start_pending_loads();
        dashboard.open_station("b");
        dashboard.start_pending_loads();
        assert_eq!(fake.live_endpoints(), 2);
        assert_eq!(dashboard.snapshot().station_id.as_deref(), Some("b"));
    }

    #[test]
    fn test_opening_station_clears_pending_resume() {
        let fake = FakeIo::new();
        let mut dashboard = ready(&fake);
        dashboard.open_station("a");
        dashboard.start_pending_loads();

        assert_eq!(
            dashboard.on_visibility(Visibility::Hidden),
            VisibilityOutcome::Suspended
        );
        dashboard.open_station("b");
        dashboard.start_pending_loads();
        assert_eq!(
            dashboard.on_visibility(Visibility::Visible),
            VisibilityOutcome::Ignored
        );
        assert_eq!(fake.opens_for("b-1"), 1);
    }

    #[test]
    fn test_snapshot_of_open_station() {
        let fake = FakeIo::new();
        let mut dashboard = ready(&fake);
        dashboard.open_station("a");
        dashboard.start_pending_loads();
        let attempt = dashboard.view().unwrap().connection("a-2").unwrap().attempt();
        assert!(dashboard.handle_feed_event(&FeedEvent::Loaded {
            feed_id: "a-2".into(),
            attempt,
        }));

        let snapshot = dashboard.snapshot();
        assert_eq!(snapshot.screen, Screen::Station);
        assert_eq!(snapshot.station_name.as_deref(), Some("Estación a"));
        assert_eq!(snapshot.feeds.len(), 3);
        assert_eq!(snapshot.feeds[1].chip_label, "Disponible");
        let aggregate = snapshot.aggregate.unwrap();
        assert_eq!(aggregate.total_label, "5");
        assert_eq!(aggregate.live_count, "1");
        assert_eq!(aggregate.overall_status_text, "1 en vivo");
    }

    #[test]
    fn test_retry_feed_without_view() {
        let fake = FakeIo::new();
        let mut dashboard = ready(&fake);
        assert!(!dashboard.retry_feed("a-1"));
    }
}
