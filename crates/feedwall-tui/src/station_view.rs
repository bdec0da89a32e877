//! StationView: every FeedConnection of the open station.
//!
//! Connections are keyed by feed id; `order` keeps the station's feed order
//! for display.  Whenever a connection reports a status change the view
//! recomputes its `Summary` from a snapshot of all connections.

use std::collections::HashMap;
use std::sync::Arc;

use feedwall_proto::protocol::{FeedCard, Station};
use tracing::{debug, info};

use crate::connection::{FeedConnection, FeedIo};
use crate::summary::Summary;
use crate::transport::FeedEvent;

pub struct StationView {
    station: Station,
    connections: HashMap<String, FeedConnection>,
    order: Vec<String>,
    active: bool,
    suspended: bool,
    summary: Summary,
}

impl StationView {
    /// Build one connection per feed and start each of them.
    pub fn open(station: Station, io: Arc<FeedIo>) -> Self {
        let mut connections = HashMap::with_capacity(station.feeds.len());
        let mut order = Vec::with_capacity(station.feeds.len());

        for feed in &station.feeds {
            if connections.contains_key(&feed.id) {
                debug!("station {}: duplicate feed id {}", station.id, feed.id);
                continue;
            }
            let mut conn = FeedConnection::new(feed.clone(), Arc::clone(&io));
            conn.connect(false);
            order.push(feed.id.clone());
            connections.insert(feed.id.clone(), conn);
        }

        info!(
            "station {}: opened with {} feeds",
            station.id,
            connections.len()
        );

        let mut view = Self {
            station,
            connections,
            order,
            active: true,
            suspended: false,
            summary: Summary::default(),
        };
        view.recompute_summary();
        view
    }

    pub fn station(&self) -> &Station {
        &self.station
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn summary(&self) -> Summary {
        self.summary
    }

    pub fn connection(&self, feed_id: &str) -> Option<&FeedConnection> {
        self.connections.get(feed_id)
    }

    /// Connections in the station's feed order.
    pub fn connections(&self) -> impl Iterator<Item = &FeedConnection> {
        self.order.iter().filter_map(|id| self.connections.get(id))
    }

    pub fn cards(&self) -> Vec<FeedCard> {
        self.connections().map(FeedConnection::card).collect()
    }

    pub fn recompute_summary(&mut self) -> Summary {
        self.summary = Summary::from_statuses(self.connections.values().map(|c| c.status()));
        self.summary
    }

    /// Issue every load queued since the last render.
    pub fn start_pending_loads(&mut self) -> bool {
        let mut changed = false;
        for conn in self.connections.values_mut() {
            changed |= conn.start_pending_load();
        }
        if changed {
            self.recompute_summary();
        }
        changed
    }

    /// Route an event to its connection.  Unknown feeds are ignored.
    pub fn handle_event(&mut self, event: &FeedEvent) -> bool {
        let Some(conn) = self.connections.get_mut(event.feed_id()) else {
            debug!("event for unknown feed {}", event.feed_id());
            return false;
        };
        let changed = conn.handle_event(event);
        if changed {
            self.recompute_summary();
        }
        changed
    }

    /// Manual retry of an errored card.
    pub fn retry_feed(&mut self, feed_id: &str) -> bool {
        let Some(conn) = self.connections.get_mut(feed_id) else {
            return false;
        };
        let changed = conn.retry_now();
        if changed {
            self.recompute_summary();
        }
        changed
    }

    /// Suspend every connection.  Returns whether anything was suspended:
    /// false when already suspended or when there are no connections.
    pub fn suspend_all(&mut self) -> bool {
        if self.suspended || self.connections.is_empty() {
            return false;
        }
        for conn in self.connections.values_mut() {
            if !conn.is_suspended() {
                conn.suspend();
            }
        }
        self.suspended = true;
        self.recompute_summary();
        info!("station {}: streams suspended", self.station.id);
        true
    }

    /// Resume every suspended connection.  No-op unless suspended.
    pub fn resume_all(&mut self) -> bool {
        if !self.suspended {
            return false;
        }
        self.suspended = false;
        for conn in self.connections.values_mut() {
            conn.resume();
        }
        self.recompute_summary();
        info!("station {}: streams resumed", self.station.id);
        true
    }

    /// Release every endpoint and timer.  The view is inert afterwards.
    pub fn close(&mut self) {
        for conn in self.connections.values_mut() {
            conn.release();
        }
        self.active = false;
        info!("station {}: closed", self.station.id);
    }
}

impl Drop for StationView {
    fn drop(&mut self) {
        if self.active {
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{station, FakeIo};
    use feedwall_proto::protocol::FeedStatus;

    fn loaded(view: &StationView, feed_id: &str) -> FeedEvent {
        FeedEvent::Loaded {
            feed_id: feed_id.to_string(),
            attempt: view.connection(feed_id).unwrap().attempt(),
        }
    }

    fn failed(view: &StationView, feed_id: &str) -> FeedEvent {
        FeedEvent::Failed {
            feed_id: feed_id.to_string(),
            attempt: view.connection(feed_id).unwrap().attempt(),
            reason: "connection refused".to_string(),
        }
    }

    #[test]
    fn test_open_starts_every_feed_idle() {
        let fake = FakeIo::new();
        let mut view = StationView::open(station("a", 3), fake.io());

        assert_eq!(view.len(), 3);
        assert!(view.connections().all(|c| c.status() == FeedStatus::Idle));
        assert_eq!(fake.opens(), 0);

        view.start_pending_loads();
        assert_eq!(fake.opens(), 3);
        let ids: Vec<&str> = view.connections().map(|c| c.id()).collect();
        assert_eq!(ids, ["a-1", "a-2", "a-3"]);
    }

    #[test]
    fn test_two_live_feeds() {
        let fake = FakeIo::new();
        let mut view = StationView::open(station("a", 3), fake.io());
        view.start_pending_loads();

        assert!(view.handle_event(&loaded(&view, "a-1")));
        assert!(view.handle_event(&loaded(&view, "a-2")));

        let summary = view.summary();
        assert_eq!((summary.live, summary.error), (2, 0));
        assert_eq!(summary.overall().0, "2 en vivo");
    }

    #[test]
    fn test_one_failure_outranks_live_feeds() {
        let fake = FakeIo::new();
        let mut view = StationView::open(station("a", 3), fake.io());
        view.start_pending_loads();
        view.handle_event(&loaded(&view, "a-1"));
        view.handle_event(&loaded(&view, "a-2"));
        view.handle_event(&failed(&view, "a-3"));

        let summary = view.summary();
        assert_eq!(summary.error, 1);
        assert_eq!(summary.live, 2);
        assert_eq!(summary.overall().0, "1 transmisión con error");
        assert_eq!(fake.live_timers(), 1);
    }

    #[test]
    fn test_suspend_all_leaves_no_timers_and_resume_reconnects_once() {
        let fake = FakeIo::new();
        let mut view = StationView::open(station("a", 3), fake.io());
        view.start_pending_loads();
        view.handle_event(&loaded(&view, "a-1"));
        view.handle_event(&failed(&view, "a-2"));

        assert!(view.suspend_all());
        assert!(view.is_suspended());
        assert!(view.connections().all(|c| c.is_suspended()));
        assert_eq!(fake.live_timers(), 0);
        assert_eq!(fake.live_endpoints(), 0);
        assert_eq!(view.summary().overall().0, "En espera");

        // Already suspended: nothing happens.
        assert!(!view.suspend_all());

        assert!(view.resume_all());
        view.start_pending_loads();
        for id in ["a-1", "a-2", "a-3"] {
            assert_eq!(fake.opens_for(id), 2, "feed {}", id);
        }
        assert!(!view.resume_all());
    }

    #[test]
    fn test_suspend_all_skips_empty_view() {
        let fake = FakeIo::new();
        let mut view = StationView::open(station("empty", 0), fake.io());
        assert!(view.is_empty());
        assert!(!view.suspend_all());
        assert_eq!(view.summary().overall().0, "Sin transmisión");
    }

    #[test]
    fn test_retry_feed_only_for_errored_card() {
        let fake = FakeIo::new();
        let mut view = StationView::open(station("a", 2), fake.io());
        view.start_pending_loads();
        view.handle_event(&failed(&view, "a-1"));

        assert!(!view.retry_feed("a-2"));
        assert!(!view.retry_feed("missing"));
        assert!(view.retry_feed("a-1"));
        assert_eq!(view.summary().error, 0);
        assert_eq!(
            view.connection("a-1").unwrap().indicator(),
            "Reconectando..."
        );
    }

    #[test]
    fn test_close_releases_everything() {
        let fake = FakeIo::new();
        let mut view = StationView::open(station("a", 2), fake.io());
        view.start_pending_loads();
        view.handle_event(&failed(&view, "a-1"));

        view.close();
        assert!(!view.is_active());
        assert_eq!(fake.live_endpoints(), 0);
        assert_eq!(fake.live_timers(), 0);
    }

    #[test]
    fn test_unknown_feed_event_ignored() {
        let fake = FakeIo::new();
        let mut view = StationView::open(station("a", 1), fake.io());
        let event = FeedEvent::Loaded {
            feed_id: "b-1".to_string(),
            attempt: 1,
        };
        assert!(!view.handle_event(&event));
    }
}
