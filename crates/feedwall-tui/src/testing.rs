//! Test doubles for the transport and the retry scheduler.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use feedwall_proto::protocol::{Feed, Station};
use tokio_util::sync::{CancellationToken, DropGuard};
use url::Url;

use crate::connection::FeedIo;
use crate::transport::{AttemptId, RetryScheduler, StreamTransport};

#[derive(Default)]
struct Recorded {
    opens: Vec<(String, AttemptId, Url, CancellationToken)>,
    timers: Vec<(String, AttemptId, Duration, CancellationToken)>,
}

/// Records every endpoint and timer handed out, keeping a clone of each
/// token so tests can check what is still alive.
#[derive(Clone, Default)]
pub struct FakeIo {
    recorded: Arc<Mutex<Recorded>>,
}

impl FakeIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn io(&self) -> Arc<FeedIo> {
        Arc::new(FeedIo::new(
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Url::parse("http://backend.test").unwrap(),
            Duration::from_millis(4000),
        ))
    }

    pub fn opens(&self) -> usize {
        self.recorded.lock().unwrap().opens.len()
    }

    pub fn opens_for(&self, feed_id: &str) -> usize {
        self.recorded
            .lock()
            .unwrap()
            .opens
            .iter()
            .filter(|(id, ..)| id == feed_id)
            .count()
    }

    pub fn timers(&self) -> usize {
        self.recorded.lock().unwrap().timers.len()
    }

    pub fn live_endpoints(&self) -> usize {
        self.recorded
            .lock()
            .unwrap()
            .opens
            .iter()
            .filter(|(.., token)| !token.is_cancelled())
            .count()
    }

    pub fn live_timers(&self) -> usize {
        self.recorded
            .lock()
            .unwrap()
            .timers
            .iter()
            .filter(|(.., token)| !token.is_cancelled())
            .count()
    }

    pub fn urls(&self) -> Vec<String> {
        self.recorded
            .lock()
            .unwrap()
            .opens
            .iter()
            .map(|(_, _, url, _)| url.to_string())
            .collect()
    }

    pub fn last_url(&self) -> Option<String> {
        self.urls().pop()
    }

    pub fn last_delay(&self) -> Option<Duration> {
        self.recorded
            .lock()
            .unwrap()
            .timers
            .last()
            .map(|(_, _, delay, _)| *delay)
    }
}

impl StreamTransport for FakeIo {
    fn open(&self, feed_id: &str, attempt: AttemptId, url: Url) -> DropGuard {
        let token = CancellationToken::new();
        self.recorded
            .lock()
            .unwrap()
            .opens
            .push((feed_id.to_string(), attempt, url, token.clone()));
        token.drop_guard()
    }
}

impl RetryScheduler for FakeIo {
    fn schedule(&self, feed_id: &str, attempt: AttemptId, delay: Duration) -> DropGuard {
        let token = CancellationToken::new();
        self.recorded
            .lock()
            .unwrap()
            .timers
            .push((feed_id.to_string(), attempt, delay, token.clone()));
        token.drop_guard()
    }
}

pub fn feed(id: &str) -> Feed {
    Feed {
        id: id.to_string(),
        label: format!("Canal {}", id),
        description: None,
        rtsp_url: "rtsp://192.168.1.9:554/profile1".to_string(),
        mjpeg_url: format!("/streams/{}/mjpeg", id),
    }
}

pub fn station(id: &str, feed_count: usize) -> Station {
    Station {
        id: id.to_string(),
        name: format!("Estación {}", id),
        description: None,
        feeds: (1..=feed_count)
            .map(|i| feed(&format!("{}-{}", id, i)))
            .collect(),
    }
}
