//! FeedConnection: lifecycle of one feed's stream.
//!
//! ```text
//!  Idle ──connect──▶ (loading) ──▶ Live
//!                        │
//!                        └──▶ Error ──retry timer──▶ Idle ...
//!  any ──suspend──▶ Suspended ──resume──▶ Idle (manual connect)
//! ```
//!
//! The connection owns its resources as drop guards: the stream endpoint,
//! the retry timer and the queued load.  Every exit path (success, failure,
//! suspend, release, drop) goes through the same guard fields, so no timer
//! or endpoint can outlive the state that asked for it.
//!
//! Every `connect` and every `suspend` takes a fresh `attempt` from the
//! process-wide counter in `FeedIo`.  Events from the
//! transport or timer carry the attempt they were started for and are
//! discarded when they no longer match.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use feedwall_proto::protocol::{Feed, FeedCard, FeedStatus};
use feedwall_proto::stations::stream_url;
use tokio_util::sync::DropGuard;
use tracing::{debug, info, warn};
use url::Url;

use crate::transport::{AttemptId, FeedEvent, RetryScheduler, StreamTransport};

pub const INDICATOR_RECONNECTING: &str = "Reconectando...";
pub const INDICATOR_ESTABLISHED: &str = "Señal establecida";
pub const INDICATOR_FAILED: &str = "Fallo de conexión";
pub const INDICATOR_STOPPED: &str = "Transmisión detenida";

/// Side-effect handles shared by every connection of a view.
pub struct FeedIo {
    pub transport: Arc<dyn StreamTransport>,
    pub scheduler: Arc<dyn RetryScheduler>,
    /// Relative `mjpeg_url`s are resolved against this.
    pub base_url: Url,
    pub retry_delay: Duration,
    /// Shared by every connection so ids never repeat across station views.
    attempts: AtomicU64,
}

impl FeedIo {
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        scheduler: Arc<dyn RetryScheduler>,
        base_url: Url,
        retry_delay: Duration,
    ) -> Self {
        Self {
            transport,
            scheduler,
            base_url,
            retry_delay,
            attempts: AtomicU64::new(0),
        }
    }

    pub fn next_attempt(&self) -> AttemptId {
        self.attempts.fetch_add(1, Ordering::Relaxed) + 1
    }
}

pub struct FeedConnection {
    feed: Feed,
    io: Arc<FeedIo>,
    status: FeedStatus,
    indicator: String,
    retrying: bool,
    suspended: bool,
    attempt: AttemptId,
    frames: u64,
    /// Load queued by `connect`, issued on the next render tick.
    pending_load: Option<Result<Url, String>>,
    endpoint: Option<DropGuard>,
    retry_timer: Option<DropGuard>,
}

impl FeedConnection {
    pub fn new(feed: Feed, io: Arc<FeedIo>) -> Self {
        Self {
            feed,
            io,
            status: FeedStatus::Idle,
            indicator: FeedStatus::Idle.indicator().to_string(),
            retrying: false,
            suspended: false,
            attempt: 0,
            frames: 0,
            pending_load: None,
            endpoint: None,
            retry_timer: None,
        }
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    pub fn id(&self) -> &str {
        &self.feed.id
    }

    pub fn status(&self) -> FeedStatus {
        self.status
    }

    pub fn indicator(&self) -> &str {
        &self.indicator
    }

    pub fn is_retrying(&self) -> bool {
        self.retrying
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn has_retry_timer(&self) -> bool {
        self.retry_timer.is_some()
    }

    pub fn has_endpoint(&self) -> bool {
        self.endpoint.is_some()
    }

    pub fn has_pending_load(&self) -> bool {
        self.pending_load.is_some()
    }

    /// Start a fresh attempt.  `manual` only changes the indicator text.
    pub fn connect(&mut self, manual: bool) {
        self.retry_timer = None;
        self.endpoint = None;
        self.retrying = false;
        self.suspended = false;
        self.attempt = self.io.next_attempt();
        self.frames = 0;

        let timestamp = chrono::Utc::now().timestamp_millis();
        self.pending_load = Some(
            stream_url(&self.io.base_url, &self.feed.mjpeg_url, &self.feed.id, timestamp)
                .map_err(|e| format!("invalid stream url {:?}: {}", self.feed.mjpeg_url, e)),
        );

        let indicator = if manual {
            INDICATOR_RECONNECTING
        } else {
            FeedStatus::Idle.indicator()
        };
        self.set_status(FeedStatus::Idle, indicator);
        debug!(
            "feed {}: connect attempt {} (manual={})",
            self.feed.id, self.attempt, manual
        );
    }

    /// Issue the load queued by `connect`.  Returns true if the status changed
    /// (only when the url could not be built and the attempt failed outright).
    pub fn start_pending_load(&mut self) -> bool {
        match self.pending_load.take() {
            None => false,
            Some(Ok(url)) => {
                self.endpoint = Some(self.io.transport.open(&self.feed.id, self.attempt, url));
                false
            }
            Some(Err(reason)) => {
                warn!("feed {}: {}", self.feed.id, reason);
                self.fail();
                true
            }
        }
    }

    /// Apply a transport or timer event.  Returns true if the status changed.
    pub fn handle_event(&mut self, event: &FeedEvent) -> bool {
        match event {
            FeedEvent::Loaded { attempt, .. } => {
                if !self.is_current(*attempt) {
                    return false;
                }
                self.retrying = false;
                self.suspended = false;
                self.frames = self.frames.max(1);
                info!("feed {}: live", self.feed.id);
                self.set_status(FeedStatus::Live, INDICATOR_ESTABLISHED);
                true
            }
            FeedEvent::Failed {
                attempt, reason, ..
            } => {
                if !self.is_current(*attempt) {
                    return false;
                }
                warn!("feed {}: load failed: {}", self.feed.id, reason);
                self.fail();
                true
            }
            FeedEvent::Frames { attempt, total, .. } => {
                if self.is_current(*attempt) {
                    self.frames = *total;
                }
                false
            }
            FeedEvent::RetryDue { attempt, .. } => self.on_retry_due(*attempt),
        }
    }

    /// User-initiated retry.  Only permitted while in `Error`.
    pub fn retry_now(&mut self) -> bool {
        if self.status != FeedStatus::Error {
            return false;
        }
        info!("feed {}: manual retry", self.feed.id);
        self.connect(true);
        true
    }

    /// Pause in place: release everything and show the stopped indicator.
    pub fn suspend(&mut self) {
        self.release();
        self.retrying = false;
        self.suspended = true;
        self.attempt = self.io.next_attempt();
        self.set_status(FeedStatus::Idle, INDICATOR_STOPPED);
        debug!("feed {}: suspended", self.feed.id);
    }

    /// Undo `suspend` with a manual connect.  No-op unless suspended.
    pub fn resume(&mut self) -> bool {
        if !self.suspended {
            return false;
        }
        self.suspended = false;
        self.connect(true);
        true
    }

    /// Drop the endpoint, the retry timer and any queued load.
    pub fn release(&mut self) {
        self.retry_timer = None;
        self.endpoint = None;
        self.pending_load = None;
    }

    /// Rendered output for this feed's card.
    pub fn card(&self) -> FeedCard {
        FeedCard {
            feed_id: self.feed.id.clone(),
            label: self.feed.label.clone(),
            status: self.status,
            chip_label: self.status.label().to_string(),
            tag_text: self.status.tag().to_string(),
            indicator_text: self.indicator.clone(),
            action_label: self.status.action_label().to_string(),
            action_enabled: self.status.action_enabled(),
            retrying: self.retrying,
            suspended: self.suspended,
            frames: self.frames,
        }
    }

    fn is_current(&self, attempt: AttemptId) -> bool {
        !self.suspended && attempt == self.attempt
    }

    fn fail(&mut self) {
        self.endpoint = None;
        self.set_status(FeedStatus::Error, INDICATOR_FAILED);
        self.schedule_retry();
    }

    fn schedule_retry(&mut self) {
        if self.retrying {
            return;
        }
        self.retrying = true;
        self.retry_timer = Some(self.io.scheduler.schedule(
            &self.feed.id,
            self.attempt,
            self.io.retry_delay,
        ));
        debug!(
            "feed {}: retry in {} ms",
            self.feed.id,
            self.io.retry_delay.as_millis()
        );
    }

    fn on_retry_due(&mut self, attempt: AttemptId) -> bool {
        if attempt != self.attempt || self.retry_timer.is_none() {
            return false;
        }
        self.retry_timer = None;
        self.retrying = false;
        if self.suspended {
            return false;
        }
        self.connect(false);
        true
    }

    fn set_status(&mut self, status: FeedStatus, indicator: &str) {
        self.status = status;
        self.indicator = indicator.to_string();
    }
}
