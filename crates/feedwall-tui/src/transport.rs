//! Stream endpoints and retry timers.
//!
//! Both are background tasks that never touch dashboard state.  They report
//! back over an mpsc channel with `FeedEvent`s tagged by `(feed_id, attempt)`,
//! and the owner holds a `DropGuard` for each: dropping the guard cancels the
//! task.  A message that was already queued when the guard dropped is caught
//! by the attempt id check in `FeedConnection`.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};
use url::Url;

/// Per-connection attempt counter.
pub type AttemptId = u64;

/// Everything background tasks report back into the UI loop.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// The endpoint delivered its first complete frame.
    Loaded { feed_id: String, attempt: AttemptId },
    /// The endpoint failed before or after loading.
    Failed {
        feed_id: String,
        attempt: AttemptId,
        reason: String,
    },
    /// Running frame count for an already loaded endpoint.
    Frames {
        feed_id: String,
        attempt: AttemptId,
        total: u64,
    },
    /// The retry timer for `attempt` elapsed.
    RetryDue { feed_id: String, attempt: AttemptId },
}

impl FeedEvent {
    pub fn feed_id(&self) -> &str {
        match self {
            Self::Loaded { feed_id, .. }
            | Self::Failed { feed_id, .. }
            | Self::Frames { feed_id, .. }
            | Self::RetryDue { feed_id, .. } => feed_id,
        }
    }
}

/// Opens stream endpoints.
pub trait StreamTransport: Send + Sync {
    /// Start loading `url`.  The endpoint lives until the guard is dropped.
    fn open(&self, feed_id: &str, attempt: AttemptId, url: Url) -> DropGuard;
}

/// Starts one-shot retry timers.
pub trait RetryScheduler: Send + Sync {
    /// Fire `RetryDue` after `delay` unless the guard is dropped first.
    fn schedule(&self, feed_id: &str, attempt: AttemptId, delay: Duration) -> DropGuard;
}

// ── JPEG frame scanning ───────────────────────────────────────────────────────

const JPEG_SOI: [u8; 2] = [0xff, 0xd8];
const JPEG_EOI: [u8; 2] = [0xff, 0xd9];

/// Counts complete JPEG images in a multipart MJPEG byte stream.
#[derive(Debug, Default)]
pub struct FrameScanner {
    buffer: Vec<u8>,
}

impl FrameScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning how many frames it completed.
    pub fn push(&mut self, chunk: &[u8]) -> usize {
        self.buffer.extend_from_slice(chunk);
        let mut frames = 0;

        loop {
            let Some(start) = find(&self.buffer, &JPEG_SOI, 0) else {
                // Keep a trailing 0xff; it may be the first half of a marker.
                let keep = usize::from(self.buffer.last() == Some(&0xff));
                let drop_to = self.buffer.len() - keep;
                self.buffer.drain(..drop_to);
                break;
            };
            let Some(end) = find(&self.buffer, &JPEG_EOI, start + 2) else {
                if start > 0 {
                    self.buffer.drain(..start);
                }
                break;
            };
            self.buffer.drain(..end + 2);
            frames += 1;
        }

        frames
    }
}

fn find(haystack: &[u8], needle: &[u8; 2], from: usize) -> Option<usize> {
    if haystack.len() < from + 2 {
        return None;
    }
    haystack[from..]
        .windows(2)
        .position(|w| w == needle)
        .map(|p| p + from)
}

// ── HTTP transport ────────────────────────────────────────────────────────────

/// Only every Nth frame is reported to keep the UI channel quiet.
const FRAME_REPORT_EVERY: u64 = 15;

/// Loads MJPEG endpoints over HTTP with reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
    load_timeout: Duration,
    tx: mpsc::Sender<FeedEvent>,
}

impl HttpTransport {
    pub fn new(
        connect_timeout: Duration,
        load_timeout: Duration,
        tx: mpsc::Sender<FeedEvent>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            client,
            load_timeout,
            tx,
        })
    }
}

impl StreamTransport for HttpTransport {
    fn open(&self, feed_id: &str, attempt: AttemptId, url: Url) -> DropGuard {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let client = self.client.clone();
        let tx = self.tx.clone();
        let load_timeout = self.load_timeout;
        let feed_id = feed_id.to_string();

        tokio::spawn(async move {
            let reason = tokio::select! {
                _ = cancelled.cancelled() => {
                    debug!("stream {} attempt {}: released", feed_id, attempt);
                    return;
                }
                reason = run_endpoint(&client, url, load_timeout, &feed_id, attempt, &tx) => reason,
            };
            warn!("stream {} attempt {}: {}", feed_id, attempt, reason);
            let _ = tx
                .send(FeedEvent::Failed {
                    feed_id,
                    attempt,
                    reason,
                })
                .await;
        });

        token.drop_guard()
    }
}

/// Drive one endpoint until it fails.  Returns the failure reason.
async fn run_endpoint(
    client: &reqwest::Client,
    url: Url,
    load_timeout: Duration,
    feed_id: &str,
    attempt: AttemptId,
    tx: &mpsc::Sender<FeedEvent>,
) -> String {
    debug!("stream {} attempt {}: GET {}", feed_id, attempt, url);

    let first_frame = async {
        let response = client.get(url).send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status));
        }
        let mut body = response.bytes_stream();
        let mut scanner = FrameScanner::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| e.to_string())?;
            let frames = scanner.push(&chunk) as u64;
            if frames > 0 {
                return Ok((body, scanner, frames));
            }
        }
        Err("stream ended before the first frame".to_string())
    };

    let (mut body, mut scanner, mut total) =
        match tokio::time::timeout(load_timeout, first_frame).await {
            Ok(Ok(loaded)) => loaded,
            Ok(Err(reason)) => return reason,
            Err(_) => return format!("no frame within {} ms", load_timeout.as_millis()),
        };

    info!("stream {} attempt {}: first frame received", feed_id, attempt);
    let _ = tx
        .send(FeedEvent::Loaded {
            feed_id: feed_id.to_string(),
            attempt,
        })
        .await;

    let mut reported = total;
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => return e.to_string(),
        };
        total += scanner.push(&chunk) as u64;
        if total - reported >= FRAME_REPORT_EVERY {
            reported = total;
            let _ = tx
                .send(FeedEvent::Frames {
                    feed_id: feed_id.to_string(),
                    attempt,
                    total,
                })
                .await;
        }
    }

    "stream closed by server".to_string()
}

// ── Retry timers ──────────────────────────────────────────────────────────────

/// Retry timers backed by `tokio::time::sleep`.
pub struct TokioScheduler {
    tx: mpsc::Sender<FeedEvent>,
}

impl TokioScheduler {
    pub fn new(tx: mpsc::Sender<FeedEvent>) -> Self {
        Self { tx }
    }
}

impl RetryScheduler for TokioScheduler {
    fn schedule(&self, feed_id: &str, attempt: AttemptId, delay: Duration) -> DropGuard {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let tx = self.tx.clone();
        let feed_id = feed_id.to_string();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(FeedEvent::RetryDue { feed_id, attempt }).await;
                }
            }
        });

        token.drop_guard()
    }
}
