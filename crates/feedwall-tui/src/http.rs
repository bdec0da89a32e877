//! Read-only HTTP status API.
//!
//! The UI loop publishes a `DashboardSnapshot` into a watch channel after
//! every change; handlers only ever read the latest value.

use axum::{extract::State, response::Json, routing::get, Router};
use feedwall_proto::protocol::{Aggregate, DashboardSnapshot, FeedCard};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Clone)]
struct HttpState {
    snapshot_rx: watch::Receiver<DashboardSnapshot>,
}

#[derive(Serialize)]
struct SummaryStatus {
    total: String,
    live: String,
    error: String,
    overall: String,
    class: String,
}

impl From<&Aggregate> for SummaryStatus {
    fn from(a: &Aggregate) -> Self {
        Self {
            total: a.total_label.clone(),
            live: a.live_count.clone(),
            error: a.error_count.clone(),
            overall: a.overall_status_text.clone(),
            class: a.overall_status_class.css().to_string(),
        }
    }
}

pub fn router(snapshot_rx: watch::Receiver<DashboardSnapshot>) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/summary", get(get_summary))
        .route("/api/feeds", get(get_feeds))
        .with_state(HttpState { snapshot_rx })
}

pub fn start_server(
    bind_address: String,
    port: u16,
    snapshot_rx: watch::Receiver<DashboardSnapshot>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(snapshot_rx);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP status API listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn get_state(State(state): State<HttpState>) -> Json<DashboardSnapshot> {
    Json(state.snapshot_rx.borrow().clone())
}

async fn get_summary(State(state): State<HttpState>) -> Json<Option<SummaryStatus>> {
    Json(state.snapshot_rx.borrow().aggregate.as_ref().map(SummaryStatus::from))
}

async fn get_feeds(State(state): State<HttpState>) -> Json<Vec<FeedCard>> {
    Json(state.snapshot_rx.borrow().feeds.clone())
}
