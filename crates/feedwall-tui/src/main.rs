mod action;
mod app;
mod app_state;
mod component;
mod components;
mod connection;
mod dashboard;
mod http;
mod station_view;
mod summary;
mod theme;
mod transport;
mod visibility;
mod widgets;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use feedwall_proto::config::Config;
use feedwall_proto::platform;
use feedwall_proto::stations::parse_base_url;
use tokio::sync::{mpsc, watch};

use crate::connection::FeedIo;
use crate::dashboard::Dashboard;
use crate::transport::{FeedEvent, HttpTransport, TokioScheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = platform::log_path();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; keep HTTP client internals quiet by default.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    // Print log path to stderr so the operator can tail it immediately.
    eprintln!("feedwall log: {}", log_path.display());

    tracing::info!("feedwall starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("config unreadable, using defaults: {}", e);
            Config::default()
        }
    };
    let base_url = parse_base_url(&config.source.base_url)?;

    // ── Feed event channel (transport + retry timers → App) ─────────────────
    let (feed_tx, feed_rx) = mpsc::channel::<FeedEvent>(1024);

    let transport = HttpTransport::new(
        config.stream.connect_timeout(),
        config.stream.load_timeout(),
        feed_tx.clone(),
    )?;
    let io = Arc::new(FeedIo::new(
        Arc::new(transport),
        Arc::new(TokioScheduler::new(feed_tx)),
        base_url,
        config.stream.retry_delay(),
    ));

    let dashboard = Dashboard::new(io);
    let (snapshot_tx, snapshot_rx) = watch::channel(dashboard.snapshot());

    // ── HTTP status API ──────────────────────────────────────────────────────
    if config.http.enabled {
        http::start_server(
            config.http.bind_address.clone(),
            config.http.port,
            snapshot_rx,
        );
    }

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let app = app::App::new(
        dashboard,
        snapshot_tx,
        config.visibility.suspend_on_focus_loss,
    );
    app.run(feed_rx, config.source.clone()).await?;

    Ok(())
}
