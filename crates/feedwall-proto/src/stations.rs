use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};
use url::Url;

use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::protocol::{Station, StationsPayload};

pub const STATIONS_PATH: &str = "/api/stations";

/// Load the station list: local TOML first, then the backend.
pub async fn load_stations(config: &SourceConfig) -> Result<Vec<Station>, SourceError> {
    let toml_path = &config.stations_toml;
    if toml_path.exists() {
        match load_stations_from_toml(toml_path) {
            Ok(s) => {
                info!(
                    "Loaded {} stations from TOML: {}",
                    s.len(),
                    toml_path.display()
                );
                return Ok(s);
            }
            Err(e) => warn!("Failed to parse TOML stations: {}", e),
        }
    }

    let stations = fetch_stations(&config.base_url, config.request_timeout()).await?;
    info!(
        "Loaded {} stations from {}",
        stations.len(),
        config.base_url
    );
    Ok(stations)
}

/// `GET <base_url>/api/stations`.
pub async fn fetch_stations(base_url: &str, timeout: Duration) -> Result<Vec<Station>, SourceError> {
    let url = parse_base_url(base_url)?
        .join(STATIONS_PATH)
        .map_err(|e| SourceError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|source| SourceError::Request {
            url: url.to_string(),
            source,
        })?;

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|source| SourceError::Request {
            url: url.to_string(),
            source,
        })?;

    if !response.status().is_success() {
        return Err(SourceError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let text = response
        .text()
        .await
        .map_err(|source| SourceError::Request {
            url: url.to_string(),
            source,
        })?;
    parse_stations_json(&text)
}

pub fn parse_stations_json(content: &str) -> Result<Vec<Station>, SourceError> {
    let payload: StationsPayload =
        serde_json::from_str(content).map_err(|e| SourceError::Payload(e.to_string()))?;
    Ok(payload.stations)
}

// ── TOML station loader ───────────────────────────────────────────────────────

/// Matches the `[[station]]` tables of a local station file.
#[derive(Debug, serde::Deserialize)]
struct TomlStationFile {
    #[serde(default)]
    station: Vec<Station>,
}

pub fn load_stations_from_toml(path: &Path) -> Result<Vec<Station>, SourceError> {
    let content = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_stations_from_toml_str(&content)
}

pub fn parse_stations_from_toml_str(content: &str) -> Result<Vec<Station>, SourceError> {
    let file: TomlStationFile =
        toml::from_str(content).map_err(|e| SourceError::Payload(e.to_string()))?;
    Ok(file.station)
}

/// Number of feeds across every station.
pub fn total_streams(stations: &[Station]) -> usize {
    stations.iter().map(|s| s.feeds.len()).sum()
}

pub fn parse_base_url(base_url: &str) -> Result<Url, SourceError> {
    Url::parse(base_url).map_err(|e| SourceError::InvalidUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })
}

/// Cache-busting endpoint url: `<mjpeg_url>?stream=<feed id>&t=<timestamp>`.
///
/// Relative `mjpeg_url` values are resolved against `base`.
pub fn stream_url(
    base: &Url,
    mjpeg_url: &str,
    feed_id: &str,
    timestamp_ms: i64,
) -> Result<Url, url::ParseError> {
    let mut url = base.join(mjpeg_url)?;
    url.query_pairs_mut()
        .append_pair("stream", feed_id)
        .append_pair("t", &timestamp_ms.to_string());
    Ok(url)
}
