use thiserror::Error;

/// Why the station list could not be obtained.
///
/// Any of these is fatal for the session: the dashboard shows the
/// backend-unavailable landing state and never retries on its own.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid backend url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("backend answered HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("malformed station payload: {0}")]
    Payload(String),

    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
