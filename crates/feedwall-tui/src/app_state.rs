//! AppState: shared read-only data passed to all components during render/event.
//!
//! The App event loop is the only writer; it refreshes the snapshot after
//! every dashboard mutation.

use feedwall_proto::protocol::{DashboardSnapshot, Feed, Station};

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub snapshot: DashboardSnapshot,
    pub stations: Vec<Station>,
    /// Descriptors of the open station's feeds, in card order.
    pub feeds: Vec<Feed>,
    pub station_description: Option<String>,
    /// Reason the station list could not be loaded.
    pub source_error: Option<String>,
    pub focused: bool,
    pub show_keys_bar: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            focused: true,
            show_keys_bar: true,
            ..Self::default()
        }
    }
}
