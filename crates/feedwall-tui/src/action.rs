//! Action enum: user intents produced by components and dispatched by App.

/// Unique identifier for a focusable component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentId {
    Header,
    Landing,
    StationGrid,
}

/// All actions that can flow through the system.
/// Components produce Actions; the App dispatches them.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // ── Navigation ───────────────────────────────────────────────────────────
    OpenStation(String),
    CloseStation,

    // ── Feeds ────────────────────────────────────────────────────────────────
    RetryFeed(String),

    // ── UI toggles ───────────────────────────────────────────────────────────
    ToggleKeys,

    // ── System ───────────────────────────────────────────────────────────────
    Quit,
    Noop,
}
