//! Visibility coordinator: suspends the open station when the terminal loses
//! focus and resumes it when focus comes back.

use tracing::debug;

use crate::station_view::StationView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Hidden,
    Visible,
}

/// What a visibility change did to the open station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityOutcome {
    Ignored,
    Suspended,
    Resumed,
}

#[derive(Debug)]
pub struct VisibilityCoordinator {
    current: Visibility,
    resume_pending: bool,
}

impl Default for VisibilityCoordinator {
    fn default() -> Self {
        Self {
            current: Visibility::Visible,
            resume_pending: false,
        }
    }
}

impl VisibilityCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Visibility {
        self.current
    }

    pub fn resume_pending(&self) -> bool {
        self.resume_pending
    }

    /// Forget any pending resume.  Called when a station is opened.
    pub fn reset(&mut self) {
        self.resume_pending = false;
    }

    pub fn on_change(
        &mut self,
        visibility: Visibility,
        view: Option<&mut StationView>,
    ) -> VisibilityOutcome {
        if visibility == self.current {
            return VisibilityOutcome::Ignored;
        }
        self.current = visibility;

        match visibility {
            Visibility::Hidden => {
                let Some(view) = view else {
                    return VisibilityOutcome::Ignored;
                };
                self.resume_pending = view.suspend_all();
                if self.resume_pending {
                    VisibilityOutcome::Suspended
                } else {
                    debug!("focus lost: nothing to suspend");
                    VisibilityOutcome::Ignored
                }
            }
            Visibility::Visible => {
                if !self.resume_pending {
                    return VisibilityOutcome::Ignored;
                }
                self.resume_pending = false;
                if view.is_some_and(|v| v.resume_all()) {
                    VisibilityOutcome::Resumed
                } else {
                    VisibilityOutcome::Ignored
                }
            }
        }
    }
}
