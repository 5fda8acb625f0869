//! View state management
//!
//! Zoom, navigation and window changes are expressed as commands applied to
//! `ViewState`; the controller executes the returned effects in order. The
//! current page itself lives in the `ViewportTracker`, which reports changes
//! through `Command::PageChanged`.

use super::viewport::RenderWindow;
use super::zoom::{Zoom, ZoomUpdate};

/// Rendering strategy flags fixed for one document
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Strategy {
    /// Render every page up front and never evict
    pub eager: bool,
    /// Keep high-res surfaces when pages leave the window
    pub retain_high_res: bool,
}

impl Strategy {
    /// Pages outside the window keep their raster
    #[must_use]
    pub fn keeps_out_of_window(self) -> bool {
        self.eager || self.retain_high_res
    }
}

/// Current view state for an open document
#[derive(Clone, Debug)]
pub struct ViewState {
    pub page_count: usize,
    pub zoom: Zoom,
    pub zoom_step: u32,
    pub strategy: Strategy,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            page_count: 0,
            zoom: Zoom::default(),
            zoom_step: Zoom::STEP,
            strategy: Strategy::default(),
        }
    }
}

impl ViewState {
    #[must_use]
    pub fn new(zoom: Zoom, zoom_step: u32) -> Self {
        Self {
            zoom,
            zoom_step,
            ..Self::default()
        }
    }

    /// Window of pages eligible for high-res around `current`
    #[must_use]
    pub fn window(&self, current: usize) -> RenderWindow {
        if self.strategy.eager {
            RenderWindow::all(self.page_count)
        } else {
            RenderWindow::around(current, self.page_count)
        }
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::Open {
                page_count,
                strategy,
            } => {
                self.page_count = page_count;
                self.strategy = strategy;
                vec![]
            }

            Command::Close => {
                self.page_count = 0;
                self.strategy = Strategy::default();
                vec![]
            }

            Command::SetZoom(percent) => Self::zoom_effects(self.zoom.set(percent)),

            Command::StepZoom(delta) => {
                let update = if delta >= 0 {
                    self.zoom.step_in(delta.unsigned_abs() as u32)
                } else {
                    self.zoom.step_out(delta.unsigned_abs() as u32)
                };
                Self::zoom_effects(update)
            }

            Command::ResetZoom => Self::zoom_effects(self.zoom.reset()),

            Command::Wheel { delta_y, modifier } => {
                if !modifier || self.page_count == 0 {
                    return vec![];
                }
                let delta = Zoom::wheel_delta(delta_y, self.zoom_step);
                self.apply(Command::StepZoom(delta))
            }

            Command::PageChanged(page) => {
                let mut effects = vec![Effect::PersistProgress(page), Effect::NotifyPageChange(page)];
                if !self.strategy.keeps_out_of_window() {
                    effects.push(Effect::RollbackOutsideWindow);
                }
                effects.push(Effect::RenderWindow);
                effects
            }

            Command::Navigate(page) => {
                if (1..=self.page_count).contains(&page) {
                    vec![Effect::ScrollToPage(page)]
                } else {
                    vec![]
                }
            }
        }
    }

    fn zoom_effects(update: ZoomUpdate) -> Vec<Effect> {
        match update {
            ZoomUpdate::Changed { .. } => vec![Effect::RenderWindow],
            ZoomUpdate::Unchanged => vec![],
        }
    }
}

/// Commands that modify view state
#[derive(Clone, Debug)]
pub enum Command {
    /// A document was opened
    Open { page_count: usize, strategy: Strategy },
    /// The document was torn down
    Close,
    /// Set the zoom percentage
    SetZoom(i64),
    /// Adjust zoom by a signed amount
    StepZoom(i64),
    /// Back to 100%
    ResetZoom,
    /// A wheel tick, zooming only with the modifier held
    Wheel { delta_y: f64, modifier: bool },
    /// The viewport tracker settled on a new current page
    PageChanged(usize),
    /// Bring a page into view
    Navigate(usize),
}

/// Effects produced by state changes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Store `{fingerprint -> page}`
    PersistProgress(usize),
    /// Fire the page-change and progress callbacks
    NotifyPageChange(usize),
    /// Roll back high-res surfaces outside the window
    RollbackOutsideWindow,
    /// Render the active window at the current zoom
    RenderWindow,
    /// Scroll the host so the page's top edge is in view
    ScrollToPage(usize),
}
