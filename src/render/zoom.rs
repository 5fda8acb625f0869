//! Zoom state for page rendering
//!
//! A single global percentage. Every change is clamped into
//! `[MIN_PERCENT, MAX_PERCENT]`; callers learn whether anything changed so a
//! no-op never triggers a re-render.

/// Outcome of a zoom update
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoomUpdate {
    Changed { from: u32, to: u32 },
    Unchanged,
}

impl ZoomUpdate {
    #[must_use]
    pub fn changed(self) -> bool {
        matches!(self, Self::Changed { .. })
    }
}

/// Zoom state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Zoom {
    percent: u32,
}

impl Default for Zoom {
    fn default() -> Self {
        Self {
            percent: Self::DEFAULT_PERCENT,
        }
    }
}

impl Zoom {
    /// Minimum allowed zoom
    pub const MIN_PERCENT: u32 = 50;
    /// Maximum allowed zoom
    pub const MAX_PERCENT: u32 = 200;
    pub const DEFAULT_PERCENT: u32 = 100;
    /// Increment for zoom in/out and each modifier-wheel tick
    pub const STEP: u32 = 10;

    #[must_use]
    pub fn new(percent: i64) -> Self {
        Self {
            percent: Self::clamp_percent(percent),
        }
    }

    /// Returns the current zoom percentage
    #[must_use]
    pub fn percent(self) -> u32 {
        self.percent
    }

    /// Raster scale factor (1.0 = 100%)
    #[must_use]
    pub fn factor(self) -> f32 {
        self.percent as f32 / 100.0
    }

    pub fn set(&mut self, percent: i64) -> ZoomUpdate {
        let to = Self::clamp_percent(percent);
        let from = std::mem::replace(&mut self.percent, to);
        if from == to {
            ZoomUpdate::Unchanged
        } else {
            ZoomUpdate::Changed { from, to }
        }
    }

    /// Zoom in by `step`
    pub fn step_in(&mut self, step: u32) -> ZoomUpdate {
        self.set(i64::from(self.percent) + i64::from(step))
    }

    /// Zoom out by `step`
    pub fn step_out(&mut self, step: u32) -> ZoomUpdate {
        self.set(i64::from(self.percent) - i64::from(step))
    }

    pub fn reset(&mut self) -> ZoomUpdate {
        self.set(i64::from(Self::DEFAULT_PERCENT))
    }

    /// Zoom delta for one modifier-wheel tick: scrolling down zooms out
    #[must_use]
    pub fn wheel_delta(delta_y: f64, step: u32) -> i64 {
        if delta_y > 0.0 {
            -i64::from(step)
        } else {
            i64::from(step)
        }
    }

    /// Clamp to the valid range
    #[must_use]
    pub fn clamp_percent(percent: i64) -> u32 {
        percent.clamp(i64::from(Self::MIN_PERCENT), i64::from(Self::MAX_PERCENT)) as u32
    }
}
