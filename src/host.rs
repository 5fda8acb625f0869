//! The scroll container a viewer is mounted into

/// How a programmatic scroll should move
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScrollBehavior {
    #[default]
    Auto,
    Smooth,
}

/// A wheel tick delivered by the host
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WheelEvent {
    pub delta_y: f64,
    /// Ctrl or Meta held
    pub modifier: bool,
}

impl WheelEvent {
    #[must_use]
    pub fn new(delta_y: f64, modifier: bool) -> Self {
        Self { delta_y, modifier }
    }
}

/// A mounted, scrollable container.
///
/// The host forwards its scroll and resize notifications to
/// `Viewer::on_scroll` / `Viewer::on_resize` and drives frames with
/// `Viewer::on_frame`. Offsets are CSS pixels.
pub trait ScrollHost {
    fn viewport_height(&self) -> f32;

    fn scroll_top(&self) -> f32;

    /// Move the container. A smooth scroll may land over several frames.
    fn scroll_to(&mut self, top: f32, behavior: ScrollBehavior);
}
