use super::overlay::Overlay;

/// Destination for committed overlays and label text.
///
/// Called from a single render thread; implementations need not be `Sync`.
pub trait OverlaySink: Send {
    fn present(&mut self, overlay: &Overlay);
    fn set_label(&mut self, text: &str);
    /// Releases whatever the sink holds. Called once, after the last present.
    fn dispose(&mut self) {}
}
