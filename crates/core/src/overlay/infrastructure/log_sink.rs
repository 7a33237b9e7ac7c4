use crate::overlay::domain::overlay::Overlay;
use crate::overlay::domain::overlay_sink::OverlaySink;

/// Reports overlay updates through the `log` facade.
#[derive(Debug, Default)]
pub struct LogOverlaySink {
    presented: usize,
    label: String,
}

impl LogOverlaySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presented(&self) -> usize {
        self.presented
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl OverlaySink for LogOverlaySink {
    fn present(&mut self, overlay: &Overlay) {
        self.presented += 1;
        log::debug!(
            "Overlay frame {:?}: {} faces, {} landmark groups",
            overlay.frame_index,
            overlay.rectangles().count(),
            overlay.polylines().count()
        );
    }

    fn set_label(&mut self, text: &str) {
        if text != self.label {
            log::info!("{text}");
            self.label = text.to_string();
        }
    }

    fn dispose(&mut self) {
        log::debug!("Overlay surface disposed after {} updates", self.presented);
    }
}
