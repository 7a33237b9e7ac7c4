pub mod display_transform;
pub mod label_updater;
pub mod overlay;
pub mod overlay_renderer;
pub mod overlay_sink;
