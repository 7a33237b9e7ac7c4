use crate::shared::frame::Frame;

use super::face_region::{FaceRegion, LandmarkAxes};

/// Domain interface for face landmark detection.
///
/// Implementations may be stateful, hence `&mut self`. The pipeline keeps at
/// most one call in flight per detector.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceRegion>, Box<dyn std::error::Error>>;

    /// Axis convention of the landmark points this detector reports.
    fn landmark_axes(&self) -> LandmarkAxes {
        LandmarkAxes::Swapped
    }
}
