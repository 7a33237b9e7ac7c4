use std::path::{Path, PathBuf};

use crate::capture::domain::frame_source::{FrameCallback, FrameSource, SourceKind};
use crate::shared::error::PipelineError;
use crate::shared::frame::{Frame, Orientation, PixelFormat};

use super::ffmpeg_decode::{open_file, VideoInput};

/// Produces exactly one frame, decoded from an image file with ffmpeg, per
/// `start`.
pub struct StillImageSource {
    path: PathBuf,
    format: PixelFormat,
    orientation: Orientation,
    finished: bool,
}

impl StillImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: PixelFormat::default(),
            orientation: Orientation::Up,
            finished: false,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decodes the image without starting the source.
    pub fn load(&self) -> Result<Frame, PipelineError> {
        let map_err = |e: &dyn std::fmt::Display| {
            PipelineError::ImageLoad(format!("{}: {e}", self.path.display()))
        };
        let ictx = open_file(&self.path).map_err(|e| map_err(&e))?;
        let mut input = VideoInput::new(ictx, self.format).map_err(|e| map_err(&e))?;
        let pixels = input
            .next_pixels()
            .map_err(|e| map_err(&e))?
            .ok_or_else(|| map_err(&"no image data"))?;

        let frame = Frame::new(pixels, input.width(), input.height(), self.format, 0)
            .map_err(|e| map_err(&e))?;
        Ok(frame.with_orientation(self.orientation))
    }
}

impl FrameSource for StillImageSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Still
    }

    fn start(&mut self, mut on_frame: FrameCallback) -> Result<(), PipelineError> {
        let frame = self.load()?;
        log::debug!(
            "Loaded {} ({}x{})",
            self.path.display(),
            frame.width(),
            frame.height()
        );
        on_frame(frame);
        self.finished = true;
        Ok(())
    }

    fn stop(&mut self) {}

    fn is_finished(&self) -> bool {
        self.finished
    }
}
