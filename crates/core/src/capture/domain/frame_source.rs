use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;

/// What kind of feed a source produces; drives the display transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Live { mirrored: bool },
    Still,
}

pub type FrameCallback = Box<dyn FnMut(Frame) + Send>;

/// Produces frames on its own thread and hands each one to a callback.
pub trait FrameSource: Send {
    fn kind(&self) -> SourceKind;

    /// Begins production. Fails with [`PipelineError::DeviceUnavailable`]
    /// (or [`PipelineError::ImageLoad`] for a still image) before any frame
    /// is produced.
    fn start(&mut self, on_frame: FrameCallback) -> Result<(), PipelineError>;

    /// Ends production and releases capture resources. No callback runs
    /// after this returns.
    fn stop(&mut self);

    /// True once the source has nothing more to produce.
    fn is_finished(&self) -> bool;
}
