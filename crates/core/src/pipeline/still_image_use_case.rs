use std::time::Duration;

use crate::capture::domain::frame_source::FrameSource;
use crate::overlay::domain::overlay_sink::OverlaySink;
use crate::pipeline::pipeline_coordinator::{PipelineCoordinator, PipelineReport};
use crate::shared::error::PipelineError;

pub const DEFAULT_STILL_TIMEOUT: Duration = Duration::from_secs(60);

/// Single-image pipeline: start → one frame → wait for both results → stop.
pub struct StillImageUseCase {
    coordinator: PipelineCoordinator,
    timeout: Duration,
}

impl StillImageUseCase {
    pub fn new(coordinator: PipelineCoordinator) -> Self {
        Self {
            coordinator,
            timeout: DEFAULT_STILL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs the image through the pipeline and disposes the sink.
    ///
    /// A collaborator still running after the timeout is abandoned and its
    /// result discarded.
    pub fn execute(
        self,
        source: Box<dyn FrameSource>,
        sink: Box<dyn OverlaySink>,
    ) -> Result<PipelineReport, PipelineError> {
        let running = self.coordinator.start(source, sink)?;
        if !running.wait_until_idle(self.timeout) {
            log::warn!(
                "Still image not finished after {:.1}s; stopping",
                self.timeout.as_secs_f64()
            );
        }
        Ok(running.stop())
    }
}
