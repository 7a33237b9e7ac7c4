use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::detection::domain::emotion_classifier::EmotionResult;
use crate::detection::domain::face_region::{FaceRegion, LandmarkAxes};
use crate::overlay::domain::display_transform::DisplayTransform;
use crate::overlay::domain::label_updater::LabelUpdater;
use crate::overlay::domain::overlay_renderer::{OverlayRenderer, RenderStats};
use crate::overlay::domain::overlay_sink::OverlaySink;
use crate::pipeline::cancellation::CancellationToken;
use crate::pipeline::pipeline_coordinator::PipelineCounters;
use crate::pipeline::pipeline_logger::{with_logger, SharedLogger};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A collaborator result on its way to the render thread.
#[derive(Debug)]
pub enum RenderEvent {
    Faces {
        frame_index: usize,
        faces: Vec<FaceRegion>,
        transform: DisplayTransform,
        axes: LandmarkAxes,
    },
    Emotion {
        frame_index: usize,
        result: EmotionResult,
    },
}

/// Spawns the only thread allowed to touch the overlay and the label.
///
/// Runs until the event channel disconnects or `cancel` fires. Events still
/// queued at that point are discarded. On exit the overlay is torn down and
/// the sink disposed, so no draw reaches the sink after the thread ends.
pub fn spawn_render_loop(
    mut sink: Box<dyn OverlaySink>,
    events: Receiver<RenderEvent>,
    cancel: CancellationToken,
    counters: Arc<PipelineCounters>,
    logger: SharedLogger,
) -> std::io::Result<JoinHandle<RenderStats>> {
    std::thread::Builder::new()
        .name("render".into())
        .spawn(move || {
            let mut renderer = OverlayRenderer::new();
            let mut label = LabelUpdater::new();
            sink.set_label(label.text());

            loop {
                match events.recv_timeout(POLL_INTERVAL) {
                    Ok(event) => {
                        if cancel.is_cancelled() {
                            counters.discard_event();
                            break;
                        }
                        let started = Instant::now();
                        handle_event(event, &mut renderer, &mut label, sink.as_mut(), &counters);
                        let ms = started.elapsed().as_secs_f64() * 1000.0;
                        with_logger(&logger, |l| l.timing("render", ms));
                        counters.pending_events.fetch_sub(1, Ordering::AcqRel);
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        if cancel.is_cancelled() {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }

            for _ in events.try_iter() {
                counters.discard_event();
            }

            renderer.teardown();
            sink.dispose();
            renderer.stats()
        })
}

fn handle_event(
    event: RenderEvent,
    renderer: &mut OverlayRenderer,
    label: &mut LabelUpdater,
    sink: &mut dyn OverlaySink,
    counters: &PipelineCounters,
) {
    match event {
        RenderEvent::Faces {
            frame_index,
            faces,
            transform,
            axes,
        } => {
            let overlay = renderer.render_faces(frame_index, &faces, &transform, axes);
            sink.present(overlay);
            counters.overlays_rendered.fetch_add(1, Ordering::Relaxed);
        }
        RenderEvent::Emotion {
            frame_index,
            result,
        } => {
            log::debug!(
                "Frame {frame_index}: {} ({:.2})",
                result.label(),
                result.confidence
            );
            sink.set_label(label.update(result.label()));
            counters.labels_updated.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::emotion_classifier::Emotion;
    use crate::pipeline::pipeline_logger::{shared, NullPipelineLogger};
    use crate::pipeline::test_support::RecordingSink;
    use crate::shared::geometry::{NormalizedRect, Size};

    fn faces_event(frame_index: usize, count: usize) -> RenderEvent {
        RenderEvent::Faces {
            frame_index,
            faces: vec![FaceRegion::new(NormalizedRect::new(0.2, 0.3, 0.4, 0.4)); count],
            transform: DisplayTransform::aspect_fit(
                Size::new(300.0, 300.0),
                Size::new(300.0, 300.0),
            ),
            axes: LandmarkAxes::Swapped,
        }
    }

    fn start(
        cancel: &CancellationToken,
    ) -> (
        crossbeam_channel::Sender<RenderEvent>,
        JoinHandle<RenderStats>,
        RecordingSink,
        Arc<PipelineCounters>,
    ) {
        let sink = RecordingSink::default();
        let counters = Arc::new(PipelineCounters::default());
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = spawn_render_loop(
            Box::new(sink.clone()),
            rx,
            cancel.clone(),
            Arc::clone(&counters),
            shared(Box::new(NullPipelineLogger)),
        )
        .unwrap();
        (tx, handle, sink, counters)
    }

    fn send(
        tx: &crossbeam_channel::Sender<RenderEvent>,
        counters: &PipelineCounters,
        event: RenderEvent,
    ) {
        counters.pending_events.fetch_add(1, Ordering::AcqRel);
        tx.send(event).unwrap();
    }

    #[test]
    fn test_renders_faces_and_labels_in_order() {
        let cancel = CancellationToken::new();
        let (tx, handle, sink, counters) = start(&cancel);

        send(&tx, &counters, faces_event(0, 2));
        send(
            &tx,
            &counters,
            RenderEvent::Emotion {
                frame_index: 0,
                result: EmotionResult::new(Emotion::Happiness, 0.9),
            },
        );
        send(&tx, &counters, faces_event(1, 0));
        drop(tx);

        let stats = handle.join().unwrap();
        let recorded = sink.recorded();
        assert_eq!(recorded.labels, vec!["Emotion: Loading...", "Emotion: happiness"]);
        assert_eq!(recorded.overlays.len(), 2);
        assert_eq!(recorded.overlays[0].rectangles().count(), 2);
        assert!(recorded.overlays[1].is_empty());
        assert!(recorded.disposed);
        assert_eq!(stats.clears, 2);
        assert_eq!(counters.pending_events.load(Ordering::Acquire), 0);
        assert_eq!(counters.snapshot().overlays_rendered, 2);
    }

    #[test]
    fn test_cancel_discards_queued_events() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let sink = RecordingSink::default();
        let counters = Arc::new(PipelineCounters::default());
        let (tx, rx) = crossbeam_channel::unbounded();
        send(&tx, &counters, faces_event(0, 1));
        send(&tx, &counters, faces_event(1, 1));

        let handle = spawn_render_loop(
            Box::new(sink.clone()),
            rx,
            cancel,
            Arc::clone(&counters),
            shared(Box::new(NullPipelineLogger)),
        )
        .unwrap();
        handle.join().unwrap();

        let recorded = sink.recorded();
        assert!(recorded.overlays.is_empty());
        assert!(recorded.disposed);
        assert_eq!(counters.snapshot().late_results_discarded, 2);
        assert_eq!(counters.pending_events.load(Ordering::Acquire), 0);
    }
}
