use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use serde::Serialize;

use crate::capture::domain::frame_source::{FrameCallback, FrameSource, SourceKind};
use crate::detection::domain::emotion_classifier::EmotionClassifier;
use crate::detection::domain::face_detector::FaceDetector;
use crate::overlay::domain::display_transform::DisplayTransform;
use crate::overlay::domain::overlay_renderer::RenderStats;
use crate::overlay::domain::overlay_sink::OverlaySink;
use crate::pipeline::cancellation::CancellationToken;
use crate::pipeline::infrastructure::inference_worker::{Dispatcher, InferenceWorker};
use crate::pipeline::infrastructure::render_loop::{spawn_render_loop, RenderEvent};
use crate::pipeline::pipeline_logger::{shared, with_logger, NullPipelineLogger, SharedLogger};
use crate::shared::constants::{DEFAULT_VIEW_HEIGHT, DEFAULT_VIEW_WIDTH};
use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::shared::geometry::Size;

const IDLE_POLL: Duration = Duration::from_millis(5);

/// Live counters shared by the capture callback, the workers and the render
/// thread.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    pub(crate) frames_captured: AtomicUsize,
    pub(crate) detections_dispatched: AtomicUsize,
    pub(crate) detections_skipped: AtomicUsize,
    pub(crate) classifications_dispatched: AtomicUsize,
    pub(crate) classifications_skipped: AtomicUsize,
    pub(crate) detection_failures: AtomicUsize,
    pub(crate) classification_failures: AtomicUsize,
    pub(crate) overlays_rendered: AtomicUsize,
    pub(crate) labels_updated: AtomicUsize,
    pub(crate) late_results_discarded: AtomicUsize,
    /// Results sent to the render thread and not yet applied.
    pub(crate) pending_events: AtomicUsize,
}

impl PipelineCounters {
    pub fn snapshot(&self) -> PipelineStats {
        let get = |c: &AtomicUsize| c.load(Ordering::Acquire);
        PipelineStats {
            frames_captured: get(&self.frames_captured),
            detections_dispatched: get(&self.detections_dispatched),
            detections_skipped: get(&self.detections_skipped),
            classifications_dispatched: get(&self.classifications_dispatched),
            classifications_skipped: get(&self.classifications_skipped),
            detection_failures: get(&self.detection_failures),
            classification_failures: get(&self.classification_failures),
            overlays_rendered: get(&self.overlays_rendered),
            labels_updated: get(&self.labels_updated),
            late_results_discarded: get(&self.late_results_discarded),
        }
    }

    /// Counts a result that was produced but never reached the sink.
    pub(crate) fn discard_event(&self) {
        self.late_results_discarded.fetch_add(1, Ordering::Relaxed);
        let _ = self
            .pending_events
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}

/// Point-in-time copy of [`PipelineCounters`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub frames_captured: usize,
    pub detections_dispatched: usize,
    pub detections_skipped: usize,
    pub classifications_dispatched: usize,
    pub classifications_skipped: usize,
    pub detection_failures: usize,
    pub classification_failures: usize,
    pub overlays_rendered: usize,
    pub labels_updated: usize,
    pub late_results_discarded: usize,
}

/// What a stopped pipeline did.
#[derive(Clone, Copy, Debug)]
pub struct PipelineReport {
    pub stats: PipelineStats,
    pub render: RenderStats,
    pub elapsed: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Size of the surface the overlay is drawn on.
    pub view_size: Size,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            view_size: Size::new(DEFAULT_VIEW_WIDTH as f64, DEFAULT_VIEW_HEIGHT as f64),
        }
    }
}

/// Live feeds fill the view; still images fit inside it.
pub fn select_transform(kind: SourceKind, frame: Size, view: Size) -> DisplayTransform {
    match kind {
        SourceKind::Live { mirrored } => DisplayTransform::aspect_fill(frame, view, mirrored),
        SourceKind::Still => DisplayTransform::aspect_fit(frame, view),
    }
}

struct DetectionJob {
    frame: Frame,
    transform: DisplayTransform,
}

/// Wires a frame source to the face detector, the emotion classifier and an
/// overlay sink.
///
/// Each collaborator runs on its own worker thread with at most one call in
/// flight; frames arriving while a worker is busy are skipped for that
/// worker only. Results are applied to the sink on a single render thread.
/// A missing collaborator disables its output and nothing else.
pub struct PipelineCoordinator {
    config: PipelineConfig,
    detector: Option<Box<dyn FaceDetector>>,
    classifier: Option<Box<dyn EmotionClassifier>>,
    logger: SharedLogger,
}

impl PipelineCoordinator {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            detector: None,
            classifier: None,
            logger: shared(Box::new(NullPipelineLogger)),
        }
    }

    pub fn with_detector(mut self, detector: Box<dyn FaceDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn with_classifier(mut self, classifier: Box<dyn EmotionClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Spawns the workers and the render thread, then starts `source`.
    ///
    /// If the source cannot start, everything already spawned is shut down
    /// (the sink is disposed) and the source's error is returned.
    pub fn start(
        self,
        mut source: Box<dyn FrameSource>,
        sink: Box<dyn OverlaySink>,
    ) -> Result<RunningPipeline, PipelineError> {
        let cancel = CancellationToken::new();
        let counters = Arc::new(PipelineCounters::default());
        let logger = self.logger;
        let kind = source.kind();
        let view = self.config.view_size;

        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let render = spawn_render_loop(
            sink,
            events_rx,
            cancel.clone(),
            Arc::clone(&counters),
            Arc::clone(&logger),
        )?;

        let mut running = RunningPipeline {
            source: None,
            cancel: cancel.clone(),
            counters: Arc::clone(&counters),
            detection_worker: None,
            classification_worker: None,
            render: Some(render),
            render_stats: RenderStats::default(),
            logger: Arc::clone(&logger),
            started: Instant::now(),
            stopped: false,
        };

        let detect_dispatch = match self.detector {
            Some(detector) => {
                let (worker, dispatcher) = spawn_detection_worker(
                    detector,
                    events_tx.clone(),
                    &cancel,
                    &counters,
                    &logger,
                )?;
                running.detection_worker = Some(worker);
                Some(dispatcher)
            }
            None => {
                with_logger(&logger, |l| l.info("No face detector; overlay disabled"));
                None
            }
        };

        let classify_dispatch = match self.classifier {
            Some(classifier) => {
                let (worker, dispatcher) = spawn_classification_worker(
                    classifier,
                    events_tx.clone(),
                    &cancel,
                    &counters,
                    &logger,
                )?;
                running.classification_worker = Some(worker);
                Some(dispatcher)
            }
            None => {
                with_logger(&logger, |l| {
                    l.info("No emotion classifier; label disabled")
                });
                None
            }
        };
        // Only the workers may keep the render channel open.
        drop(events_tx);

        let on_frame = frame_callback(
            kind,
            view,
            detect_dispatch,
            classify_dispatch,
            cancel,
            counters,
            Arc::clone(&logger),
        );

        if let Err(e) = source.start(on_frame) {
            log::error!("Frame source failed to start: {e}");
            running.source = Some(source);
            running.shutdown();
            return Err(e);
        }
        running.source = Some(source);
        with_logger(&logger, |l| l.info("Pipeline started"));
        Ok(running)
    }
}

fn frame_callback(
    kind: SourceKind,
    view: Size,
    detect: Option<Dispatcher<DetectionJob>>,
    classify: Option<Dispatcher<Frame>>,
    cancel: CancellationToken,
    counters: Arc<PipelineCounters>,
    logger: SharedLogger,
) -> FrameCallback {
    Box::new(move |frame: Frame| {
        if cancel.is_cancelled() {
            return;
        }
        let captured = counters.frames_captured.fetch_add(1, Ordering::Relaxed) + 1;
        with_logger(&logger, |l| l.progress(captured));

        if let Some(dispatcher) = &detect {
            let (w, h) = frame.display_size();
            let transform = select_transform(kind, Size::new(w as f64, h as f64), view);
            let job = DetectionJob {
                frame: frame.clone(),
                transform,
            };
            let counter = if dispatcher.try_submit(job) {
                &counters.detections_dispatched
            } else {
                &counters.detections_skipped
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(dispatcher) = &classify {
            let counter = if dispatcher.try_submit(frame) {
                &counters.classifications_dispatched
            } else {
                &counters.classifications_skipped
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }
    })
}

fn spawn_detection_worker(
    mut detector: Box<dyn FaceDetector>,
    events: Sender<RenderEvent>,
    cancel: &CancellationToken,
    counters: &Arc<PipelineCounters>,
    logger: &SharedLogger,
) -> std::io::Result<(InferenceWorker, Dispatcher<DetectionJob>)> {
    let token = cancel.clone();
    let counters = Arc::clone(counters);
    let logger = Arc::clone(logger);

    InferenceWorker::spawn("face-detector", cancel.clone(), move |job: DetectionJob| {
        let frame_index = job.frame.index();
        let started = Instant::now();
        let result = call_guarded(|| detector.detect(&job.frame));
        let ms = started.elapsed().as_secs_f64() * 1000.0;
        with_logger(&logger, |l| l.timing("detect", ms));

        match result {
            Ok(faces) => {
                with_logger(&logger, |l| l.metric("faces", faces.len() as f64));
                let event = RenderEvent::Faces {
                    frame_index,
                    faces,
                    transform: job.transform,
                    axes: detector.landmark_axes(),
                };
                deliver(&events, event, &token, &counters);
            }
            Err(e) => {
                let err = PipelineError::DetectionFailure(e.to_string());
                log::warn!("Frame {frame_index}: {err}");
                counters.detection_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    })
}

fn spawn_classification_worker(
    mut classifier: Box<dyn EmotionClassifier>,
    events: Sender<RenderEvent>,
    cancel: &CancellationToken,
    counters: &Arc<PipelineCounters>,
    logger: &SharedLogger,
) -> std::io::Result<(InferenceWorker, Dispatcher<Frame>)> {
    let token = cancel.clone();
    let counters = Arc::clone(counters);
    let logger = Arc::clone(logger);

    InferenceWorker::spawn("emotion-classifier", cancel.clone(), move |frame: Frame| {
        let frame_index = frame.index();
        let started = Instant::now();
        let result = call_guarded(|| classifier.classify(&frame));
        let ms = started.elapsed().as_secs_f64() * 1000.0;
        with_logger(&logger, |l| l.timing("classify", ms));

        match result {
            Ok(result) => {
                let event = RenderEvent::Emotion {
                    frame_index,
                    result,
                };
                deliver(&events, event, &token, &counters);
            }
            Err(e) => {
                let err = PipelineError::ClassificationFailure(e.to_string());
                log::warn!("Frame {frame_index}: {err}");
                counters
                    .classification_failures
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
    })
}

/// Runs one collaborator call, reporting a panic as an ordinary error.
fn call_guarded<T>(
    call: impl FnOnce() -> Result<T, Box<dyn std::error::Error>>,
) -> Result<T, Box<dyn std::error::Error>> {
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown cause".to_string());
        Err(format!("collaborator panicked: {message}").into())
    })
}

/// Forwards a result to the render thread unless the pipeline was stopped
/// while it was being computed.
fn deliver(
    events: &Sender<RenderEvent>,
    event: RenderEvent,
    cancel: &CancellationToken,
    counters: &PipelineCounters,
) {
    if cancel.is_cancelled() {
        counters.late_results_discarded.fetch_add(1, Ordering::Relaxed);
        return;
    }
    counters.pending_events.fetch_add(1, Ordering::AcqRel);
    if events.send(event).is_err() {
        counters.discard_event();
    }
}

/// Handle to a started pipeline. Dropping it stops the pipeline.
pub struct RunningPipeline {
    source: Option<Box<dyn FrameSource>>,
    cancel: CancellationToken,
    counters: Arc<PipelineCounters>,
    detection_worker: Option<InferenceWorker>,
    classification_worker: Option<InferenceWorker>,
    render: Option<JoinHandle<RenderStats>>,
    render_stats: RenderStats,
    logger: SharedLogger,
    started: Instant,
    stopped: bool,
}

impl RunningPipeline {
    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    pub fn is_source_finished(&self) -> bool {
        self.source.as_ref().is_some_and(|s| s.is_finished())
    }

    /// True when the source is exhausted and every result has been applied.
    pub fn is_idle(&self) -> bool {
        let busy = |w: &Option<InferenceWorker>| w.as_ref().is_some_and(|w| w.is_busy());
        self.is_source_finished()
            && !busy(&self.detection_worker)
            && !busy(&self.classification_worker)
            && self.counters.pending_events.load(Ordering::Acquire) == 0
    }

    /// Blocks until [`is_idle`](Self::is_idle) or `timeout` elapses.
    /// Returns whether the pipeline went idle.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_idle() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(IDLE_POLL);
        }
    }

    /// Stops capture, waits for in-flight calls, and disposes the sink.
    ///
    /// Results that finish after this is called are discarded.
    pub fn stop(mut self) -> PipelineReport {
        self.shutdown();
        PipelineReport {
            stats: self.counters.snapshot(),
            render: self.render_stats,
            elapsed: self.started.elapsed(),
        }
    }

    fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.cancel.cancel();
        if let Some(source) = self.source.as_mut() {
            source.stop();
        }
        if let Some(handle) = self.render.take() {
            match handle.join() {
                Ok(stats) => self.render_stats = stats,
                Err(_) => log::error!("Render thread panicked"),
            }
        }
        for worker in [&mut self.detection_worker, &mut self.classification_worker]
            .into_iter()
            .flatten()
        {
            worker.join();
        }
        with_logger(&self.logger, |l| {
            l.info("Pipeline stopped");
            l.summary();
        });
    }
}

impl Drop for RunningPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}
