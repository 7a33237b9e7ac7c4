//! Fakes shared by the pipeline tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::capture::domain::frame_source::{FrameCallback, FrameSource, SourceKind};
use crate::detection::domain::emotion_classifier::{EmotionClassifier, EmotionResult};
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_region::FaceRegion;
use crate::overlay::domain::overlay::Overlay;
use crate::overlay::domain::overlay_sink::OverlaySink;
use crate::shared::error::PipelineError;
use crate::shared::frame::{Frame, PixelFormat};

pub fn frame(index: usize, width: u32, height: u32) -> Frame {
    Frame::new(
        vec![0; (width * height * 3) as usize],
        width,
        height,
        PixelFormat::Rgb8,
        index,
    )
    .unwrap()
}

pub fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

// --- Source ---

type SharedCallback = Arc<Mutex<Option<FrameCallback>>>;

/// A source the test drives by hand through a [`ManualFeed`].
pub struct ManualSource {
    kind: SourceKind,
    callback: SharedCallback,
    finished: Arc<AtomicBool>,
    fail_with: Option<String>,
}

#[derive(Clone)]
pub struct ManualFeed {
    callback: SharedCallback,
    finished: Arc<AtomicBool>,
}

impl ManualSource {
    pub fn new(kind: SourceKind) -> (Self, ManualFeed) {
        let callback = Arc::new(Mutex::new(None));
        let finished = Arc::new(AtomicBool::new(false));
        let feed = ManualFeed {
            callback: Arc::clone(&callback),
            finished: Arc::clone(&finished),
        };
        let source = Self {
            kind,
            callback,
            finished,
            fail_with: None,
        };
        (source, feed)
    }

    pub fn failing(reason: &str) -> Self {
        let (mut source, _) = Self::new(SourceKind::Live { mirrored: false });
        source.fail_with = Some(reason.to_string());
        source
    }
}

impl FrameSource for ManualSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn start(&mut self, on_frame: FrameCallback) -> Result<(), PipelineError> {
        if let Some(reason) = &self.fail_with {
            return Err(PipelineError::DeviceUnavailable(reason.clone()));
        }
        *self.callback.lock().unwrap() = Some(on_frame);
        Ok(())
    }

    fn stop(&mut self) {
        self.callback.lock().unwrap().take();
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

impl ManualFeed {
    pub fn push(&self, frame: Frame) {
        if let Some(callback) = self.callback.lock().unwrap().as_mut() {
            callback(frame);
        }
    }

    /// Drops the callback and reports the source as finished.
    pub fn finish(&self) {
        self.callback.lock().unwrap().take();
        self.finished.store(true, Ordering::Release);
    }
}

// --- Detector ---

pub struct FakeDetector {
    pub faces: Vec<FaceRegion>,
    pub fail: bool,
    pub calls: Arc<AtomicUsize>,
}

impl FakeDetector {
    pub fn returning(faces: Vec<FaceRegion>) -> Self {
        Self {
            faces,
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::returning(Vec::new())
        }
    }
}

impl FaceDetector for FakeDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<FaceRegion>, Box<dyn std::error::Error>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err("model exploded".into());
        }
        Ok(self.faces.clone())
    }
}

/// Detector whose calls block until the test opens the gate.
pub struct GatedDetector {
    pub faces: Vec<FaceRegion>,
    pub entered: Sender<usize>,
    pub gate: Receiver<()>,
}

impl GatedDetector {
    /// Returns the detector, a receiver of entered frame indices and the gate.
    pub fn new(faces: Vec<FaceRegion>) -> (Self, Receiver<usize>, Sender<()>) {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
        let detector = Self {
            faces,
            entered: entered_tx,
            gate: gate_rx,
        };
        (detector, entered_rx, gate_tx)
    }
}

impl FaceDetector for GatedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceRegion>, Box<dyn std::error::Error>> {
        let _ = self.entered.send(frame.index());
        let _ = self.gate.recv();
        Ok(self.faces.clone())
    }
}

/// Detector that panics on its first call and succeeds afterwards.
pub struct PanicOnceDetector {
    pub faces: Vec<FaceRegion>,
    pub panicked: bool,
}

impl FaceDetector for PanicOnceDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<FaceRegion>, Box<dyn std::error::Error>> {
        if !self.panicked {
            self.panicked = true;
            panic!("tensor index out of bounds");
        }
        Ok(self.faces.clone())
    }
}

// --- Classifier ---

pub struct FakeClassifier {
    pub result: Option<EmotionResult>,
}

impl EmotionClassifier for FakeClassifier {
    fn classify(&mut self, _frame: &Frame) -> Result<EmotionResult, Box<dyn std::error::Error>> {
        self.result.ok_or_else(|| "classifier unavailable".into())
    }
}

/// Classifier whose calls block until the test opens the gate.
pub struct GatedClassifier {
    pub result: EmotionResult,
    pub entered: Sender<usize>,
    pub gate: Receiver<()>,
}

impl GatedClassifier {
    /// Returns the classifier, a receiver of entered frame indices and the gate.
    pub fn new(result: EmotionResult) -> (Self, Receiver<usize>, Sender<()>) {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
        let classifier = Self {
            result,
            entered: entered_tx,
            gate: gate_rx,
        };
        (classifier, entered_rx, gate_tx)
    }
}

impl EmotionClassifier for GatedClassifier {
    fn classify(&mut self, frame: &Frame) -> Result<EmotionResult, Box<dyn std::error::Error>> {
        let _ = self.entered.send(frame.index());
        let _ = self.gate.recv();
        Ok(self.result)
    }
}

// --- Sink ---

#[derive(Default)]
pub struct Recorded {
    pub overlays: Vec<Overlay>,
    pub labels: Vec<String>,
    pub disposed: bool,
    pub calls_after_dispose: usize,
}

#[derive(Clone, Default)]
pub struct RecordingSink(pub Arc<Mutex<Recorded>>);

impl RecordingSink {
    pub fn recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.0.lock().unwrap()
    }
}

impl OverlaySink for RecordingSink {
    fn present(&mut self, overlay: &Overlay) {
        let mut r = self.0.lock().unwrap();
        if r.disposed {
            r.calls_after_dispose += 1;
        }
        r.overlays.push(overlay.clone());
    }

    fn set_label(&mut self, text: &str) {
        let mut r = self.0.lock().unwrap();
        if r.disposed {
            r.calls_after_dispose += 1;
        }
        r.labels.push(text.to_string());
    }

    fn dispose(&mut self) {
        self.0.lock().unwrap().disposed = true;
    }
}
