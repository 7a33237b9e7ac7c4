use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::capture::domain::capture_config::{CameraPosition, CaptureConfig, DeviceSelection};
use crate::capture::domain::frame_source::{FrameCallback, FrameSource, SourceKind};
use crate::shared::error::PipelineError;
use crate::shared::frame::{Frame, Orientation, PixelFormat};

use super::ffmpeg_decode::{open_device, open_file, VideoInput};

/// Live frame source backed by a libavdevice camera or a replayed video file.
///
/// Frames are decoded on a dedicated capture thread at the device's native
/// rate. Files are paced to their declared frame rate so they behave like a
/// camera.
pub struct CameraSource {
    config: CaptureConfig,
    running: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CameraSource {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    fn open(&self) -> Result<VideoInput, PipelineError> {
        let (label, ictx) = match &self.config.device {
            DeviceSelection::File(path) => {
                let label = path.display().to_string();
                let ictx = open_file(path)
                    .map_err(|e| PipelineError::DeviceUnavailable(format!("{label}: {e}")))?;
                (label, ictx)
            }
            DeviceSelection::Camera(position) => {
                let url = camera_url(*position)?;
                let ictx = self.open_platform_device(&url)?;
                (url, ictx)
            }
            DeviceSelection::Named(name) => {
                let ictx = self.open_platform_device(name)?;
                (name.clone(), ictx)
            }
        };

        VideoInput::new(ictx, self.config.pixel_format)
            .map_err(|e| PipelineError::DeviceUnavailable(format!("{label}: {e}")))
    }

    fn open_platform_device(
        &self,
        url: &str,
    ) -> Result<ffmpeg_next::format::context::Input, PipelineError> {
        let input_format = platform_input_format().ok_or_else(|| {
            PipelineError::DeviceUnavailable("no capture backend on this platform".into())
        })?;

        let mut options = ffmpeg_next::Dictionary::new();
        if let (Some(w), Some(h)) = (self.config.width, self.config.height) {
            options.set("video_size", &format!("{w}x{h}"));
        }
        if let Some(fps) = self.config.fps {
            options.set("framerate", &fps.to_string());
        }

        open_device(url, input_format, options)
            .map_err(|e| PipelineError::DeviceUnavailable(format!("{url}: {e}")))
    }
}

impl FrameSource for CameraSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Live {
            mirrored: self.config.mirrored,
        }
    }

    fn start(&mut self, on_frame: FrameCallback) -> Result<(), PipelineError> {
        if self.handle.is_some() {
            return Ok(());
        }

        let input = self.open()?;
        let orientation = self
            .config
            .orientation
            .unwrap_or_else(|| Orientation::from_rotation(input.rotation()));
        let pace = match self.config.device {
            DeviceSelection::File(_) => frame_interval(input.fps()),
            _ => None,
        };

        log::info!(
            "Capture started: {}x{} {:?}, orientation {:?}",
            input.width(),
            input.height(),
            self.config.pixel_format,
            orientation
        );

        self.running.store(true, Ordering::Release);
        self.finished.store(false, Ordering::Release);

        let job = CaptureJob {
            input,
            format: self.config.pixel_format,
            orientation,
            pace,
            running: Arc::clone(&self.running),
        };
        let finished = Arc::clone(&self.finished);
        let handle = std::thread::Builder::new()
            .name("capture".into())
            .spawn(move || {
                job.run(on_frame);
                finished.store(true, Ordering::Release);
            })?;

        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Capture thread panicked");
            }
            log::info!("Capture stopped");
        }
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.stop();
    }
}

struct CaptureJob {
    input: VideoInput,
    format: PixelFormat,
    orientation: Orientation,
    pace: Option<Duration>,
    running: Arc<AtomicBool>,
}

impl CaptureJob {
    fn run(mut self, mut on_frame: FrameCallback) {
        let (width, height) = (self.input.width(), self.input.height());
        let mut index = 0;
        let mut due = Instant::now();

        while self.running.load(Ordering::Acquire) {
            match self.input.next_pixels() {
                Ok(Some(pixels)) => {
                    let frame = match Frame::new(pixels, width, height, self.format, index) {
                        Ok(frame) => frame.with_orientation(self.orientation),
                        Err(e) => {
                            log::warn!("Capture produced a malformed frame {index}: {e}");
                            break;
                        }
                    };
                    index += 1;
                    on_frame(frame);
                    if let Some(interval) = self.pace {
                        due += interval;
                        self.sleep_until(due);
                    }
                }
                Ok(None) => {
                    log::info!("Capture reached end of input after {index} frames");
                    break;
                }
                Err(e) => {
                    log::warn!("Capture failed after {index} frames: {e}");
                    break;
                }
            }
        }
    }

    fn sleep_until(&self, due: Instant) {
        const SLICE: Duration = Duration::from_millis(10);
        loop {
            let now = Instant::now();
            if now >= due || !self.running.load(Ordering::Acquire) {
                return;
            }
            std::thread::sleep((due - now).min(SLICE));
        }
    }
}

fn frame_interval(fps: f64) -> Option<Duration> {
    (fps > 0.0).then(|| Duration::from_secs_f64(1.0 / fps))
}

fn platform_input_format() -> Option<&'static str> {
    if cfg!(target_os = "linux") {
        Some("v4l2")
    } else if cfg!(target_os = "macos") {
        Some("avfoundation")
    } else if cfg!(target_os = "windows") {
        Some("dshow")
    } else {
        None
    }
}

/// Device URL for a camera position on this platform.
fn camera_url(position: CameraPosition) -> Result<String, PipelineError> {
    let index = position.device_index();
    if cfg!(target_os = "linux") {
        Ok(format!("/dev/video{index}"))
    } else if cfg!(target_os = "macos") {
        Ok(format!("{index}:none"))
    } else {
        Err(PipelineError::DeviceUnavailable(format!(
            "{position:?} camera cannot be selected by position here; pass a device name"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::infrastructure::ffmpeg_decode::test_support::create_test_video;
    use std::sync::Mutex;

    fn recording_callback() -> (FrameCallback, Arc<Mutex<Vec<Frame>>>) {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&frames);
        let callback: FrameCallback = Box::new(move |frame| sink.lock().unwrap().push(frame));
        (callback, frames)
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_replays_file_as_live_feed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        create_test_video(&path, 5, 160, 120, 50);

        let mut source = CameraSource::new(CaptureConfig::file(&path));
        let (callback, frames) = recording_callback();
        source.start(callback).unwrap();
        assert!(wait_for(|| source.is_finished()));
        source.stop();

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 5);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.index(), i);
            assert_eq!((frame.width(), frame.height()), (160, 120));
            assert_eq!(frame.format(), PixelFormat::Rgb8);
        }
    }

    #[test]
    fn test_config_controls_format_and_orientation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        create_test_video(&path, 2, 64, 48, 50);

        let config = CaptureConfig::file(&path)
            .with_pixel_format(PixelFormat::Gray8)
            .with_orientation(Orientation::Right);
        let mut source = CameraSource::new(config);
        let (callback, frames) = recording_callback();
        source.start(callback).unwrap();
        assert!(wait_for(|| source.is_finished()));

        let frames = frames.lock().unwrap();
        assert_eq!(frames[0].format(), PixelFormat::Gray8);
        assert_eq!(frames[0].data().len(), 64 * 48);
        assert_eq!(frames[0].orientation(), Orientation::Right);
        assert_eq!(frames[0].display_size(), (48, 64));
    }

    #[test]
    fn test_no_frames_after_stop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.mp4");
        create_test_video(&path, 100, 64, 48, 25);

        let mut source = CameraSource::new(CaptureConfig::file(&path));
        let (callback, frames) = recording_callback();
        source.start(callback).unwrap();
        assert!(wait_for(|| !frames.lock().unwrap().is_empty()));
        source.stop();

        let count = frames.lock().unwrap().len();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(frames.lock().unwrap().len(), count);
        assert!(count < 100);
    }

    #[test]
    fn test_missing_file_is_device_unavailable() {
        let mut source = CameraSource::new(CaptureConfig::file("/nonexistent/clip.mp4"));
        let (callback, frames) = recording_callback();
        let err = source.start(callback).unwrap_err();
        assert!(matches!(err, PipelineError::DeviceUnavailable(_)));
        assert!(frames.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_named_device_is_device_unavailable() {
        let mut source = CameraSource::new(CaptureConfig::named("/dev/no-such-camera"));
        let (callback, _) = recording_callback();
        assert!(matches!(
            source.start(callback),
            Err(PipelineError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn test_kind_reports_mirroring() {
        let front = CameraSource::new(CaptureConfig::camera(CameraPosition::Front));
        assert_eq!(front.kind(), SourceKind::Live { mirrored: true });
        let back = CameraSource::new(CaptureConfig::camera(CameraPosition::Back));
        assert_eq!(back.kind(), SourceKind::Live { mirrored: false });
    }

    #[test]
    fn test_frame_interval() {
        assert_eq!(frame_interval(0.0), None);
        assert_eq!(frame_interval(4.0), Some(Duration::from_millis(250)));
    }
}
