mod settings;

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;

use facemood_core::capture::domain::capture_config::{CameraPosition, CaptureConfig};
use facemood_core::capture::infrastructure::camera_source::CameraSource;
use facemood_core::capture::infrastructure::still_image_source::StillImageSource;
use facemood_core::detection::domain::emotion_classifier::EmotionClassifier;
use facemood_core::detection::domain::face_detector::FaceDetector;
use facemood_core::detection::infrastructure::onnx_emotion_classifier::OnnxEmotionClassifier;
use facemood_core::detection::infrastructure::onnx_face_detector::OnnxFaceDetector;
use facemood_core::overlay::domain::overlay_sink::OverlaySink;
use facemood_core::overlay::infrastructure::annotated_image_sink::AnnotatedImageSink;
use facemood_core::overlay::infrastructure::fan_out_sink::FanOutSink;
use facemood_core::overlay::infrastructure::json_lines_sink::JsonLinesOverlaySink;
use facemood_core::overlay::infrastructure::log_sink::LogOverlaySink;
use facemood_core::pipeline::pipeline_coordinator::{
    PipelineConfig, PipelineCoordinator, PipelineReport,
};
use facemood_core::pipeline::pipeline_logger::{shared, LogPipelineLogger};
use facemood_core::pipeline::still_image_use_case::StillImageUseCase;
use facemood_core::shared::constants::{APP_DIR_NAME, IMAGE_EXTENSIONS};
use facemood_core::shared::error::PipelineError;
use facemood_core::shared::frame::PixelFormat;
use facemood_core::shared::geometry::Size;
use facemood_core::shared::model_resolver::{ModelResolver, ModelSpec, EMOTION_MODEL, FACE_MODEL};

use settings::Settings;

/// Face landmark and emotion overlays for camera feeds and images.
#[derive(Parser)]
#[command(name = "facemood", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run on a live camera, a named capture device, or a video file.
    Live(LiveArgs),
    /// Run once on a still image.
    Still(StillArgs),
}

#[derive(Args)]
struct LiveArgs {
    /// Built-in camera: front or back.
    #[arg(long, conflicts_with_all = ["device", "input"])]
    camera: Option<CameraPosition>,

    /// Platform capture device name (e.g. /dev/video2).
    #[arg(long, conflicts_with = "input")]
    device: Option<String>,

    /// Replay a video file as if it were a camera.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Requested capture width.
    #[arg(long, requires = "height")]
    width: Option<u32>,

    /// Requested capture height.
    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// Requested capture frame rate.
    #[arg(long)]
    fps: Option<u32>,

    /// Show the front camera unmirrored.
    #[arg(long)]
    no_mirror: bool,

    /// Pixel format delivered by the source: rgb, bgra or gray.
    #[arg(long, default_value = "rgb")]
    pixel_format: PixelFormat,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct StillArgs {
    /// Input image file.
    image: PathBuf,

    /// Write the image with the overlay drawn on it.
    #[arg(long)]
    annotate: Option<PathBuf>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct CommonArgs {
    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Face landmark model (downloaded on first use if omitted).
    #[arg(long)]
    face_model: Option<PathBuf>,

    /// Emotion model (downloaded on first use if omitted).
    #[arg(long)]
    emotion_model: Option<PathBuf>,

    /// Width of the view the overlay is drawn for.
    #[arg(long)]
    view_width: Option<u32>,

    /// Height of the view the overlay is drawn for.
    #[arg(long)]
    view_height: Option<u32>,

    /// Append overlay and label updates as JSON lines to this file.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Remember --confidence, --camera, view size and model paths as defaults.
    #[arg(long)]
    save_settings: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let mut settings = Settings::load();
    let common = match &cli.command {
        Command::Live(args) => {
            if let Some(camera) = args.camera {
                settings.camera = camera;
            }
            &args.common
        }
        Command::Still(args) => &args.common,
    };
    apply_overrides(&mut settings, common);
    if common.save_settings {
        save_settings(&settings)?;
    }

    let coordinator = build_coordinator(&settings);
    match &cli.command {
        Command::Live(args) => run_live(args, &settings, coordinator),
        Command::Still(args) => run_still(args, &settings, coordinator),
    }
}

fn run_live(
    args: &LiveArgs,
    settings: &Settings,
    coordinator: PipelineCoordinator,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = capture_config(args, settings);
    let sink = build_sink(args.common.json.as_deref(), None)?;
    let running = coordinator.start(Box::new(CameraSource::new(config)), sink)?;

    let enter = spawn_enter_listener()?;
    eprintln!("Running. Press Enter to stop.");
    loop {
        if running.is_idle() {
            log::info!("Source finished");
            break;
        }
        match enter.recv_timeout(Duration::from_millis(100)) {
            Ok(()) => break,
            Err(RecvTimeoutError::Timeout) => {}
            // stdin closed; keep running until the source ends.
            Err(RecvTimeoutError::Disconnected) => std::thread::sleep(Duration::from_millis(100)),
        }
    }

    log_report(&running.stop());
    Ok(())
}

fn run_still(
    args: &StillArgs,
    settings: &Settings,
    coordinator: PipelineCoordinator,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = StillImageSource::new(&args.image);
    let annotated = match &args.annotate {
        Some(output) => {
            let image = source.load()?.to_rgb_image();
            let view = Size::new(settings.view_width as f64, settings.view_height as f64);
            Some(AnnotatedImageSink::new(&image, view, output))
        }
        None => None,
    };
    let sink = build_sink(args.common.json.as_deref(), annotated)?;

    let report = StillImageUseCase::new(coordinator).execute(Box::new(source), sink)?;
    log_report(&report);
    Ok(())
}

fn build_coordinator(settings: &Settings) -> PipelineCoordinator {
    let resolver = model_resolver();
    let config = PipelineConfig {
        view_size: Size::new(settings.view_width as f64, settings.view_height as f64),
    };
    let mut coordinator = PipelineCoordinator::new(config)
        .with_logger(shared(Box::new(LogPipelineLogger::default())));

    if let Some(detector) = load_detector(&resolver, settings) {
        coordinator = coordinator.with_detector(detector);
    }
    if let Some(classifier) = load_classifier(&resolver, settings) {
        coordinator = coordinator.with_classifier(classifier);
    }
    coordinator
}

fn load_detector(resolver: &ModelResolver, settings: &Settings) -> Option<Box<dyn FaceDetector>> {
    let loaded = resolve_model(resolver, &FACE_MODEL, settings.face_model.as_deref())
        .and_then(|path| {
            OnnxFaceDetector::new(&path, settings.confidence).map_err(|e| e.to_string())
        });
    match loaded {
        Ok(detector) => Some(Box::new(detector)),
        Err(reason) => {
            log::warn!("{}; face overlay disabled", PipelineError::ModelLoadFailure(reason));
            None
        }
    }
}

fn load_classifier(
    resolver: &ModelResolver,
    settings: &Settings,
) -> Option<Box<dyn EmotionClassifier>> {
    let loaded = resolve_model(resolver, &EMOTION_MODEL, settings.emotion_model.as_deref())
        .and_then(|path| OnnxEmotionClassifier::new(&path).map_err(|e| e.to_string()));
    match loaded {
        Ok(classifier) => Some(Box::new(classifier)),
        Err(reason) => {
            log::warn!("{}; emotion label disabled", PipelineError::ModelLoadFailure(reason));
            None
        }
    }
}

fn resolve_model(
    resolver: &ModelResolver,
    spec: &ModelSpec,
    override_path: Option<&Path>,
) -> Result<PathBuf, String> {
    log::info!("Resolving model: {}", spec.name);
    let name = spec.name;
    let path = resolver
        .resolve(
            spec,
            override_path,
            Some(Box::new(move |downloaded, total| {
                download_progress(name, downloaded, total)
            })),
        )
        .map_err(|e| e.to_string())?;
    Ok(path)
}

fn model_resolver() -> ModelResolver {
    let bundled = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("models")));
    match ModelResolver::with_default_cache(bundled.clone()) {
        Ok(resolver) => resolver,
        Err(e) => {
            let fallback = std::env::temp_dir().join(APP_DIR_NAME).join("models");
            log::warn!("{e}; caching models in {}", fallback.display());
            ModelResolver::new(fallback, bundled)
        }
    }
}

fn build_sink(
    json: Option<&Path>,
    annotated: Option<AnnotatedImageSink>,
) -> Result<Box<dyn OverlaySink>, Box<dyn std::error::Error>> {
    let mut sink = FanOutSink::new().with(Box::new(LogOverlaySink::new()));
    if let Some(path) = json {
        sink = sink.with(Box::new(JsonLinesOverlaySink::create(path)?));
    }
    if let Some(annotated) = annotated {
        sink = sink.with(Box::new(annotated));
    }
    Ok(Box::new(sink))
}

fn capture_config(args: &LiveArgs, settings: &Settings) -> CaptureConfig {
    let mut config = if let Some(input) = &args.input {
        CaptureConfig::file(input)
    } else if let Some(device) = &args.device {
        CaptureConfig::named(device.as_str())
    } else {
        CaptureConfig::camera(settings.camera)
    };
    if let (Some(width), Some(height)) = (args.width, args.height) {
        config = config.with_size(width, height);
    }
    if let Some(fps) = args.fps {
        config = config.with_fps(fps);
    }
    if args.no_mirror {
        config = config.with_mirrored(false);
    }
    config.with_pixel_format(args.pixel_format)
}

/// Delivers one message per line read from stdin.
fn spawn_enter_listener() -> std::io::Result<crossbeam_channel::Receiver<()>> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            let mut line = String::new();
            let stdin = std::io::stdin();
            while matches!(stdin.lock().read_line(&mut line), Ok(n) if n > 0) {
                if tx.send(()).is_err() {
                    break;
                }
                line.clear();
            }
        })?;
    Ok(rx)
}

fn apply_overrides(settings: &mut Settings, common: &CommonArgs) {
    if let Some(confidence) = common.confidence {
        settings.confidence = confidence;
    }
    if let Some(width) = common.view_width {
        settings.view_width = width;
    }
    if let Some(height) = common.view_height {
        settings.view_height = height;
    }
    if let Some(path) = &common.face_model {
        settings.face_model = Some(path.clone());
    }
    if let Some(path) = &common.emotion_model {
        settings.emotion_model = Some(path.clone());
    }
}

fn save_settings(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let path = Settings::config_path().ok_or("could not determine config directory")?;
    settings.save_to(&path)?;
    log::info!("Settings saved to {}", path.display());
    Ok(())
}

fn log_report(report: &PipelineReport) {
    let s = &report.stats;
    log::info!(
        "{} frames in {:.1}s: {} overlays, {} labels, {} detections skipped, {} classifications skipped",
        s.frames_captured,
        report.elapsed.as_secs_f64(),
        s.overlays_rendered,
        s.labels_updated,
        s.detections_skipped,
        s.classifications_skipped
    );
    if s.detection_failures + s.classification_failures > 0 {
        log::warn!(
            "{} detection and {} classification failures",
            s.detection_failures,
            s.classification_failures
        );
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let common = match &cli.command {
        Command::Live(args) => {
            if let Some(input) = &args.input {
                if !input.exists() {
                    return Err(format!("Input file not found: {}", input.display()).into());
                }
            }
            if args.fps == Some(0) {
                return Err("Frame rate must be positive".into());
            }
            if args.width == Some(0) || args.height == Some(0) {
                return Err("Capture size must be positive".into());
            }
            &args.common
        }
        Command::Still(args) => {
            if !args.image.exists() {
                return Err(format!("Input file not found: {}", args.image.display()).into());
            }
            if !is_image(&args.image) {
                return Err(format!(
                    "Unsupported image type: {} (expected one of {})",
                    args.image.display(),
                    IMAGE_EXTENSIONS.join(", ")
                )
                .into());
            }
            &args.common
        }
    };

    if let Some(confidence) = common.confidence {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(format!(
                "Confidence must be between 0.0 and 1.0, got {confidence}"
            )
            .into());
        }
    }
    if common.view_width == Some(0) || common.view_height == Some(0) {
        return Err("View size must be positive".into());
    }
    for path in [&common.face_model, &common.emotion_model].into_iter().flatten() {
        if !path.exists() {
            return Err(format!("Model file not found: {}", path.display()).into());
        }
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn download_progress(model: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {model}... {pct}%");
    } else {
        eprint!("\rDownloading {model}... {downloaded} bytes");
    }
    if total > 0 && downloaded >= total {
        eprintln!();
    }
}
