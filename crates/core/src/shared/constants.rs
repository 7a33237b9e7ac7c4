pub const FACE_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const FACE_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMOTION_MODEL_NAME: &str = "emotion-ferplus-8.onnx";
pub const EMOTION_MODEL_URL: &str =
    "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/emotion_ferplus/model/emotion-ferplus-8.onnx";

/// Directory name used under the platform cache/config directories.
pub const APP_DIR_NAME: &str = "FaceMood";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

pub const LABEL_PREFIX: &str = "Emotion: ";
pub const LABEL_LOADING: &str = "Loading...";

/// Default rendering surface, a portrait phone-sized view.
pub const DEFAULT_VIEW_WIDTH: u32 = 390;
pub const DEFAULT_VIEW_HEIGHT: u32 = 844;
