pub mod execution_provider;
pub mod math;
pub mod onnx_emotion_classifier;
pub mod onnx_face_detector;
