pub mod emotion_classifier;
pub mod face_detector;
pub mod face_region;
