//! FER+ emotion classifier using ONNX Runtime via `ort`.
//!
//! The whole upright frame is converted to grayscale, resized to the model's
//! input resolution and fed as raw 0-255 intensities.
use std::path::Path;

use image::{imageops, DynamicImage, RgbImage};

use crate::detection::domain::emotion_classifier::{Emotion, EmotionClassifier, EmotionResult};
use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;

use super::execution_provider::{input_spatial_size, load_session};
use super::math::{argmax, softmax};

/// FER+ input resolution, used when the model's input shape is dynamic.
const DEFAULT_INPUT_SIZE: (u32, u32) = (64, 64);

pub struct OnnxEmotionClassifier {
    session: ort::session::Session,
    input_size: (u32, u32),
}

impl OnnxEmotionClassifier {
    pub fn new(model_path: &Path) -> Result<Self, PipelineError> {
        let session = load_session(model_path)?;
        let input_size = input_spatial_size(&session).unwrap_or(DEFAULT_INPUT_SIZE);
        log::debug!(
            "Emotion model {} loaded, input {}x{}",
            model_path.display(),
            input_size.0,
            input_size.1
        );
        Ok(Self {
            session,
            input_size,
        })
    }
}

impl EmotionClassifier for OnnxEmotionClassifier {
    fn classify(&mut self, frame: &Frame) -> Result<EmotionResult, Box<dyn std::error::Error>> {
        let (w, h) = self.input_size;
        let input_tensor = preprocess(&frame.to_rgb_image(), w, h);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("Emotion model produced no outputs".into());
        }
        let scores = outputs[0].try_extract_array::<f32>()?;
        let logits = scores.as_slice().ok_or("Cannot get score slice")?;

        Ok(interpret_scores(logits)?)
    }
}

/// Grayscale + resize into a `[1, 1, h, w]` tensor of raw intensities.
fn preprocess(image: &RgbImage, width: u32, height: u32) -> ndarray::Array4<f32> {
    let gray = DynamicImage::ImageRgb8(image.clone()).to_luma8();
    let resized = imageops::resize(&gray, width, height, imageops::FilterType::Triangle);

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 1, height as usize, width as usize));
    for (x, y, px) in resized.enumerate_pixels() {
        tensor[[0, 0, y as usize, x as usize]] = px.0[0] as f32;
    }
    tensor
}

/// Picks the most probable emotion from raw model scores.
fn interpret_scores(logits: &[f32]) -> Result<EmotionResult, String> {
    if logits.len() != Emotion::ALL.len() {
        return Err(format!(
            "Expected {} emotion scores, got {}",
            Emotion::ALL.len(),
            logits.len()
        ));
    }
    let probabilities = softmax(logits);
    let (index, confidence) = argmax(&probabilities).ok_or("Empty emotion scores")?;
    let emotion = Emotion::from_index(index).ok_or("Emotion index out of range")?;
    Ok(EmotionResult::new(emotion, confidence))
}
