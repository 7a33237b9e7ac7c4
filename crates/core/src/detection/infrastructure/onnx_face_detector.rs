//! YOLO face/keypoint detector using ONNX Runtime via `ort`.
//!
//! Handles letterbox preprocessing, inference and NMS, then reports each face
//! as a normalized box with landmark groups built from the five keypoints.
use std::path::Path;

use image::RgbImage;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_region::{
    FaceRegion, LandmarkAxes, LandmarkGroup, LEFT_EYE, NOSE, OUTER_LIPS, RIGHT_EYE,
};
use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::shared::geometry::{NormalizedRect, Point};

use super::execution_provider::{input_spatial_size, load_session};
use super::math::bbox_iou;

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for face detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// Number of keypoints per detection (5 landmarks × 3 values each: x, y, conf).
const NUM_KEYPOINT_VALUES: usize = 15;

/// Minimum keypoint confidence to treat a landmark as visible.
const KEYPOINT_CONF_THRESH: f64 = 0.5;

/// YOLO face detector backed by an ONNX Runtime session.
pub struct OnnxFaceDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxFaceDetector {
    /// Load a YOLO ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, PipelineError> {
        let session = load_session(model_path)?;
        let input_size = input_spatial_size(&session)
            .map(|(_, h)| h)
            .unwrap_or(DEFAULT_INPUT_SIZE);
        log::debug!(
            "Face model {} loaded, input {input_size}x{input_size}",
            model_path.display()
        );

        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceRegion>, Box<dyn std::error::Error>> {
        let image = frame.to_rgb_image();
        let (fw, fh) = image.dimensions();

        let (input_tensor, scale, pad_x, pad_y) = letterbox(&image, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape();

        // YOLO output is [1, features, detections] (transposed) or
        // [1, detections, features].
        if shape.len() != 3 {
            return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
        }
        let transposed = shape[1] < shape[2];
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        let mut raw_dets = Vec::new();
        for i in 0..num_dets {
            let row: Vec<f32> = if transposed {
                (0..num_feats).map(|f| data[f * num_dets + i]).collect()
            } else {
                data[i * num_feats..(i + 1) * num_feats].to_vec()
            };
            if let Some(det) = parse_row(&row, self.confidence, scale, pad_x, pad_y) {
                raw_dets.push(det);
            }
        }

        let kept = nms(&mut raw_dets, NMS_IOU_THRESH);
        Ok(kept.iter().map(|d| to_face_region(d, fw, fh)).collect())
    }

    fn landmark_axes(&self) -> LandmarkAxes {
        LandmarkAxes::Standard
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Letterbox-resize an image to `target_size` × `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(image: &RgbImage, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let (src_w, src_h) = image.dimensions();
    let fw = src_w as f64;
    let fh = src_h as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = (fw * scale).round() as u32;
    let new_h = (fh * scale).round() as u32;
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Padded area is 114/255 gray, the YOLO convention.
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    for y in 0..new_h {
        let src_y = ((y as f64 / scale) as u32).min(src_h - 1);
        for x in 0..new_w {
            let src_x = ((x as f64 / scale) as u32).min(src_w - 1);
            let px = image.get_pixel(src_x, src_y).0;
            let ty = (pad_y + y) as usize;
            let tx = (pad_x + x) as usize;
            for (c, value) in px.iter().enumerate() {
                tensor[[0, c, ty, tx]] = *value as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawDetection {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f64,
    /// Frame-pixel keypoints; `None` entries were below the visibility threshold.
    keypoints: [Option<(f64, f64)>; 5],
}

/// Parses one `[cx, cy, w, h, conf, kp0_x, kp0_y, kp0_conf, ...]` row and maps
/// it from letterbox coordinates back to frame pixels.
fn parse_row(row: &[f32], min_conf: f64, scale: f64, pad_x: u32, pad_y: u32) -> Option<RawDetection> {
    if row.len() < 5 {
        return None;
    }
    let conf = row[4] as f64;
    if conf < min_conf {
        return None;
    }

    let unpad = |v: f32, pad: u32| (v as f64 - pad as f64) / scale;
    let cx = row[0];
    let cy = row[1];
    let half_w = row[2] / 2.0;
    let half_h = row[3] / 2.0;

    let mut keypoints = [None; 5];
    if row.len() >= 5 + NUM_KEYPOINT_VALUES {
        for (k, slot) in keypoints.iter_mut().enumerate() {
            let base = 5 + k * 3;
            if row[base + 2] as f64 >= KEYPOINT_CONF_THRESH {
                *slot = Some((unpad(row[base], pad_x), unpad(row[base + 1], pad_y)));
            }
        }
    }

    Some(RawDetection {
        x1: unpad(cx - half_w, pad_x),
        y1: unpad(cy - half_h, pad_y),
        x2: unpad(cx + half_w, pad_x),
        y2: unpad(cy + half_h, pad_y),
        confidence: conf,
        keypoints,
    })
}

/// Converts a pixel-space detection into a normalized [`FaceRegion`].
///
/// Keypoints become landmark groups in [`LandmarkAxes::Standard`]: `x` is the
/// fraction of the box width from its left edge, `y` the fraction of the box
/// height from its bottom edge. Both are measured against the box clipped to
/// the frame, the same box the bounds describe.
fn to_face_region(det: &RawDetection, frame_w: u32, frame_h: u32) -> FaceRegion {
    let (fw, fh) = (frame_w as f64, frame_h as f64);
    let x1 = det.x1.clamp(0.0, fw);
    let y1 = det.y1.clamp(0.0, fh);
    let x2 = det.x2.clamp(0.0, fw);
    let y2 = det.y2.clamp(0.0, fh);

    let bounds = NormalizedRect::from_pixel_box((x1, y1, x2, y2), frame_w, frame_h);
    let box_w = (x2 - x1).max(f64::EPSILON);
    let box_h = (y2 - y1).max(f64::EPSILON);
    let to_box = |(kx, ky): (f64, f64)| Point::new((kx - x1) / box_w, 1.0 - (ky - y1) / box_h);

    let [left_eye, right_eye, nose, left_mouth, right_mouth] = det.keypoints;
    let mut face = FaceRegion::new(bounds);
    for (name, kp) in [(LEFT_EYE, left_eye), (RIGHT_EYE, right_eye), (NOSE, nose)] {
        if let Some(kp) = kp {
            face = face.with_landmark(LandmarkGroup::new(name, vec![to_box(kp)]));
        }
    }
    let mouth: Vec<Point> = [left_mouth, right_mouth]
        .into_iter()
        .flatten()
        .map(to_box)
        .collect();
    if !mouth.is_empty() {
        face = face.with_landmark(LandmarkGroup::new(OUTER_LIPS, mouth));
    }
    face
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(dets: &mut [RawDetection], iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<RawDetection> = Vec::new();
    for det in dets.iter() {
        let bbox = [det.x1, det.y1, det.x2, det.y2];
        let suppressed = keep
            .iter()
            .any(|k| bbox_iou(&[k.x1, k.y1, k.x2, k.y2], &bbox) > iou_thresh);
        if !suppressed {
            keep.push(det.clone());
        }
    }
    keep
}
