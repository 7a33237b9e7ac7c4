use std::path::{Path, PathBuf};

use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};

use crate::overlay::domain::display_transform::DisplayTransform;
use crate::overlay::domain::overlay::{Color, Overlay, OverlayShape};
use crate::overlay::domain::overlay_sink::OverlaySink;
use crate::shared::geometry::{Point, Rect, Size};

/// Draws the latest overlay over a still image and writes it as a PNG on
/// dispose.
///
/// The canvas has the view's size; the image is placed aspect-fit inside it,
/// so overlay coordinates line up with the shapes as computed.
pub struct AnnotatedImageSink {
    background: RgbImage,
    output: PathBuf,
    latest: Overlay,
    label: String,
    saved: bool,
}

impl AnnotatedImageSink {
    pub fn new(image: &RgbImage, view: Size, output: impl Into<PathBuf>) -> Self {
        Self {
            background: letterbox(image, view),
            output: output.into(),
            latest: Overlay::default(),
            label: String::new(),
            saved: false,
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The background with the latest overlay drawn on top.
    pub fn render(&self) -> RgbImage {
        let mut canvas = self.background.clone();
        for shape in &self.latest.shapes {
            match shape {
                OverlayShape::Rectangle { rect, style } => {
                    if let Some(r) = to_pixel_rect(rect, canvas.width(), canvas.height()) {
                        draw_hollow_rect_mut(&mut canvas, r, rgb(style.stroke));
                    }
                }
                OverlayShape::Polyline {
                    points,
                    closed,
                    style,
                    ..
                } => draw_polyline(&mut canvas, points, *closed, rgb(style.stroke)),
            }
        }
        canvas
    }

    pub fn save(&self) -> Result<(), image::ImageError> {
        if let Some(parent) = self.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        self.render().save(&self.output)
    }
}

impl OverlaySink for AnnotatedImageSink {
    fn present(&mut self, overlay: &Overlay) {
        self.latest = overlay.clone();
    }

    fn set_label(&mut self, text: &str) {
        self.label = text.to_string();
    }

    fn dispose(&mut self) {
        if self.saved {
            return;
        }
        self.saved = true;
        match self.save() {
            Ok(()) => log::info!(
                "Annotated image written to {} ({})",
                self.output.display(),
                self.label
            ),
            Err(e) => log::error!("Failed to write {}: {e}", self.output.display()),
        }
    }
}

/// Scales `image` aspect-fit into a black canvas of the view's size.
fn letterbox(image: &RgbImage, view: Size) -> RgbImage {
    let vw = view.width.round().max(1.0) as u32;
    let vh = view.height.round().max(1.0) as u32;
    let mut canvas = RgbImage::new(vw, vh);
    let content = DisplayTransform::aspect_fit(
        Size::new(image.width() as f64, image.height() as f64),
        Size::new(vw as f64, vh as f64),
    )
    .content_rect();

    let cw = content.width.round() as u32;
    let ch = content.height.round() as u32;
    if cw == 0 || ch == 0 {
        return canvas;
    }
    let scaled = imageops::resize(image, cw, ch, imageops::FilterType::Triangle);
    imageops::overlay(
        &mut canvas,
        &scaled,
        content.x.round() as i64,
        content.y.round() as i64,
    );
    canvas
}

/// Clamps a display rect to the canvas; `None` when nothing remains visible.
fn to_pixel_rect(rect: &Rect, width: u32, height: u32) -> Option<imageproc::rect::Rect> {
    let max_x = width.saturating_sub(1) as f64;
    let max_y = height.saturating_sub(1) as f64;
    let x1 = rect.x.clamp(0.0, max_x);
    let y1 = rect.y.clamp(0.0, max_y);
    let x2 = rect.max_x().clamp(0.0, max_x);
    let y2 = rect.max_y().clamp(0.0, max_y);
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    let w = (x2 - x1).round().max(1.0) as u32;
    let h = (y2 - y1).round().max(1.0) as u32;
    Some(imageproc::rect::Rect::at(x1.round() as i32, y1.round() as i32).of_size(w, h))
}

fn draw_polyline(canvas: &mut RgbImage, points: &[Point], closed: bool, color: Rgb<u8>) {
    let segment = |a: &Point, b: &Point| ((a.x as f32, a.y as f32), (b.x as f32, b.y as f32));
    for pair in points.windows(2) {
        let (start, end) = segment(&pair[0], &pair[1]);
        draw_line_segment_mut(canvas, start, end, color);
    }
    if closed && points.len() > 2 {
        let (start, end) = segment(&points[points.len() - 1], &points[0]);
        draw_line_segment_mut(canvas, start, end, color);
    }
}

fn rgb(color: Color) -> Rgb<u8> {
    Rgb([color.r, color.g, color.b])
}
