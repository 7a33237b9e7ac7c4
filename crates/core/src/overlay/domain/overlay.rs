use serde::{Deserialize, Serialize};

use crate::shared::geometry::{Point, Rect};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const CLEAR: Color = Color::rgba(0, 0, 0, 0);
    pub const YELLOW: Color = Color::rgba(255, 255, 0, 255);
    pub const GREEN: Color = Color::rgba(0, 255, 0, 255);
    pub const BLUE: Color = Color::rgba(0, 0, 255, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub stroke: Color,
    pub fill: Color,
    pub line_width: f64,
}

impl Style {
    pub const fn stroke(color: Color) -> Self {
        Self {
            stroke: color,
            fill: Color::CLEAR,
            line_width: 1.0,
        }
    }
}

pub const FACE_BOX_STYLE: Style = Style::stroke(Color::YELLOW);
pub const LANDMARK_STYLE: Style = Style::stroke(Color::GREEN);
pub const LABEL_COLOR: Color = Color::BLUE;

/// A drawable primitive in display coordinates (origin top-left).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OverlayShape {
    Rectangle {
        rect: Rect,
        style: Style,
    },
    Polyline {
        group: String,
        points: Vec<Point>,
        closed: bool,
        style: Style,
    },
}

impl OverlayShape {
    pub fn style(&self) -> &Style {
        match self {
            OverlayShape::Rectangle { style, .. } | OverlayShape::Polyline { style, .. } => style,
        }
    }
}

/// The complete set of shapes on screen, replaced wholesale on every update.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    /// Frame the shapes were computed from; `None` for a torn-down overlay.
    pub frame_index: Option<usize>,
    pub shapes: Vec<OverlayShape>,
}

impl Overlay {
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn rectangles(&self) -> impl Iterator<Item = &Rect> {
        self.shapes.iter().filter_map(|s| match s {
            OverlayShape::Rectangle { rect, .. } => Some(rect),
            _ => None,
        })
    }

    pub fn polylines(&self) -> impl Iterator<Item = &[Point]> {
        self.shapes.iter().filter_map(|s| match s {
            OverlayShape::Polyline { points, .. } => Some(points.as_slice()),
            _ => None,
        })
    }
}
