use crate::detection::domain::face_region::{FaceRegion, LandmarkAxes};
use crate::shared::geometry::{Point, Rect};

use super::display_transform::{landmark_to_display, DisplayTransform};
use super::overlay::{Overlay, OverlayShape, Style, FACE_BOX_STYLE, LANDMARK_STYLE};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub clears: usize,
    pub commits: usize,
    pub face_boxes: usize,
    pub landmark_groups: usize,
}

/// Builds overlays shape by shape and swaps them in on commit.
///
/// Drawing between `clear` and `commit` goes to a pending list, so a
/// partially built overlay is never visible through [`current`](Self::current).
pub struct OverlayRenderer {
    face_style: Style,
    landmark_style: Style,
    pending: Vec<OverlayShape>,
    current: Overlay,
    stats: RenderStats,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayRenderer {
    pub fn new() -> Self {
        Self::with_styles(FACE_BOX_STYLE, LANDMARK_STYLE)
    }

    pub fn with_styles(face_style: Style, landmark_style: Style) -> Self {
        Self {
            face_style,
            landmark_style,
            pending: Vec::new(),
            current: Overlay::default(),
            stats: RenderStats::default(),
        }
    }

    /// Drops every pending shape.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.stats.clears += 1;
    }

    pub fn draw_face_box(&mut self, rect: Rect) {
        self.pending.push(OverlayShape::Rectangle {
            rect,
            style: self.face_style,
        });
        self.stats.face_boxes += 1;
    }

    /// Adds a closed polyline through `points`, in display coordinates.
    pub fn draw_landmark_group(&mut self, group: &str, points: Vec<Point>) {
        self.pending.push(OverlayShape::Polyline {
            group: group.to_string(),
            points,
            closed: true,
            style: self.landmark_style,
        });
        self.stats.landmark_groups += 1;
    }

    /// Publishes the pending shapes as the current overlay.
    pub fn commit(&mut self, frame_index: Option<usize>) -> &Overlay {
        self.current = Overlay {
            frame_index,
            shapes: std::mem::take(&mut self.pending),
        };
        self.stats.commits += 1;
        &self.current
    }

    /// Clears, then draws one box per face and one polyline per landmark
    /// group, then commits.
    pub fn render_faces(
        &mut self,
        frame_index: usize,
        faces: &[FaceRegion],
        transform: &DisplayTransform,
        axes: LandmarkAxes,
    ) -> &Overlay {
        self.clear();
        for face in faces {
            let face_box = transform.to_display(&face.bounds);
            self.draw_face_box(face_box);
            for group in face.ordered_landmarks() {
                let points = group
                    .points
                    .iter()
                    .map(|p| landmark_to_display(*p, &face_box, axes, transform.is_mirrored()))
                    .collect();
                self.draw_landmark_group(&group.name, points);
            }
        }
        self.commit(Some(frame_index))
    }

    /// Removes everything, pending and visible.
    pub fn teardown(&mut self) -> &Overlay {
        self.pending.clear();
        self.current = Overlay::default();
        &self.current
    }

    pub fn current(&self) -> &Overlay {
        &self.current
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }
}
