use crate::detection::domain::face_region::LandmarkAxes;
use crate::shared::geometry::{NormalizedRect, Point, Rect, Size};

/// Maps normalized frame coordinates into view coordinates.
///
/// `content` is the rectangle the upright frame occupies inside the view.
/// Under aspect-fill it extends past the view edges; under aspect-fit it is
/// centered with letterbox bars.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayTransform {
    content: Rect,
    mirrored: bool,
}

impl DisplayTransform {
    /// Scale to cover the whole view, cropping the overflow.
    pub fn aspect_fill(frame: Size, view: Size, mirrored: bool) -> Self {
        let scale = if frame.is_empty() {
            0.0
        } else {
            (view.width / frame.width).max(view.height / frame.height)
        };
        Self {
            content: centered(frame, view, scale),
            mirrored,
        }
    }

    /// Scale to fit entirely inside the view, preserving aspect ratio.
    pub fn aspect_fit(frame: Size, view: Size) -> Self {
        let scale = if frame.is_empty() {
            0.0
        } else {
            (view.width / frame.width).min(view.height / frame.height)
        };
        Self {
            content: centered(frame, view, scale),
            mirrored: false,
        }
    }

    pub fn content_rect(&self) -> Rect {
        self.content
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    /// Converts a bottom-left-origin normalized rect to a top-left view rect.
    pub fn to_display(&self, rect: &NormalizedRect) -> Rect {
        let c = &self.content;
        let width = rect.width * c.width;
        let height = rect.height * c.height;
        let y = c.y + (1.0 - rect.y - rect.height) * c.height;
        let x = if self.mirrored {
            c.x + (1.0 - rect.x - rect.width) * c.width
        } else {
            c.x + rect.x * c.width
        };
        Rect::new(x, y, width, height)
    }
}

fn centered(frame: Size, view: Size, scale: f64) -> Rect {
    let width = frame.width * scale;
    let height = frame.height * scale;
    Rect::new(
        (view.width - width) / 2.0,
        (view.height - height) / 2.0,
        width,
        height,
    )
}

/// Places a face-relative landmark point inside its display face box.
///
/// With [`LandmarkAxes::Swapped`] the point's `y` drives the horizontal axis,
/// scaled by the box height, and its `x` the vertical one, scaled by the box
/// width. Mirroring is already baked into that convention.
///
/// With [`LandmarkAxes::Standard`] `x` runs left to right and `y` bottom to
/// top, and `mirrored` flips the horizontal axis.
pub fn landmark_to_display(
    point: Point,
    face_box: &Rect,
    axes: LandmarkAxes,
    mirrored: bool,
) -> Point {
    match axes {
        LandmarkAxes::Swapped => Point::new(
            point.y * face_box.height + face_box.x,
            point.x * face_box.width + face_box.y,
        ),
        LandmarkAxes::Standard => {
            let u = if mirrored { 1.0 - point.x } else { point.x };
            Point::new(
                face_box.x + u * face_box.width,
                face_box.y + (1.0 - point.y) * face_box.height,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn assert_rect(actual: Rect, expected: (f64, f64, f64, f64)) {
        assert_relative_eq!(actual.x, expected.0, epsilon = 1e-9);
        assert_relative_eq!(actual.y, expected.1, epsilon = 1e-9);
        assert_relative_eq!(actual.width, expected.2, epsilon = 1e-9);
        assert_relative_eq!(actual.height, expected.3, epsilon = 1e-9);
    }

    #[test]
    fn test_still_image_box_flips_y() {
        let t = DisplayTransform::aspect_fit(Size::new(300.0, 300.0), Size::new(300.0, 300.0));
        let r = t.to_display(&NormalizedRect::new(0.2, 0.3, 0.4, 0.4));
        assert_rect(r, (60.0, 90.0, 120.0, 120.0));
    }

    #[test]
    fn test_aspect_fit_letterboxes() {
        // 200x100 image in a 300x300 view: scaled to 300x150, bars top and bottom
        let t = DisplayTransform::aspect_fit(Size::new(200.0, 100.0), Size::new(300.0, 300.0));
        assert_rect(t.content_rect(), (0.0, 75.0, 300.0, 150.0));
        let r = t.to_display(&NormalizedRect::new(0.0, 0.0, 1.0, 1.0));
        assert_rect(r, (0.0, 75.0, 300.0, 150.0));
    }

    #[test]
    fn test_aspect_fill_crops_overflow() {
        // 480x640 frame in a 390x844 view: height governs, width overflows
        let t = DisplayTransform::aspect_fill(
            Size::new(480.0, 640.0),
            Size::new(390.0, 844.0),
            false,
        );
        let c = t.content_rect();
        assert_relative_eq!(c.height, 844.0, epsilon = 1e-9);
        assert_relative_eq!(c.width, 633.0, epsilon = 1e-9);
        assert!(c.x < 0.0);
        assert_relative_eq!(c.x + c.width / 2.0, 195.0, epsilon = 1e-9);
    }

    #[test]
    fn test_mirrored_fill_flips_x() {
        let view = Size::new(100.0, 100.0);
        let plain = DisplayTransform::aspect_fill(Size::new(100.0, 100.0), view, false);
        let mirrored = DisplayTransform::aspect_fill(Size::new(100.0, 100.0), view, true);
        let n = NormalizedRect::new(0.1, 0.5, 0.2, 0.2);
        assert_rect(plain.to_display(&n), (10.0, 30.0, 20.0, 20.0));
        assert_rect(mirrored.to_display(&n), (70.0, 30.0, 20.0, 20.0));
    }

    #[test]
    fn test_empty_frame_collapses() {
        let t = DisplayTransform::aspect_fit(Size::new(0.0, 0.0), Size::new(300.0, 300.0));
        assert_relative_eq!(t.content_rect().width, 0.0);
    }

    #[test]
    fn test_to_display_is_deterministic() {
        let t = DisplayTransform::aspect_fill(
            Size::new(640.0, 480.0),
            Size::new(390.0, 844.0),
            true,
        );
        let n = NormalizedRect::new(0.25, 0.25, 0.5, 0.5);
        assert_eq!(t.to_display(&n), t.to_display(&n));
    }

    #[rstest]
    #[case(Point::new(0.0, 0.0), (10.0, 20.0))]
    #[case(Point::new(1.0, 0.0), (10.0, 70.0))]
    #[case(Point::new(0.0, 1.0), (110.0, 20.0))]
    #[case(Point::new(0.5, 0.5), (60.0, 45.0))]
    fn test_swapped_axes_formula(#[case] p: Point, #[case] expected: (f64, f64)) {
        let face_box = Rect::new(10.0, 20.0, 50.0, 100.0);
        for mirrored in [false, true] {
            let d = landmark_to_display(p, &face_box, LandmarkAxes::Swapped, mirrored);
            assert_relative_eq!(d.x, expected.0);
            assert_relative_eq!(d.y, expected.1);
        }
    }

    #[rstest]
    #[case(false, (20.0, 90.0))]
    #[case(true, (50.0, 90.0))]
    fn test_standard_axes(#[case] mirrored: bool, #[case] expected: (f64, f64)) {
        let face_box = Rect::new(10.0, 20.0, 50.0, 100.0);
        let d = landmark_to_display(
            Point::new(0.2, 0.3),
            &face_box,
            LandmarkAxes::Standard,
            mirrored,
        );
        assert_relative_eq!(d.x, expected.0, epsilon = 1e-9);
        assert_relative_eq!(d.y, expected.1, epsilon = 1e-9);
    }
}
