use serde::{Deserialize, Serialize};

use crate::shared::geometry::{NormalizedRect, Point};

pub const LEFT_EYE: &str = "leftEye";
pub const LEFT_EYEBROW: &str = "leftEyebrow";
pub const RIGHT_EYE: &str = "rightEye";
pub const RIGHT_EYEBROW: &str = "rightEyebrow";
pub const NOSE: &str = "nose";
pub const OUTER_LIPS: &str = "outerLips";
pub const INNER_LIPS: &str = "innerLips";

/// Draw order for well-known landmark groups. Unknown groups follow in
/// the order the detector reported them.
pub const CANONICAL_GROUP_ORDER: [&str; 7] = [
    LEFT_EYE,
    LEFT_EYEBROW,
    RIGHT_EYE,
    RIGHT_EYEBROW,
    NOSE,
    OUTER_LIPS,
    INNER_LIPS,
];

/// Axis convention a detector uses for landmark points inside a face box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LandmarkAxes {
    /// `y` is horizontal, scaled by the box height; `x` is vertical, scaled by
    /// the box width.
    #[default]
    Swapped,
    /// `x` runs along the box width, `y` upward along its height.
    Standard,
}

/// An ordered point sequence outlining one facial feature.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandmarkGroup {
    pub name: String,
    /// Normalized to the face bounding box.
    pub points: Vec<Point>,
}

impl LandmarkGroup {
    pub fn new(name: impl Into<String>, points: Vec<Point>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }
}

/// One detected face: normalized bounds plus optional landmark groups.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub bounds: NormalizedRect,
    pub landmarks: Vec<LandmarkGroup>,
}

impl FaceRegion {
    pub fn new(bounds: NormalizedRect) -> Self {
        Self {
            bounds,
            landmarks: Vec::new(),
        }
    }

    pub fn with_landmark(mut self, group: LandmarkGroup) -> Self {
        self.landmarks.push(group);
        self
    }

    pub fn landmark(&self, name: &str) -> Option<&LandmarkGroup> {
        self.landmarks.iter().find(|g| g.name == name)
    }

    /// Landmark groups in canonical draw order.
    pub fn ordered_landmarks(&self) -> Vec<&LandmarkGroup> {
        let rank = |g: &LandmarkGroup| {
            CANONICAL_GROUP_ORDER
                .iter()
                .position(|name| *name == g.name)
                .unwrap_or(CANONICAL_GROUP_ORDER.len())
        };
        let mut groups: Vec<&LandmarkGroup> = self.landmarks.iter().collect();
        // Stable sort keeps unknown groups in reported order.
        groups.sort_by_key(|g| rank(g));
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(name: &str) -> LandmarkGroup {
        LandmarkGroup::new(name, vec![Point::new(0.5, 0.5)])
    }

    #[test]
    fn test_new_region_has_no_landmarks() {
        let face = FaceRegion::new(NormalizedRect::new(0.1, 0.1, 0.2, 0.2));
        assert!(face.landmarks.is_empty());
        assert!(face.ordered_landmarks().is_empty());
    }

    #[test]
    fn test_landmark_lookup_by_name() {
        let face = FaceRegion::new(NormalizedRect::default())
            .with_landmark(group(NOSE))
            .with_landmark(group(LEFT_EYE));
        assert!(face.landmark(NOSE).is_some());
        assert!(face.landmark(INNER_LIPS).is_none());
    }

    #[test]
    fn test_ordered_landmarks_follow_canonical_order() {
        let face = FaceRegion::new(NormalizedRect::default())
            .with_landmark(group("jaw"))
            .with_landmark(group(INNER_LIPS))
            .with_landmark(group(NOSE))
            .with_landmark(group("chin"))
            .with_landmark(group(LEFT_EYE));

        let names: Vec<&str> = face
            .ordered_landmarks()
            .iter()
            .map(|g| g.name.as_str())
            .collect();
        assert_eq!(names, vec![LEFT_EYE, NOSE, INNER_LIPS, "jaw", "chin"]);
    }

    #[test]
    fn test_serializes_with_group_names() {
        let face = FaceRegion::new(NormalizedRect::new(0.2, 0.3, 0.4, 0.4))
            .with_landmark(group(OUTER_LIPS));
        let json = serde_json::to_string(&face).unwrap();
        assert!(json.contains("\"outerLips\""));
        assert!(json.contains("\"bounds\""));
    }
}
