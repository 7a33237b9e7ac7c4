use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::shared::frame::{Orientation, PixelFormat};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraPosition {
    #[default]
    Front,
    Back,
}

impl CameraPosition {
    /// Device index by convention: the built-in front camera enumerates first.
    pub fn device_index(self) -> usize {
        match self {
            CameraPosition::Front => 0,
            CameraPosition::Back => 1,
        }
    }

    /// Front cameras are shown mirrored, like a looking glass.
    pub fn default_mirrored(self) -> bool {
        self == CameraPosition::Front
    }
}

impl FromStr for CameraPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "front" => Ok(CameraPosition::Front),
            "back" => Ok(CameraPosition::Back),
            other => Err(format!("unknown camera '{other}' (expected front or back)")),
        }
    }
}

/// Where live frames come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceSelection {
    Camera(CameraPosition),
    /// Platform device name, e.g. `/dev/video2` or `video=Integrated Camera`.
    Named(String),
    /// A video file replayed at its native frame rate.
    File(PathBuf),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CaptureConfig {
    pub device: DeviceSelection,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
    pub pixel_format: PixelFormat,
    /// Overrides the orientation reported by the stream.
    pub orientation: Option<Orientation>,
    pub mirrored: bool,
}

impl CaptureConfig {
    pub fn camera(position: CameraPosition) -> Self {
        Self {
            device: DeviceSelection::Camera(position),
            width: None,
            height: None,
            fps: None,
            pixel_format: PixelFormat::default(),
            orientation: None,
            mirrored: position.default_mirrored(),
        }
    }

    pub fn named(device: impl Into<String>) -> Self {
        Self {
            device: DeviceSelection::Named(device.into()),
            mirrored: false,
            ..Self::camera(CameraPosition::Front)
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            device: DeviceSelection::File(path.into()),
            mirrored: false,
            ..Self::camera(CameraPosition::Front)
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = Some(fps);
        self
    }

    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = format;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = Some(orientation);
        self
    }

    pub fn with_mirrored(mut self, mirrored: bool) -> Self {
        self.mirrored = mirrored;
        self
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::camera(CameraPosition::default())
    }
}
