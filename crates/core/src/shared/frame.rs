use std::sync::Arc;

use image::{imageops, DynamicImage, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pixel layout of a frame's buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    #[default]
    Rgb8,
    Bgra8,
    Gray8,
}

impl PixelFormat {
    pub fn channels(self) -> u8 {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Bgra8 => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

impl std::str::FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rgb" | "rgb8" => Ok(PixelFormat::Rgb8),
            "bgra" | "bgra8" => Ok(PixelFormat::Bgra8),
            "gray" | "gray8" => Ok(PixelFormat::Gray8),
            other => Err(format!("unknown pixel format '{other}' (expected rgb, bgra or gray)")),
        }
    }
}

/// How the stored pixels must be transformed to appear upright.
///
/// Mirrored variants flip horizontally before rotating. `Right` means the
/// buffer must be rotated 90° clockwise, `Left` 90° counter-clockwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    #[default]
    Up,
    UpMirrored,
    Down,
    DownMirrored,
    Left,
    LeftMirrored,
    Right,
    RightMirrored,
}

impl Orientation {
    /// Maps a clockwise display rotation (0, 90, 180, 270) to an orientation.
    pub fn from_rotation(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => Orientation::Right,
            180 => Orientation::Down,
            270 => Orientation::Left,
            _ => Orientation::Up,
        }
    }

    pub fn is_mirrored(self) -> bool {
        matches!(
            self,
            Orientation::UpMirrored
                | Orientation::DownMirrored
                | Orientation::LeftMirrored
                | Orientation::RightMirrored
        )
    }

    /// True when the upright image has width and height swapped.
    pub fn swaps_axes(self) -> bool {
        matches!(
            self,
            Orientation::Left
                | Orientation::LeftMirrored
                | Orientation::Right
                | Orientation::RightMirrored
        )
    }

    /// Clockwise rotation applied after the optional mirror.
    fn rotation(self) -> u32 {
        match self {
            Orientation::Up | Orientation::UpMirrored => 0,
            Orientation::Right | Orientation::RightMirrored => 90,
            Orientation::Down | Orientation::DownMirrored => 180,
            Orientation::Left | Orientation::LeftMirrored => 270,
        }
    }
}

/// Pixel buffer whose length does not match the frame's dimensions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("frame buffer holds {actual} bytes, {width}x{height} {format:?} needs {expected}")]
pub struct FrameSizeError {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub expected: usize,
    pub actual: usize,
}

/// A single captured frame.
///
/// Pixel data is immutable and reference-counted, so the face detector and
/// the emotion classifier can both hold the same frame while their calls are
/// in flight. The buffer is freed when the last clone is dropped.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Arc<[u8]>,
    width: u32,
    height: u32,
    format: PixelFormat,
    orientation: Orientation,
    index: usize,
}

impl Frame {
    /// Wraps `data`, which must hold exactly `width * height * channels` bytes.
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        index: usize,
    ) -> Result<Self, FrameSizeError> {
        let expected = (width as usize) * (height as usize) * (format.channels() as usize);
        if data.len() != expected {
            return Err(FrameSizeError {
                width,
                height,
                format,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data: data.into(),
            width,
            height,
            format,
            orientation: Orientation::Up,
            index,
        })
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn channels(&self) -> u8 {
        self.format.channels()
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of live handles sharing this frame's pixel buffer.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.data)
    }

    /// Width and height of the upright image.
    pub fn display_size(&self) -> (u32, u32) {
        if self.orientation.swaps_axes() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    /// Converts to an upright RGB image, applying format conversion and orientation.
    pub fn to_rgb_image(&self) -> RgbImage {
        let w = self.width;
        let h = self.height;
        let rgb = match self.format {
            PixelFormat::Rgb8 => RgbImage::from_raw(w, h, self.data.to_vec()),
            PixelFormat::Bgra8 => {
                let mut buf = Vec::with_capacity(w as usize * h as usize * 3);
                for px in self.data.chunks_exact(4) {
                    buf.extend_from_slice(&[px[2], px[1], px[0]]);
                }
                RgbImage::from_raw(w, h, buf)
            }
            PixelFormat::Gray8 => GrayImage::from_raw(w, h, self.data.to_vec())
                .map(|gray| DynamicImage::ImageLuma8(gray).to_rgb8()),
        }
        .expect("buffer length checked in Frame::new");

        orient(rgb, self.orientation)
    }
}

fn orient(img: RgbImage, orientation: Orientation) -> RgbImage {
    let img = if orientation.is_mirrored() {
        imageops::flip_horizontal(&img)
    } else {
        img
    };
    match orientation.rotation() {
        90 => imageops::rotate90(&img),
        180 => imageops::rotate180(&img),
        270 => imageops::rotate270(&img),
        _ => img,
    }
}
