//! Decoding helpers shared by the ffmpeg-backed frame sources.

use std::path::Path;

use crate::shared::frame::PixelFormat;

/// An opened ffmpeg input plus the decoder and scaler for its video stream.
///
/// Yields tightly packed pixel buffers in the requested [`PixelFormat`].
pub(crate) struct VideoInput {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    format: PixelFormat,
    rotation: i32,
    fps: f64,
    flushing: bool,
    done: bool,
}

// Safety: a VideoInput is moved onto a capture thread and only used there.
// The raw pointers inside ffmpeg types are never shared across threads.
unsafe impl Send for VideoInput {}

impl VideoInput {
    pub(crate) fn new(
        ictx: ffmpeg_next::format::context::Input,
        format: PixelFormat,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let stream_index = stream.index();
        let rotation = extract_rotation(&stream);
        let rate = stream.avg_frame_rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;
        let width = decoder.width();
        let height = decoder.height();

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_pixel(format),
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        Ok(Self {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            format,
            rotation,
            fps,
            flushing: false,
            done: false,
        })
    }

    pub(crate) fn width(&self) -> u32 {
        self.width
    }

    pub(crate) fn height(&self) -> u32 {
        self.height
    }

    /// Clockwise display rotation from stream metadata: 0, 90, 180 or 270.
    pub(crate) fn rotation(&self) -> i32 {
        self.rotation
    }

    /// Average frame rate, or 0 when the container does not declare one.
    pub(crate) fn fps(&self) -> f64 {
        self.fps
    }

    /// Decodes the next frame. `Ok(None)` once the input is exhausted.
    pub(crate) fn next_pixels(&mut self) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error>> {
        if self.done {
            return Ok(None);
        }

        if let Some(pixels) = self.try_receive()? {
            return Ok(Some(pixels));
        }

        if self.flushing {
            self.done = true;
            return Ok(None);
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                if let Some(pixels) = self.try_receive()? {
                    return Ok(Some(pixels));
                }
                self.done = true;
                return Ok(None);
            };

            if stream.index() != self.stream_index {
                continue;
            }

            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }

            if let Some(pixels) = self.try_receive()? {
                return Ok(Some(pixels));
            }
        }
    }

    fn try_receive(&mut self) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut converted = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&decoded, &mut converted)?;
        Ok(Some(extract_pixels(
            &converted,
            self.width,
            self.height,
            self.format.channels() as usize,
        )))
    }
}

/// Opens a file (video or single image) for decoding.
pub(crate) fn open_file(
    path: &Path,
) -> Result<ffmpeg_next::format::context::Input, ffmpeg_next::Error> {
    ffmpeg_next::init()?;
    ffmpeg_next::format::input(path)
}

/// Opens a capture device through the named libavdevice input format.
pub(crate) fn open_device(
    url: &str,
    input_format: &str,
    options: ffmpeg_next::Dictionary,
) -> Result<ffmpeg_next::format::context::Input, Box<dyn std::error::Error>> {
    ffmpeg_next::init()?;
    ffmpeg_next::device::register_all();

    let format = ffmpeg_next::device::input::video()
        .find(|f| f.name() == input_format)
        .ok_or_else(|| format!("input format '{input_format}' is not available"))?;

    let format = ffmpeg_next::format::format::Format::Input(format);
    let ctx = ffmpeg_next::format::open_with(&url, &format, options)?;
    match ctx {
        ffmpeg_next::format::context::Context::Input(input) => Ok(input),
        ffmpeg_next::format::context::Context::Output(_) => {
            Err(format!("'{url}' did not open as an input").into())
        }
    }
}

fn ffmpeg_pixel(format: PixelFormat) -> ffmpeg_next::format::Pixel {
    match format {
        PixelFormat::Rgb8 => ffmpeg_next::format::Pixel::RGB24,
        PixelFormat::Bgra8 => ffmpeg_next::format::Pixel::BGRA,
        PixelFormat::Gray8 => ffmpeg_next::format::Pixel::GRAY8,
    }
}

/// Copies one plane into a contiguous buffer, dropping per-row stride padding.
fn extract_pixels(
    frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
    channels: usize,
) -> Vec<u8> {
    let stride = frame.stride(0);
    let data = frame.data(0);
    let row_len = width as usize * channels;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(row_len * h);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + row_len]);
    }
    pixels
}

/// Rotation from DisplayMatrix side data, falling back to the `rotate` tag.
fn extract_rotation(stream: &ffmpeg_next::format::stream::Stream) -> i32 {
    for side_data in stream.side_data() {
        if side_data.kind() == ffmpeg_next::codec::packet::side_data::Type::DisplayMatrix {
            if let Some(angle) = parse_display_matrix(side_data.data()) {
                return normalize_rotation(angle);
            }
        }
    }

    stream
        .metadata()
        .get("rotate")
        .and_then(|s| s.parse::<i32>().ok())
        .map(normalize_rotation)
        .unwrap_or(0)
}

/// Reads the rotation angle from a 3x3 16.16 fixed-point display matrix.
///
/// The matrix describes the transform needed for display, so the angle of
/// its first row is negated.
fn parse_display_matrix(data: &[u8]) -> Option<i32> {
    if data.len() < 36 {
        return None;
    }

    let m00 = i32::from_le_bytes(data[0..4].try_into().ok()?) as f64 / 65536.0;
    let m10 = i32::from_le_bytes(data[4..8].try_into().ok()?) as f64 / 65536.0;

    Some(-m10.atan2(m00).to_degrees().round() as i32)
}

/// Snaps an angle to the nearest of 0, 90, 180 or 270.
fn normalize_rotation(angle: i32) -> i32 {
    match angle.rem_euclid(360) {
        0..=44 | 316..=359 => 0,
        45..=134 => 90,
        135..=224 => 180,
        _ => 270,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    /// Encodes a small MPEG-4 clip of flat gray frames, brighter each frame.
    pub(crate) fn create_test_video(
        path: &Path,
        num_frames: usize,
        width: u32,
        height: u32,
        fps: i32,
    ) {
        ffmpeg_next::init().unwrap();

        let mut octx = ffmpeg_next::format::output(path).unwrap();
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
        let mut ost = octx.add_stream(Some(codec)).unwrap();

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .unwrap();
        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let mut encoder = encoder_ctx
            .open_with(ffmpeg_next::Dictionary::new())
            .unwrap();
        ost.set_parameters(&encoder);
        octx.write_header().unwrap();
        let ost_time_base = octx.stream(0).unwrap().time_base();

        let mut scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::format::Pixel::YUV420P,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .unwrap();

        let write_pending = |encoder: &mut ffmpeg_next::codec::encoder::video::Encoder,
                             octx: &mut ffmpeg_next::format::context::Output| {
            let mut encoded = ffmpeg_next::Packet::empty();
            while encoder.receive_packet(&mut encoded).is_ok() {
                encoded.set_stream(0);
                encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
                encoded.write_interleaved(octx).unwrap();
            }
        };

        for i in 0..num_frames {
            let mut rgb = ffmpeg_next::util::frame::video::Video::new(
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
            );
            let stride = rgb.stride(0);
            let value = ((i * 40) % 256) as u8;
            let data = rgb.data_mut(0);
            for row in 0..height as usize {
                data[row * stride..row * stride + width as usize * 3].fill(value);
            }

            let mut yuv = ffmpeg_next::util::frame::video::Video::empty();
            scaler.run(&rgb, &mut yuv).unwrap();
            yuv.set_pts(Some(i as i64));
            encoder.send_frame(&yuv).unwrap();
            write_pending(&mut encoder, &mut octx);
        }

        encoder.send_eof().unwrap();
        write_pending(&mut encoder, &mut octx);
        octx.write_trailer().unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::create_test_video;
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PixelFormat::Rgb8)]
    #[case(PixelFormat::Bgra8)]
    #[case(PixelFormat::Gray8)]
    fn test_decodes_every_frame_in_requested_format(#[case] format: PixelFormat) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        create_test_video(&path, 4, 160, 120, 25);

        let mut input = VideoInput::new(open_file(&path).unwrap(), format).unwrap();
        assert_eq!((input.width(), input.height()), (160, 120));
        assert!(input.fps() > 0.0);
        assert_eq!(input.rotation(), 0);

        let mut count = 0;
        while let Some(pixels) = input.next_pixels().unwrap() {
            assert_eq!(pixels.len(), 160 * 120 * format.channels() as usize);
            count += 1;
        }
        assert_eq!(count, 4);
        assert!(input.next_pixels().unwrap().is_none());
    }

    #[test]
    fn test_open_missing_file_fails() {
        assert!(open_file(Path::new("/nonexistent/clip.mp4")).is_err());
    }

    #[test]
    fn test_open_unknown_device_format_fails() {
        let err = open_device("0", "no-such-format", ffmpeg_next::Dictionary::new()).unwrap_err();
        assert!(err.to_string().contains("no-such-format"));
    }

    #[test]
    fn test_parse_display_matrix() {
        let mut identity = vec![0u8; 36];
        identity[0..4].copy_from_slice(&65536i32.to_le_bytes());
        assert_eq!(normalize_rotation(parse_display_matrix(&identity).unwrap()), 0);

        let mut quarter = vec![0u8; 36];
        quarter[4..8].copy_from_slice(&65536i32.to_le_bytes());
        assert_eq!(normalize_rotation(parse_display_matrix(&quarter).unwrap()), 270);

        assert!(parse_display_matrix(&[0u8; 20]).is_none());
    }

    #[rstest]
    #[case(0, 0)]
    #[case(44, 0)]
    #[case(45, 90)]
    #[case(-90, 270)]
    #[case(180, 180)]
    #[case(316, 0)]
    #[case(360, 0)]
    fn test_normalize_rotation(#[case] angle: i32, #[case] expected: i32) {
        assert_eq!(normalize_rotation(angle), expected);
    }
}
