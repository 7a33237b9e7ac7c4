pub mod camera_source;
mod ffmpeg_decode;
pub mod still_image_source;
