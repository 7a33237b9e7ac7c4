pub mod annotated_image_sink;
pub mod fan_out_sink;
pub mod json_lines_sink;
pub mod log_sink;
