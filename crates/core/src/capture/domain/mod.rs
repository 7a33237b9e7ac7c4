pub mod capture_config;
pub mod frame_source;
