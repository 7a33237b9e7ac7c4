pub mod cancellation;
pub mod infrastructure;
pub mod pipeline_coordinator;
pub mod pipeline_logger;
pub mod still_image_use_case;

#[cfg(test)]
pub(crate) mod test_support;
