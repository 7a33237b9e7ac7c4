pub mod inference_worker;
pub mod render_loop;
