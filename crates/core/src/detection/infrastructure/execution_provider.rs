use std::path::Path;

use crate::shared::error::PipelineError;

/// Return the preferred ONNX execution providers for the current platform.
///
/// Falls back to CPU if the platform-specific provider is unavailable.
pub fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Opens an ONNX session on the preferred providers.
///
/// Any failure is reported as [`PipelineError::ModelLoadFailure`].
pub fn load_session(model_path: &Path) -> Result<ort::session::Session, PipelineError> {
    build_session(model_path).map_err(|e| {
        PipelineError::ModelLoadFailure(format!("{}: {e}", model_path.display()))
    })
}

fn build_session(model_path: &Path) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let session = ort::session::Session::builder()?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(model_path)?;
    Ok(session)
}

/// Reads the spatial input size from an NCHW model input, if static.
pub fn input_spatial_size(session: &ort::session::Session) -> Option<(u32, u32)> {
    session.inputs().first().and_then(|input| {
        if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
            if shape.len() >= 4 && shape[2] > 0 && shape[3] > 0 {
                Some((shape[3] as u32, shape[2] as u32))
            } else {
                None
            }
        } else {
            None
        }
    })
}
