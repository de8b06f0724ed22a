//! Execution engine boundary.
//!
//! The pipeline only ever sees named tensor mappings going into and coming
//! out of an opaque session. The concrete backend is ONNX Runtime; nothing
//! outside this module names `ort`.

use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::{Session, SessionInputValue};
use ort::value::Tensor as OrtTensor;
use parking_lot::Mutex;
use tracing::info;

use crate::engine::tensor::{Tensor, TensorMap};
use crate::error::{InferenceError, LoadError};

/// A loaded model session.
///
/// `run` takes a named tensor mapping and returns one; implementations
/// expose the input/output names the model file declares so callers can
/// validate their tensor-name contract up front.
pub trait EngineSession: Send + Sync {
    fn input_names(&self) -> &[String];
    fn output_names(&self) -> &[String];
    fn run(&self, inputs: TensorMap) -> Result<TensorMap, InferenceError>;
}

/// Loads model files into sessions. Abstracted so tests can substitute a
/// scripted engine.
pub trait Engine: Send + Sync {
    fn load(&self, path: &Path) -> Result<Arc<dyn EngineSession>, LoadError>;
}

/// ONNX Runtime backed engine.
pub struct OrtEngine;

impl Engine for OrtEngine {
    fn load(&self, path: &Path) -> Result<Arc<dyn EngineSession>, LoadError> {
        let session = Session::builder()
            .map_err(|e| LoadError(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| LoadError(e.to_string()))?
            .with_intra_threads(4)
            .map_err(|e| LoadError(e.to_string()))?
            .commit_from_file(path)
            .map_err(|e| LoadError(format!("failed to load {}: {e}", path.display())))?;

        let input_names: Vec<String> = session.inputs().iter().map(|i| i.name().to_string()).collect();
        let output_names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        info!(
            "Loaded {} (inputs: {:?}, outputs: {:?})",
            path.display(),
            input_names,
            output_names
        );

        Ok(Arc::new(OrtSession {
            session: Mutex::new(session),
            input_names,
            output_names,
        }))
    }
}

struct OrtSession {
    session: Mutex<Session>,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl EngineSession for OrtSession {
    fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }

    fn run(&self, mut inputs: TensorMap) -> Result<TensorMap, InferenceError> {
        // Feed inputs in the session's declared order; every declared input
        // must be provided by name.
        let mut feed: Vec<(Cow<'_, str>, SessionInputValue<'_>)> =
            Vec::with_capacity(self.input_names.len());
        for name in &self.input_names {
            let tensor = inputs.remove(name).ok_or_else(|| {
                InferenceError::Run(format!("missing input tensor '{name}'"))
            })?;
            let shape: Vec<i64> = tensor.shape().iter().map(|&d| d as i64).collect();
            let value = OrtTensor::from_array((shape, tensor.into_data()))
                .map_err(|e| InferenceError::Run(format!("input '{name}': {e}")))?;
            feed.push((Cow::Borrowed(name.as_str()), value.into()));
        }

        let mut session = self.session.lock();
        let outputs = session
            .run(feed)
            .map_err(|e| InferenceError::Run(e.to_string()))?;

        let mut result = TensorMap::with_capacity(self.output_names.len());
        for name in &self.output_names {
            let value = outputs
                .get(name.as_str())
                .ok_or_else(|| InferenceError::Run(format!("output '{name}' missing")))?;
            let (shape, data) = value
                .try_extract_tensor::<f32>()
                .map_err(|e| InferenceError::Run(format!("output '{name}': {e}")))?;
            let shape: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
            result.insert(name.clone(), Tensor::new(shape, data.to_vec())?);
        }
        Ok(result)
    }
}
