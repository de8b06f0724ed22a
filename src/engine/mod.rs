//! Inference engine module
//!
//! Covers the execution-engine boundary, model registry, image-to-tensor
//! preprocessing, and detector output decoding.

pub mod decoder;
pub mod preprocess;
pub mod registry;
pub mod session;
pub mod tensor;

pub use registry::{ModelKind, ModelRegistry, ModelStatus};
pub use session::{Engine, EngineSession, OrtEngine};
pub use tensor::{Tensor, TensorMap};
