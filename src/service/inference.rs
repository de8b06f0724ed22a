//! Inference pipeline - core orchestration
//!
//! Sequences detection, per-detection cropping, and embedding extraction,
//! and assembles the response. Requests are gated on the model registry's
//! readiness predicate before any codec or engine work happens.

use std::sync::Arc;
use std::time::Instant;

use image::GenericImageView;
use tracing::warn;

use crate::config::{Config, ModelIoConfig};
use crate::engine::preprocess;
use crate::engine::registry::{ModelKind, ModelRegistry};
use crate::engine::tensor::{Tensor, TensorMap};
use crate::engine::{decoder, EngineSession};
use crate::error::InferenceError;

use super::types::{Detection, HealthReport, InferenceResult, ModelHealth};

/// Two-stage inference orchestrator: detect, then embed each detection.
pub struct InferencePipeline {
    registry: Arc<ModelRegistry>,
    confidence_threshold: f32,
    model_version: String,
    detector_io: ModelIoConfig,
    embedder_io: ModelIoConfig,
}

impl InferencePipeline {
    pub fn new(registry: Arc<ModelRegistry>, config: &Config) -> Self {
        Self {
            registry,
            confidence_threshold: config.inference.confidence_threshold,
            model_version: config.inference.model_version.clone(),
            detector_io: config.models.detector.clone(),
            embedder_io: config.models.embedder.clone(),
        }
    }

    /// Run the full pipeline over one image.
    ///
    /// Fails fast with `NotReady` before touching the image or either
    /// engine. A per-detection embedding failure is contained to that
    /// detection (its embedding comes back absent); only decode/detect
    /// failures abort the whole request.
    pub async fn infer(
        &self,
        image_bytes: &[u8],
        threshold_override: Option<f32>,
    ) -> Result<InferenceResult, InferenceError> {
        let start = Instant::now();

        if !self.registry.ready() {
            return Err(InferenceError::NotReady(self.registry.pending_summary()));
        }

        if image_bytes.is_empty() {
            return Err(InferenceError::InvalidInput("empty image payload".to_string()));
        }

        // Decode once; the original dimensions are needed later for box
        // denormalization.
        let image = preprocess::decode_image(image_bytes)
            .map_err(|e| InferenceError::InvalidInput(format!("undecodable image: {e}")))?;
        let image = Arc::new(image);
        let (orig_width, orig_height) = image.dimensions();

        let detector = self
            .registry
            .session(ModelKind::Detector)
            .ok_or_else(|| InferenceError::NotReady(self.registry.pending_summary()))?;
        let embedder = self
            .registry
            .session(ModelKind::Embedder)
            .ok_or_else(|| InferenceError::NotReady(self.registry.pending_summary()))?;

        let threshold = threshold_override.unwrap_or(self.confidence_threshold);

        // Stage one: detect.
        let raw_output = {
            let image = image.clone();
            let io = self.detector_io.clone();
            tokio::task::spawn_blocking(move || -> Result<Tensor, InferenceError> {
                let tensor = preprocess::encode_for_detector(&image);
                run_named(detector.as_ref(), &io, tensor)
            })
            .await
            .map_err(|e| InferenceError::Run(format!("detector task failed: {e}")))??
        };

        let rows = decoder::decode(&raw_output, threshold)?;

        // Stage two: crop and embed every detection independently. The
        // tasks run concurrently; join_all preserves decode order.
        let tasks: Vec<_> = rows
            .iter()
            .map(|row| {
                let image = image.clone();
                let embedder = embedder.clone();
                let io = self.embedder_io.clone();
                let bbox = row.bbox;
                tokio::task::spawn_blocking(move || -> Result<Vec<f32>, InferenceError> {
                    let rect = preprocess::denormalize_box(bbox, orig_width, orig_height);
                    let crop = preprocess::crop_detection(&image, rect);
                    let tensor = preprocess::encode_for_embedder(&crop);
                    Ok(run_named(embedder.as_ref(), &io, tensor)?.into_data())
                })
            })
            .collect();
        let outcomes = futures::future::join_all(tasks).await;

        let mut detections = Vec::with_capacity(rows.len());
        for (index, (row, outcome)) in rows.into_iter().zip(outcomes).enumerate() {
            let embedding = match outcome {
                Ok(Ok(vector)) => Some(vector),
                Ok(Err(error)) => {
                    warn!("Embedding failed for detection {index}: {error}");
                    None
                }
                Err(join_error) => {
                    warn!("Embedding task failed for detection {index}: {join_error}");
                    None
                }
            };
            detections.push(Detection {
                bbox: row.bbox,
                confidence: row.confidence,
                class_id: row.class_id,
                embedding,
            });
        }

        Ok(InferenceResult {
            detections,
            processing_ms: start.elapsed().as_millis() as u64,
            model_version: self.model_version.clone(),
        })
    }

    /// True when every declared model is loaded.
    pub fn ready(&self) -> bool {
        self.registry.ready()
    }

    /// Per-model status snapshot. Never fails, independent of readiness.
    pub fn health(&self) -> HealthReport {
        let models = self
            .registry
            .report()
            .into_iter()
            .map(|slot| ModelHealth {
                name: slot.kind.as_str().to_string(),
                status: slot.status.as_str().to_string(),
                error: slot.error,
            })
            .collect();
        HealthReport { models }
    }

}

/// Feed one tensor to a session under the model's configured input name
/// and extract the configured output by name. An absent output name is an
/// engine contract violation, not a silent fallback.
fn run_named(
    session: &dyn EngineSession,
    io: &ModelIoConfig,
    input: Tensor,
) -> Result<Tensor, InferenceError> {
    let mut inputs = TensorMap::new();
    inputs.insert(io.input.clone(), input);
    let mut outputs = session.run(inputs)?;
    outputs.remove(&io.output).ok_or_else(|| {
        InferenceError::Run(format!(
            "expected output '{}' absent from engine results",
            io.output
        ))
    })
}
