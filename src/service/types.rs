//! Service layer types

use serde::{Deserialize, Serialize};

/// One detected object with its optional feature vector.
///
/// `embedding` is `None` when the embedding stage failed for this
/// detection; the rest of the result is still valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    /// Normalized `[x1, y1, x2, y2]` in input-image space.
    pub bbox: [f32; 4],
    pub confidence: f32,
    pub class_id: u32,
    pub embedding: Option<Vec<f32>>,
}

/// Result of one inference request. Constructed fresh per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResult {
    pub detections: Vec<Detection>,
    pub processing_ms: u64,
    pub model_version: String,
}

/// Per-model health entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelHealth {
    pub name: String,
    pub status: String,
    pub error: Option<String>,
}

/// Liveness report. Always available, independent of readiness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub models: Vec<ModelHealth>,
}
