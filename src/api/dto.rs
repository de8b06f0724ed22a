//! REST API request/response data transfer objects

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::service::types::{Detection, InferenceResult};

/// Infer request body. `image` carries base64 bytes, either raw or as a
/// `data:` URL.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferRequest {
    pub image: Option<String>,
    pub confidence_threshold: Option<f32>,
}

/// Infer response envelope.
#[derive(Debug, Serialize)]
pub struct InferResponse {
    pub ok: bool,
    pub inference: InferenceDto,
    pub meta: MetaDto,
}

#[derive(Debug, Serialize)]
pub struct InferenceDto {
    pub detections: Vec<DetectionDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionDto {
    pub bbox: [f32; 4],
    pub confidence: f32,
    pub class_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaDto {
    pub model: String,
    pub processing_ms: u64,
    pub detections_count: usize,
}

impl InferResponse {
    pub fn from_result(result: InferenceResult) -> Self {
        let detections_count = result.detections.len();
        let detections = result.detections.into_iter().map(DetectionDto::from).collect();
        Self {
            ok: true,
            inference: InferenceDto { detections },
            meta: MetaDto {
                model: result.model_version,
                processing_ms: result.processing_ms,
                detections_count,
            },
        }
    }
}

impl From<Detection> for DetectionDto {
    fn from(detection: Detection) -> Self {
        Self {
            bbox: detection.bbox,
            confidence: detection.confidence,
            class_id: detection.class_id,
            embedding: detection.embedding,
        }
    }
}

/// Error envelope for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}

/// Health response. Always 200; reports each slot independently.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub models: BTreeMap<String, ModelStatusDto>,
}

#[derive(Debug, Serialize)]
pub struct ModelStatusDto {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Readiness response. 200 only when every model is ready.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<BTreeMap<String, String>>,
}
