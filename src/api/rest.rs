//! Axum REST API handlers

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::config::ServerConfig;
use crate::error::InferenceError;
use crate::service::InferencePipeline;

use super::dto::*;

/// Large camera frames arrive base64-encoded in a JSON body.
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Application state shared across handlers
pub struct AppState {
    pub pipeline: Arc<InferencePipeline>,
}

/// Create the REST API router
pub fn create_router(state: Arc<AppState>, server: &ServerConfig) -> Router {
    Router::new()
        .route("/infer", post(infer_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors_layer(&server.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// An empty allow-list keeps the service permissive, matching how
/// deployments without `allowed_origins` behave.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Run the two-stage pipeline over one submitted image
async fn infer_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InferRequest>,
) -> Result<Json<InferResponse>, (StatusCode, Json<ErrorBody>)> {
    let image_bytes = decode_image_field(request.image.as_deref())
        .map_err(|e| (status_for(&e), Json(ErrorBody::new(e.to_string()))))?;

    let result = state
        .pipeline
        .infer(&image_bytes, request.confidence_threshold)
        .await
        .map_err(|e| {
            error!("Inference failed: {e}");
            (status_for(&e), Json(ErrorBody::new(e.to_string())))
        })?;

    Ok(Json(InferResponse::from_result(result)))
}

/// Liveness: always 200, reports each model slot independently
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let report = state.pipeline.health();
    let models = report
        .models
        .into_iter()
        .map(|m| {
            (
                m.name,
                ModelStatusDto {
                    status: m.status,
                    error: m.error,
                },
            )
        })
        .collect();

    Json(HealthResponse {
        status: "healthy".to_string(),
        models,
    })
}

/// Readiness: 200 only when every declared model is loaded
async fn ready_handler(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReadyResponse>) {
    if state.pipeline.ready() {
        return (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                models: None,
            }),
        );
    }

    let models = state
        .pipeline
        .health()
        .models
        .into_iter()
        .map(|m| (m.name, m.status))
        .collect();
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ReadyResponse {
            ready: false,
            models: Some(models),
        }),
    )
}

fn status_for(error: &InferenceError) -> StatusCode {
    match error {
        InferenceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        InferenceError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
        InferenceError::Decode { .. } | InferenceError::Run(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Accepts both raw base64 and `data:` URL payloads.
fn decode_image_field(field: Option<&str>) -> Result<Vec<u8>, InferenceError> {
    let field = field.unwrap_or("").trim();
    if field.is_empty() {
        return Err(InferenceError::InvalidInput(
            "missing image field".to_string(),
        ));
    }

    let payload = match field.split_once(',') {
        Some((_, rest)) => rest,
        None => field,
    };

    BASE64
        .decode(payload)
        .map_err(|_| InferenceError::InvalidInput("image is not valid base64".to_string()))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use base64::Engine as _;
    use http_body_util::BodyExt;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use tower::util::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::engine::registry::{ModelKind, ModelRegistry};
    use crate::engine::session::testing::ScriptedSession;
    use crate::engine::tensor::{Tensor, TensorMap};

    fn png_base64() -> String {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 12, Rgb([30, 60, 90])));
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).unwrap();
        BASE64.encode(buffer.into_inner())
    }

    fn ready_router() -> Router {
        let mut detector_outputs = TensorMap::new();
        detector_outputs.insert(
            "output0".to_string(),
            Tensor::new(
                vec![1, 1, 6],
                vec![0.1, 0.1, 0.9, 0.9, 0.8, 2.0],
            )
            .unwrap(),
        );
        let mut embedder_outputs = TensorMap::new();
        embedder_outputs.insert(
            "embedding".to_string(),
            Tensor::new(vec![1, 4], vec![1.0, 2.0, 3.0, 4.0]).unwrap(),
        );

        let registry = Arc::new(ModelRegistry::new());
        registry.mark_ready(ModelKind::Detector, ScriptedSession::always(detector_outputs));
        registry.mark_ready(ModelKind::Embedder, ScriptedSession::always(embedder_outputs));

        let config = Config::default();
        let pipeline = Arc::new(InferencePipeline::new(registry, &config));
        create_router(Arc::new(AppState { pipeline }), &config.server)
    }

    fn unready_router() -> Router {
        let registry = Arc::new(ModelRegistry::new());
        registry.mark_failed(ModelKind::Detector, "corrupt file".to_string());

        let config = Config::default();
        let pipeline = Arc::new(InferencePipeline::new(registry, &config));
        create_router(Arc::new(AppState { pipeline }), &config.server)
    }

    async fn post_infer(router: Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/infer")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = axum::http::Request::builder()
            .method("GET")
            .uri(uri)
            .body(axum::body::Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn image_field_accepts_raw_base64_and_data_urls() {
        let raw = BASE64.encode(b"bytes");
        assert_eq!(decode_image_field(Some(&raw)).unwrap(), b"bytes");

        let data_url = format!("data:image/png;base64,{raw}");
        assert_eq!(decode_image_field(Some(&data_url)).unwrap(), b"bytes");

        assert!(decode_image_field(None).is_err());
        assert!(decode_image_field(Some("   ")).is_err());
        assert!(decode_image_field(Some("!!! not base64 !!!")).is_err());
    }

    #[tokio::test]
    async fn infer_returns_detections_with_meta() {
        let (status, body) = post_infer(
            ready_router(),
            serde_json::json!({ "image": png_base64() }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        let detections = body["inference"]["detections"].as_array().unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0]["classId"], 2);
        assert_eq!(
            detections[0]["embedding"],
            serde_json::json!([1.0, 2.0, 3.0, 4.0])
        );
        assert_eq!(body["meta"]["detectionsCount"], 1);
        assert_eq!(body["meta"]["model"], "v1.0.0");
    }

    #[tokio::test]
    async fn infer_rejects_bad_base64_with_400() {
        let (status, body) = post_infer(
            ready_router(),
            serde_json::json!({ "image": "@@not-base64@@" }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert!(body["error"].as_str().unwrap().contains("base64"));
    }

    #[tokio::test]
    async fn infer_rejects_missing_image_with_400() {
        let (status, body) = post_infer(ready_router(), serde_json::json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn infer_returns_503_while_models_are_not_ready() {
        let (status, body) = post_infer(
            unready_router(),
            serde_json::json!({ "image": png_base64() }),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["ok"], false);
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("detector"));
        assert!(message.contains("corrupt file"));
    }

    #[tokio::test]
    async fn health_is_200_even_when_models_failed() {
        let (status, body) = get_json(unready_router(), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["models"]["detector"]["status"], "failed");
        assert_eq!(body["models"]["detector"]["error"], "corrupt file");
        assert_eq!(body["models"]["embedder"]["status"], "unloaded");
    }

    #[tokio::test]
    async fn ready_reflects_registry_state() {
        let (status, body) = get_json(ready_router(), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ready"], true);

        let (status, body) = get_json(unready_router(), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["ready"], false);
        assert_eq!(body["models"]["detector"], "failed");
    }
}
