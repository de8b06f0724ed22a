//! Vehicle Inference Service
//!
//! Accepts an image over HTTP, runs a two-stage pipeline (object detector
//! followed by a per-object embedder), and returns structured detections
//! with feature vectors.

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use orc_inference::api::{create_router, AppState};
use orc_inference::config::Config;
use orc_inference::engine::registry::{load_models, ModelRegistry};
use orc_inference::engine::{Engine, OrtEngine};
use orc_inference::service::InferencePipeline;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!("Starting inference service v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load(Config::default_path()).unwrap_or_else(|e| {
        info!("Using default config ({})", e);
        Config::default()
    });

    info!("Configuration loaded:");
    info!("  Port: {}", config.server.port);
    info!("  Confidence threshold: {}", config.inference.confidence_threshold);
    info!("  Detector model: {}", config.models.detector.path.display());
    info!("  Embedder model: {}", config.models.embedder.path.display());

    // Load both models in the background, in parallel. Until they are
    // ready, requests are answered with 503 rather than queued.
    let registry = Arc::new(ModelRegistry::new());
    let engine: Arc<dyn Engine> = Arc::new(OrtEngine);
    tokio::spawn(load_models(
        registry.clone(),
        engine,
        config.models.clone(),
    ));

    let pipeline = Arc::new(InferencePipeline::new(registry, &config));
    let state = Arc::new(AppState { pipeline });
    let router = create_router(state, &config.server);

    let addr = format!("0.0.0.0:{}", config.server.port);
    info!("REST API listening on http://{}", addr);
    info!("Health: http://localhost:{}/health", config.server.port);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    info!("Goodbye!");
    Ok(())
}
