//! Model registry and per-slot readiness state machine.
//!
//! One slot per declared model, with independent lifecycles:
//! `Unloaded -> Loading -> {Ready, Failed}`, plus the terminal `Missing`
//! state for a model file that was never provisioned. Slots are written
//! only during the startup load phase and read thereafter.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::config::ModelsConfig;
use crate::engine::session::{Engine, EngineSession};

/// The models this service declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Detector,
    Embedder,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::Detector, ModelKind::Embedder];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Detector => "detector",
            ModelKind::Embedder => "embedder",
        }
    }
}

/// Load lifecycle of a single model slot.
///
/// `Missing` means the model file was not provisioned, as opposed to
/// `Failed` which records a load exception; operators need to tell the two
/// apart. Ready, Failed, and Missing are terminal: recovery is a process
/// restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStatus {
    Unloaded,
    Loading,
    Ready,
    Failed,
    Missing,
}

impl ModelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelStatus::Unloaded => "unloaded",
            ModelStatus::Loading => "loading",
            ModelStatus::Ready => "ready",
            ModelStatus::Failed => "failed",
            ModelStatus::Missing => "missing",
        }
    }
}

/// One registered model: its status, captured error, and session handle.
pub struct ModelSlot {
    pub status: ModelStatus,
    pub last_error: Option<String>,
    session: Option<Arc<dyn EngineSession>>,
}

impl ModelSlot {
    fn new() -> Self {
        Self {
            status: ModelStatus::Unloaded,
            last_error: None,
            session: None,
        }
    }
}

/// Status snapshot of one slot, used for health reporting.
#[derive(Debug, Clone)]
pub struct SlotReport {
    pub kind: ModelKind,
    pub status: ModelStatus,
    pub error: Option<String>,
}

/// Registry of all declared model slots.
pub struct ModelRegistry {
    detector: RwLock<ModelSlot>,
    embedder: RwLock<ModelSlot>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            detector: RwLock::new(ModelSlot::new()),
            embedder: RwLock::new(ModelSlot::new()),
        }
    }

    fn slot(&self, kind: ModelKind) -> &RwLock<ModelSlot> {
        match kind {
            ModelKind::Detector => &self.detector,
            ModelKind::Embedder => &self.embedder,
        }
    }

    pub fn begin_loading(&self, kind: ModelKind) {
        self.slot(kind).write().status = ModelStatus::Loading;
    }

    pub fn mark_ready(&self, kind: ModelKind, session: Arc<dyn EngineSession>) {
        let mut slot = self.slot(kind).write();
        slot.status = ModelStatus::Ready;
        slot.last_error = None;
        slot.session = Some(session);
    }

    pub fn mark_failed(&self, kind: ModelKind, error: String) {
        let mut slot = self.slot(kind).write();
        slot.status = ModelStatus::Failed;
        slot.last_error = Some(error);
    }

    pub fn mark_missing(&self, kind: ModelKind, path: &std::path::Path) {
        let mut slot = self.slot(kind).write();
        slot.status = ModelStatus::Missing;
        slot.last_error = Some(format!("model file not found: {}", path.display()));
    }

    /// Session handle for a slot, present only when the slot is `Ready`.
    pub fn session(&self, kind: ModelKind) -> Option<Arc<dyn EngineSession>> {
        self.slot(kind).read().session.clone()
    }

    /// True only when every declared model is `Ready`.
    pub fn ready(&self) -> bool {
        ModelKind::ALL
            .iter()
            .all(|&kind| self.slot(kind).read().status == ModelStatus::Ready)
    }

    /// Human-readable summary of every slot that is not `Ready`, for the
    /// not-ready response body.
    pub fn pending_summary(&self) -> String {
        let parts: Vec<String> = ModelKind::ALL
            .iter()
            .filter_map(|&kind| {
                let slot = self.slot(kind).read();
                if slot.status == ModelStatus::Ready {
                    return None;
                }
                Some(match &slot.last_error {
                    Some(error) => {
                        format!("{} is {} ({error})", kind.as_str(), slot.status.as_str())
                    }
                    None => format!("{} is {}", kind.as_str(), slot.status.as_str()),
                })
            })
            .collect();
        parts.join("; ")
    }

    /// Status snapshot of every slot. Never fails; health reporting must
    /// work regardless of overall readiness.
    pub fn report(&self) -> Vec<SlotReport> {
        ModelKind::ALL
            .iter()
            .map(|&kind| {
                let slot = self.slot(kind).read();
                SlotReport {
                    kind,
                    status: slot.status,
                    error: slot.last_error.clone(),
                }
            })
            .collect()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Load every declared model, in parallel and independently: one model
/// failing never blocks or fails the other. Errors are captured into the
/// slots, never raised.
pub async fn load_models(
    registry: Arc<ModelRegistry>,
    engine: Arc<dyn Engine>,
    models: ModelsConfig,
) {
    let detector = load_slot(
        registry.clone(),
        engine.clone(),
        ModelKind::Detector,
        models.detector.path.clone(),
    );
    let embedder = load_slot(
        registry.clone(),
        engine,
        ModelKind::Embedder,
        models.embedder.path.clone(),
    );
    tokio::join!(detector, embedder);

    if registry.ready() {
        info!("All models ready");
    } else {
        warn!("Service is not ready: {}", registry.pending_summary());
    }
}

async fn load_slot(
    registry: Arc<ModelRegistry>,
    engine: Arc<dyn Engine>,
    kind: ModelKind,
    path: PathBuf,
) {
    // A missing file is "not provisioned", not a load exception; the
    // engine loader is never invoked for it.
    if !path.exists() {
        warn!("Model {} not provisioned ({})", kind.as_str(), path.display());
        registry.mark_missing(kind, &path);
        return;
    }

    registry.begin_loading(kind);
    info!("Loading model {} from {}", kind.as_str(), path.display());

    let load_path = path.clone();
    let result = tokio::task::spawn_blocking(move || engine.load(&load_path)).await;
    match result {
        Ok(Ok(session)) => {
            info!("Model {} ready", kind.as_str());
            registry.mark_ready(kind, session);
        }
        Ok(Err(error)) => {
            warn!("Model {} failed to load: {error}", kind.as_str());
            registry.mark_failed(kind, error.to_string());
        }
        Err(join_error) => {
            warn!("Model {} load task failed: {join_error}", kind.as_str());
            registry.mark_failed(kind, join_error.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::ModelIoConfig;
    use crate::engine::session::testing::{ScriptedEngine, ScriptedSession};
    use crate::engine::tensor::Tensor;

    fn ready_session() -> Arc<ScriptedSession> {
        let mut outputs = HashMap::new();
        outputs.insert(
            "output".to_string(),
            Tensor::new(vec![1], vec![0.0]).unwrap(),
        );
        ScriptedSession::always(outputs)
    }

    fn models_config(detector: PathBuf, embedder: PathBuf) -> ModelsConfig {
        ModelsConfig {
            detector: ModelIoConfig {
                path: detector,
                input: "images".to_string(),
                output: "output0".to_string(),
            },
            embedder: ModelIoConfig {
                path: embedder,
                input: "input".to_string(),
                output: "embedding".to_string(),
            },
        }
    }

    #[test]
    fn fresh_registry_is_not_ready() {
        let registry = ModelRegistry::new();
        assert!(!registry.ready());
        for report in registry.report() {
            assert_eq!(report.status, ModelStatus::Unloaded);
            assert!(report.error.is_none());
        }
    }

    #[test]
    fn readiness_requires_every_slot_ready() {
        let registry = ModelRegistry::new();
        registry.mark_ready(ModelKind::Detector, ready_session());
        assert!(!registry.ready());

        registry.mark_ready(ModelKind::Embedder, ready_session());
        assert!(registry.ready());

        registry.mark_failed(ModelKind::Embedder, "engine exploded".to_string());
        assert!(!registry.ready());
        assert!(registry.pending_summary().contains("embedder is failed"));
        assert!(registry.pending_summary().contains("engine exploded"));
    }

    #[tokio::test]
    async fn missing_file_marks_slot_missing_without_invoking_engine() {
        let registry = Arc::new(ModelRegistry::new());
        let engine = Arc::new(ScriptedEngine::new());
        let models = models_config(
            PathBuf::from("/nonexistent/detector.onnx"),
            PathBuf::from("/nonexistent/embedder.onnx"),
        );

        load_models(registry.clone(), engine.clone(), models).await;

        assert_eq!(engine.load_count(), 0);
        for report in registry.report() {
            assert_eq!(report.status, ModelStatus::Missing);
            assert!(report.error.as_deref().unwrap().contains("not found"));
        }
    }

    #[tokio::test]
    async fn one_failed_load_does_not_block_the_other() {
        let detector_file = tempfile::NamedTempFile::new().unwrap();
        let embedder_file = tempfile::NamedTempFile::new().unwrap();

        let engine = Arc::new(ScriptedEngine::new());
        engine.on_load(detector_file.path(), Ok(ready_session()));
        engine.on_load(embedder_file.path(), Err("corrupt model file".to_string()));

        let registry = Arc::new(ModelRegistry::new());
        let models = models_config(
            detector_file.path().to_path_buf(),
            embedder_file.path().to_path_buf(),
        );

        load_models(registry.clone(), engine.clone(), models).await;

        assert_eq!(engine.load_count(), 2);
        assert!(!registry.ready());

        let reports = registry.report();
        let detector = reports.iter().find(|r| r.kind == ModelKind::Detector).unwrap();
        let embedder = reports.iter().find(|r| r.kind == ModelKind::Embedder).unwrap();
        assert_eq!(detector.status, ModelStatus::Ready);
        assert_eq!(embedder.status, ModelStatus::Failed);
        assert_eq!(embedder.error.as_deref(), Some("corrupt model file"));
        assert!(registry.session(ModelKind::Detector).is_some());
        assert!(registry.session(ModelKind::Embedder).is_none());
    }
}
