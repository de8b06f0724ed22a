//! Inference service configuration

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub inference: InferenceConfig,
    pub models: ModelsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// CORS allow-list. Empty means permissive.
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    /// Default confidence threshold; requests may override it.
    pub confidence_threshold: f32,
    pub model_version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    pub detector: ModelIoConfig,
    pub embedder: ModelIoConfig,
}

/// Model file location plus its tensor-name contract. The pipeline feeds
/// and reads tensors by these names and fails fast when a name is absent.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelIoConfig {
    pub path: PathBuf,
    pub input: String,
    pub output: String,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn default_path() -> &'static str {
        "config.toml"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 3000,
                allowed_origins: Vec::new(),
            },
            inference: InferenceConfig {
                confidence_threshold: 0.25,
                model_version: "v1.0.0".to_string(),
            },
            models: ModelsConfig {
                detector: ModelIoConfig {
                    path: PathBuf::from("models/yolo.onnx"),
                    input: "images".to_string(),
                    output: "output0".to_string(),
                },
                embedder: ModelIoConfig {
                    path: PathBuf::from("models/embedder.onnx"),
                    input: "input".to_string(),
                    output: "embedding".to_string(),
                },
            },
        }
    }
}
