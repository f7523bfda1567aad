//! Weight loading for Candle-based terrain classifiers

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::convnext;
use geosight_core::{Error, Result};
use hf_hub::{api::sync::Api, Repo, RepoType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configuration for loading a classifier model
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Source of the weights
    pub source: ModelSource,

    /// ConvNeXt size the weights were trained with
    pub variant: ConvNextVariant,

    /// Device to run inference on
    pub device: DeviceType,

    /// Weight file format
    pub format: ModelFormat,
}

/// Source location for model weights
#[derive(Debug, Clone)]
pub enum ModelSource {
    /// Load from local file system
    LocalPath(PathBuf),

    /// Download from Hugging Face Hub
    HuggingFace {
        repo_id: String,
        revision: Option<String>,
        filename: String,
    },
}

/// Device type for inference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    /// CPU inference (always available)
    Cpu,
    /// CUDA GPU inference (if available)
    Cuda(usize), // GPU index
    /// Metal (Apple Silicon)
    Metal(usize),
}

/// Model file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// SafeTensors format (recommended)
    SafeTensors,
    /// PyTorch format
    PyTorch,
}

/// ConvNeXt family member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvNextVariant {
    Atto,
    Femto,
    Pico,
    Nano,
    #[default]
    Tiny,
    Small,
    Base,
    Large,
    Xlarge,
}

impl ConvNextVariant {
    /// Candle architecture description for this variant
    pub fn config(self) -> convnext::Config {
        match self {
            Self::Atto => convnext::Config::atto(),
            Self::Femto => convnext::Config::femto(),
            Self::Pico => convnext::Config::pico(),
            Self::Nano => convnext::Config::nano(),
            Self::Tiny => convnext::Config::tiny(),
            Self::Small => convnext::Config::small(),
            Self::Base => convnext::Config::base(),
            Self::Large => convnext::Config::large(),
            Self::Xlarge => convnext::Config::xlarge(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Atto => "atto",
            Self::Femto => "femto",
            Self::Pico => "pico",
            Self::Nano => "nano",
            Self::Tiny => "tiny",
            Self::Small => "small",
            Self::Base => "base",
            Self::Large => "large",
            Self::Xlarge => "xlarge",
        }
    }
}

impl fmt::Display for ConvNextVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            source: ModelSource::LocalPath(PathBuf::new()),
            variant: ConvNextVariant::default(),
            device: DeviceType::Cpu,
            format: ModelFormat::SafeTensors,
        }
    }
}

impl ModelConfig {
    /// Create a new model configuration from local path
    pub fn from_local(path: impl Into<PathBuf>) -> Self {
        Self {
            source: ModelSource::LocalPath(path.into()),
            ..Default::default()
        }
    }

    /// Create a new model configuration from Hugging Face
    pub fn from_hf(repo_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            source: ModelSource::HuggingFace {
                repo_id: repo_id.into(),
                revision: None,
                filename: filename.into(),
            },
            ..Default::default()
        }
    }

    /// Set device
    pub fn with_device(mut self, device: DeviceType) -> Self {
        self.device = device;
        self
    }

    /// Set model format
    pub fn with_format(mut self, format: ModelFormat) -> Self {
        self.format = format;
        self
    }

    /// Set ConvNeXt variant
    pub fn with_variant(mut self, variant: ConvNextVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Set Hugging Face revision
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        if let ModelSource::HuggingFace { repo_id, filename, .. } = self.source {
            self.source = ModelSource::HuggingFace {
                repo_id,
                revision: Some(revision.into()),
                filename,
            };
        }
        self
    }
}

/// Weights resolved, mapped and placed on a device, ready to build a network
pub struct LoadedWeights {
    var_builder: VarBuilder<'static>,
    device: Device,
    weights_path: PathBuf,
}

impl LoadedWeights {
    /// Resolve and map the weights named by `config`
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let weights_path = resolve_model_path(config)?;
        let device = create_device(config.device)?;

        debug!("Mapping weights from {}", weights_path.display());
        let var_builder = match config.format {
            ModelFormat::SafeTensors => unsafe {
                VarBuilder::from_mmaped_safetensors(&[&weights_path], DType::F32, &device)
                    .map_err(|e| Error::config(format!("Failed to load SafeTensors: {}", e)))?
            },
            ModelFormat::PyTorch => VarBuilder::from_pth(&weights_path, DType::F32, &device)
                .map_err(|e| Error::config(format!("Failed to load PyTorch weights: {}", e)))?,
        };

        info!("Loaded weights from {}", weights_path.display());

        Ok(Self {
            var_builder,
            device,
            weights_path,
        })
    }

    /// VarBuilder for building model layers
    pub fn var_builder(&self) -> &VarBuilder<'static> {
        &self.var_builder
    }

    /// Device the weights live on
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Resolved weights path
    pub fn weights_path(&self) -> &Path {
        &self.weights_path
    }
}

/// Resolve the weights file named by a configuration
pub fn resolve_model_path(config: &ModelConfig) -> Result<PathBuf> {
    match &config.source {
        ModelSource::LocalPath(path) => {
            if !path.is_file() {
                return Err(Error::config(format!(
                    "Model file not found: {}",
                    path.display()
                )));
            }
            Ok(path.clone())
        }
        ModelSource::HuggingFace {
            repo_id,
            revision,
            filename,
        } => {
            info!("Fetching {} from Hugging Face repo {}", filename, repo_id);

            let api = Api::new()
                .map_err(|e| Error::config(format!("Failed to initialize HF API: {}", e)))?;

            let repo = api.repo(Repo::with_revision(
                repo_id.clone(),
                RepoType::Model,
                revision.clone().unwrap_or_else(|| "main".to_string()),
            ));

            repo.get(filename)
                .map_err(|e| Error::config(format!("Failed to download model from HF: {}", e)))
        }
    }
}

/// Create Candle device from device type
pub fn create_device(device_type: DeviceType) -> Result<Device> {
    match device_type {
        DeviceType::Cpu => Ok(Device::Cpu),
        DeviceType::Cuda(idx) => Device::new_cuda(idx)
            .map_err(|e| Error::config(format!("Failed to create CUDA device: {}", e))),
        DeviceType::Metal(idx) => Device::new_metal(idx)
            .map_err(|e| Error::config(format!("Failed to create Metal device: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_config_local() {
        let config = ModelConfig::from_local("/path/to/eurosat.safetensors")
            .with_device(DeviceType::Cpu)
            .with_variant(ConvNextVariant::Small)
            .with_format(ModelFormat::PyTorch);

        assert!(matches!(config.source, ModelSource::LocalPath(_)));
        assert_eq!(config.variant, ConvNextVariant::Small);
        assert_eq!(config.format, ModelFormat::PyTorch);
    }

    #[test]
    fn test_model_config_hf() {
        let config = ModelConfig::from_hf("opoku-ml/eurosat-convnext-tiny", "model.safetensors")
            .with_revision("v1");

        if let ModelSource::HuggingFace {
            repo_id,
            revision,
            filename,
        } = &config.source
        {
            assert_eq!(repo_id, "opoku-ml/eurosat-convnext-tiny");
            assert_eq!(revision.as_deref(), Some("v1"));
            assert_eq!(filename, "model.safetensors");
        } else {
            panic!("Expected HuggingFace source");
        }
    }

    #[test]
    fn test_missing_local_weights() {
        let config = ModelConfig::from_local("/nonexistent/eurosat.safetensors");

        let err = resolve_model_path(&config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(LoadedWeights::load(&config).is_err());
    }

    #[test]
    fn test_cpu_device() {
        assert!(create_device(DeviceType::Cpu).unwrap().is_cpu());
    }

    #[test]
    fn test_variant_names() {
        let variant: ConvNextVariant = serde_yaml::from_str("base").unwrap();
        assert_eq!(variant, ConvNextVariant::Base);
        assert_eq!(ConvNextVariant::default().to_string(), "tiny");
    }
}
