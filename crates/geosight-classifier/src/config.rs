//! Configuration for the classification pipeline and model loading

use crate::model_loader::{ConvNextVariant, DeviceType, ModelConfig, ModelFormat, ModelSource};
use crate::sharpness::{SharpnessGate, DEFAULT_BLUR_THRESHOLD};
use geosight_core::{ClassLabel, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Configuration for the classifier: which model to load and how to gate input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Model to load at startup
    #[serde(default)]
    pub model: ModelConfigSpec,

    /// Sharpness gate settings
    #[serde(default)]
    pub gate: GateConfig,
}

/// Model configuration specification (for YAML/config files)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfigSpec {
    /// Where the weights come from
    #[serde(default)]
    pub source: ModelSourceSpec,

    /// ConvNeXt size
    #[serde(default)]
    pub variant: ConvNextVariant,

    /// Weight file format
    #[serde(default)]
    pub format: ModelFormatSpec,

    /// Inference device
    #[serde(default)]
    pub device: DeviceSpec,

    /// Output labels as the model was trained, checked against the fixed class order
    #[serde(default)]
    pub labels: Option<Vec<String>>,
}

/// Model source specification (for config files)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelSourceSpec {
    /// Local file path
    Local { path: PathBuf },

    /// Hugging Face Hub
    HuggingFace {
        repo_id: String,
        filename: String,
        #[serde(default)]
        revision: Option<String>,
    },
}

/// Device specification (for config files)
///
/// Written as `cpu`, `cuda`, `metal`, `cuda:1`, or as a map such as
/// `cuda: { index: 1 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "DeviceRepr", into = "DeviceRepr")]
pub enum DeviceSpec {
    #[default]
    Cpu,
    Cuda {
        index: Option<usize>,
    },
    Metal {
        index: Option<usize>,
    },
}

/// On-disk spellings of [`DeviceSpec`]
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum DeviceRepr {
    Name(String),
    Indexed(BTreeMap<String, DeviceIndex>),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DeviceIndex {
    #[serde(default)]
    index: Option<usize>,
}

impl DeviceSpec {
    fn from_parts(kind: &str, index: Option<usize>) -> std::result::Result<Self, String> {
        match (kind.to_ascii_lowercase().as_str(), index) {
            ("cpu", None) => Ok(Self::Cpu),
            ("cpu", Some(_)) => Err("cpu device takes no index".to_string()),
            ("cuda", index) => Ok(Self::Cuda { index }),
            ("metal", index) => Ok(Self::Metal { index }),
            (other, _) => Err(format!(
                "unknown device '{}', expected cpu, cuda or metal",
                other
            )),
        }
    }
}

impl TryFrom<DeviceRepr> for DeviceSpec {
    type Error = String;

    fn try_from(repr: DeviceRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            DeviceRepr::Name(name) => match name.split_once(':') {
                Some((kind, index)) => {
                    let index = index
                        .trim()
                        .parse::<usize>()
                        .map_err(|e| format!("invalid device index in '{}': {}", name, e))?;
                    Self::from_parts(kind.trim(), Some(index))
                }
                None => Self::from_parts(name.trim(), None),
            },
            DeviceRepr::Indexed(map) => {
                let mut entries = map.into_iter();
                match (entries.next(), entries.next()) {
                    (Some((kind, spec)), None) => Self::from_parts(&kind, spec.index),
                    _ => Err("device map must have exactly one entry".to_string()),
                }
            }
        }
    }
}

impl From<DeviceSpec> for DeviceRepr {
    fn from(spec: DeviceSpec) -> Self {
        let name = match spec {
            DeviceSpec::Cpu => "cpu".to_string(),
            DeviceSpec::Cuda { index: None } => "cuda".to_string(),
            DeviceSpec::Cuda { index: Some(i) } => format!("cuda:{}", i),
            DeviceSpec::Metal { index: None } => "metal".to_string(),
            DeviceSpec::Metal { index: Some(i) } => format!("metal:{}", i),
        };
        DeviceRepr::Name(name)
    }
}

/// Model format specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormatSpec {
    #[default]
    SafeTensors,
    PyTorch,
}

/// Sharpness gate settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Run the gate before preprocessing
    #[serde(default = "default_gate_enabled")]
    pub enabled: bool,

    /// Laplacian variance below which a tile is rejected
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: default_gate_enabled(),
            threshold: default_threshold(),
        }
    }
}

impl GateConfig {
    /// Gate to install in the service, `None` when disabled
    pub fn build(&self) -> Option<SharpnessGate> {
        self.enabled.then(|| SharpnessGate::new(self.threshold))
    }
}

impl Default for ModelConfigSpec {
    fn default() -> Self {
        Self {
            source: ModelSourceSpec::default(),
            variant: ConvNextVariant::default(),
            format: ModelFormatSpec::default(),
            device: DeviceSpec::default(),
            labels: None,
        }
    }
}

impl Default for ModelSourceSpec {
    fn default() -> Self {
        Self::Local {
            path: default_model_path(),
        }
    }
}

impl ClassifierConfig {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Point the model source at a local weights file
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model.source = ModelSourceSpec::Local { path: path.into() };
        self
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if let Some(labels) = &self.model.labels {
            ClassLabel::validate_order(labels)?;
        }

        if !self.gate.threshold.is_finite() || self.gate.threshold < 0.0 {
            return Err(Error::config(format!(
                "gate threshold must be a non-negative number, got {}",
                self.gate.threshold
            )));
        }

        Ok(())
    }

    /// Convert to ModelConfig for loading
    pub fn to_model_config(&self) -> ModelConfig {
        let spec = &self.model;

        let source = match &spec.source {
            ModelSourceSpec::Local { path } => ModelSource::LocalPath(path.clone()),
            ModelSourceSpec::HuggingFace {
                repo_id,
                filename,
                revision,
            } => ModelSource::HuggingFace {
                repo_id: repo_id.clone(),
                revision: revision.clone(),
                filename: filename.clone(),
            },
        };

        let format = match spec.format {
            ModelFormatSpec::SafeTensors => ModelFormat::SafeTensors,
            ModelFormatSpec::PyTorch => ModelFormat::PyTorch,
        };

        ModelConfig {
            source,
            variant: spec.variant,
            device: spec.device.to_device_type(),
            format,
        }
    }
}

impl DeviceSpec {
    /// Convert to DeviceType
    pub fn to_device_type(&self) -> DeviceType {
        match self {
            DeviceSpec::Cpu => DeviceType::Cpu,
            DeviceSpec::Cuda { index } => DeviceType::Cuda(index.unwrap_or(0)),
            DeviceSpec::Metal { index } => DeviceType::Metal(index.unwrap_or(0)),
        }
    }
}

fn default_model_path() -> PathBuf {
    PathBuf::from("./models/eurosat-convnext-tiny.safetensors")
}

fn default_gate_enabled() -> bool {
    true
}

fn default_threshold() -> f64 {
    DEFAULT_BLUR_THRESHOLD
}
