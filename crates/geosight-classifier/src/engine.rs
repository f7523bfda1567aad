//! Inference engine trait and the ConvNeXt implementation

use candle_core::{DType, Device, Tensor};
use candle_nn::{Func, Module};
use candle_transformers::models::convnext;
use geosight_core::{ClassLabel, Error, Result, ScoreVector};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::model_loader::{ConvNextVariant, LoadedWeights, ModelConfig};
use crate::preprocess::INPUT_SHAPE;

/// A loaded model producing one raw score per terrain class.
///
/// Implementations are loaded once and shared across requests, so `run`
/// takes `&self` and must not mutate model state.
pub trait InferenceEngine: Send + Sync {
    /// Forward pass over a `(1, 3, 224, 224)` tensor, returning raw logits
    fn run(&self, input: &Tensor) -> Result<ScoreVector>;

    /// Engine name, for logs
    fn name(&self) -> &str;
}

/// Reject tensors the network was not built for
pub fn check_input_shape(input: &Tensor) -> Result<()> {
    if input.dims() != INPUT_SHAPE {
        return Err(Error::inference(format!(
            "expected input shape {:?}, got {:?}",
            INPUT_SHAPE,
            input.dims()
        )));
    }
    if input.dtype() != DType::F32 {
        return Err(Error::inference(format!(
            "expected f32 input, got {:?}",
            input.dtype()
        )));
    }
    Ok(())
}

/// ConvNeXt with a ten-way classification head
pub struct ConvNextEngine {
    name: String,
    model: Func<'static>,
    device: Device,
    weights_path: PathBuf,
}

impl ConvNextEngine {
    /// Load weights and build the network
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let weights = LoadedWeights::load(config)?;
        Self::from_weights(&weights, config.variant)
    }

    /// Build the network from already mapped weights
    pub fn from_weights(weights: &LoadedWeights, variant: ConvNextVariant) -> Result<Self> {
        let model = convnext::convnext(
            &variant.config(),
            ClassLabel::COUNT,
            weights.var_builder().clone(),
        )
        .map_err(|e| {
            Error::config(format!(
                "Failed to build ConvNeXt-{} with {} classes: {}",
                variant,
                ClassLabel::COUNT,
                e
            ))
        })?;

        let name = weights
            .weights_path()
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("convnext-{}", variant));

        info!(
            "Built ConvNeXt-{} classifier '{}' on {:?}",
            variant,
            name,
            weights.device()
        );

        Ok(Self {
            name,
            model,
            device: weights.device().clone(),
            weights_path: weights.weights_path().to_path_buf(),
        })
    }

    /// Weights file this engine was built from
    pub fn weights_path(&self) -> &Path {
        &self.weights_path
    }

    fn forward(&self, input: &Tensor) -> candle_core::Result<Vec<f32>> {
        let input = input.to_device(&self.device)?;
        self.model
            .forward(&input)?
            .squeeze(0)?
            .to_dtype(DType::F32)?
            .to_vec1::<f32>()
    }
}

impl InferenceEngine for ConvNextEngine {
    fn run(&self, input: &Tensor) -> Result<ScoreVector> {
        check_input_shape(input)?;

        let logits = self
            .forward(input)
            .map_err(|e| Error::inference(format!("forward pass failed: {}", e)))?;

        ScoreVector::from_slice(&logits)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
