//! End-to-end classification of a single tile
//!
//! The service owns one of each pipeline component and runs them in a fixed
//! order for every request:
//!
//! ```text
//! Received -> Gated -> Preprocessed -> Inferred -> Scored -> Enriched -> Completed
//! ```
//!
//! Any stage may fail, which ends the request with that stage's error. A
//! panic inside a stage is caught here and reported as an internal error.

use crate::config::ClassifierConfig;
use crate::engine::{ConvNextEngine, InferenceEngine};
use crate::insights::InsightCatalog;
use crate::preprocess::{TensorPreprocessor, INPUT_SIZE};
use crate::scoring::ScoreNormalizer;
use crate::sharpness::{Sharpness, SharpnessGate};
use candle_core::{DType, Device, Tensor};
use geosight_core::{ClassificationResult, Error, Result};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn};

/// Message for requests with no image bytes
pub const NO_IMAGE_MESSAGE: &str = "No image provided";

/// Message for requests rejected by the sharpness gate
pub const BLURRY_IMAGE_MESSAGE: &str = "Image is too blurry. Please upload a clearer photo.";

/// Position of a request in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Gated,
    Preprocessed,
    Inferred,
    Scored,
    Enriched,
    Completed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Gated => "gated",
            Self::Preprocessed => "preprocessed",
            Self::Inferred => "inferred",
            Self::Scored => "scored",
            Self::Enriched => "enriched",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Gate, preprocess, infer, score and enrich one image.
///
/// Cheap to share: wrap in an `Arc` and call `classify` from any number of
/// threads. The engine is never reloaded.
#[derive(Clone)]
pub struct ClassificationService {
    gate: Option<SharpnessGate>,
    preprocessor: TensorPreprocessor,
    engine: Arc<dyn InferenceEngine>,
    catalog: InsightCatalog,
}

impl ClassificationService {
    /// Service with the default gate, preprocessor and insight catalog
    pub fn new(engine: Arc<dyn InferenceEngine>) -> Self {
        Self {
            gate: Some(SharpnessGate::default()),
            preprocessor: TensorPreprocessor::new(),
            engine,
            catalog: InsightCatalog::new(),
        }
    }

    /// Service wired from configuration around an already loaded engine
    pub fn from_config(config: &ClassifierConfig, engine: Arc<dyn InferenceEngine>) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(engine).with_gate(config.gate.build()))
    }

    /// Load the ConvNeXt engine named by `config` and wrap it in a service
    pub fn load(config: &ClassifierConfig) -> Result<Self> {
        config.validate()?;
        let engine = ConvNextEngine::load(&config.to_model_config())?;
        Self::from_config(config, Arc::new(engine))
    }

    /// Replace the sharpness gate; `None` disables gating
    pub fn with_gate(mut self, gate: Option<SharpnessGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Replace the insight catalog
    pub fn with_catalog(mut self, catalog: InsightCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Active sharpness gate
    pub fn gate(&self) -> Option<&SharpnessGate> {
        self.gate.as_ref()
    }

    /// Name of the underlying engine
    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Run one forward pass on a blank input.
    ///
    /// Confirms at startup that the engine accepts the input shape and
    /// produces one score per class.
    pub fn warm_up(&self) -> Result<()> {
        let blank = Tensor::zeros((1, 3, INPUT_SIZE, INPUT_SIZE), DType::F32, &Device::Cpu)
            .map_err(|e| Error::internal(format!("failed to build warm-up tensor: {}", e)))?;

        let start = Instant::now();
        self.engine.run(&blank)?;
        info!(
            engine = self.engine.name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Engine warm-up complete"
        );
        Ok(())
    }

    /// Classify one encoded image
    pub fn classify(&self, image_bytes: &[u8]) -> Result<ClassificationResult> {
        let span = info_span!("classify", bytes = image_bytes.len(), engine = self.engine.name());
        let _enter = span.enter();

        let start = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_stages(image_bytes)))
            .unwrap_or_else(|payload| {
                Err(Error::internal(format!(
                    "classification panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });

        let latency_us = start.elapsed().as_micros() as u64;

        match outcome {
            Ok(mut result) => {
                result.latency_us = latency_us;
                info!(
                    label = %result.label,
                    confidence = result.confidence,
                    latency_us,
                    "Classification complete"
                );
                Ok(result)
            }
            Err(e) if e.is_caller_fault() => {
                warn!(kind = e.kind(), latency_us, "Classification rejected: {}", e);
                Err(e)
            }
            Err(e) => {
                error!(kind = e.kind(), latency_us, "Classification failed: {}", e);
                Err(e)
            }
        }
    }

    fn run_stages(&self, image_bytes: &[u8]) -> Result<ClassificationResult> {
        advance(Stage::Received);
        if image_bytes.is_empty() {
            return Err(Error::input(NO_IMAGE_MESSAGE));
        }

        if let Some(gate) = &self.gate {
            if let Sharpness::Blurry { score } = gate.check(image_bytes) {
                debug!(?score, threshold = gate.threshold(), "Rejected by sharpness gate");
                return Err(Error::quality(BLURRY_IMAGE_MESSAGE));
            }
        }
        advance(Stage::Gated);

        let input = self.preprocessor.process(image_bytes)?;
        advance(Stage::Preprocessed);

        let logits = self.engine.run(&input)?;
        advance(Stage::Inferred);

        let prediction = ScoreNormalizer::normalize(&logits)?;
        advance(Stage::Scored);

        let insight = *self.catalog.insight_for(prediction.label);
        advance(Stage::Enriched);

        let result = ClassificationResult {
            label: prediction.label,
            confidence: prediction.confidence,
            distribution: prediction.probabilities.iter().collect(),
            insight,
            latency_us: 0,
        };
        advance(Stage::Completed);

        Ok(result)
    }
}

fn advance(stage: Stage) {
    debug!(%stage, "Pipeline stage reached");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
