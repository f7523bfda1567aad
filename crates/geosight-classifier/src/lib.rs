//! GeoSight Classifier
//!
//! Land-use classification of satellite tiles into the ten EuroSAT terrain
//! classes.
//!
//! A request flows through five components, owned by [`ClassificationService`]:
//! - [`SharpnessGate`]: rejects blurry tiles by Laplacian variance
//! - [`TensorPreprocessor`]: decodes, resizes to 224x224 and normalizes
//! - [`InferenceEngine`]: produces one raw score per class (ConvNeXt via Candle)
//! - [`ScoreNormalizer`]: softmax and stable argmax
//! - [`InsightCatalog`]: description and recommendation for the winning class
//!
//! All components run on CPU by default and are safe to share across threads.

pub mod config;
pub mod engine;
pub mod insights;
pub mod model_loader;
pub mod preprocess;
pub mod scoring;
pub mod service;
pub mod sharpness;

pub use config::{ClassifierConfig, DeviceSpec, GateConfig, ModelConfigSpec, ModelFormatSpec, ModelSourceSpec};
pub use engine::{check_input_shape, ConvNextEngine, InferenceEngine};
pub use insights::{InsightCatalog, FALLBACK_INSIGHT};
pub use model_loader::{ConvNextVariant, DeviceType, LoadedWeights, ModelConfig, ModelFormat, ModelSource};
pub use preprocess::{TensorPreprocessor, INPUT_SHAPE, INPUT_SIZE, UNDECODABLE_IMAGE_MESSAGE};
pub use scoring::{Prediction, ScoreNormalizer};
pub use service::{ClassificationService, Stage, BLURRY_IMAGE_MESSAGE, NO_IMAGE_MESSAGE};
pub use sharpness::{Sharpness, SharpnessGate, DEFAULT_BLUR_THRESHOLD};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::engine::InferenceEngine;
    pub use crate::service::ClassificationService;
    pub use crate::sharpness::SharpnessGate;
    pub use geosight_core::{ClassLabel, ClassificationResult, Error, Result, ScoreVector};
}
