//! Error types for GeoSight

/// Result type alias using GeoSight's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Message returned to callers for server-side failures
const INTERNAL_PUBLIC_MESSAGE: &str = "Classification failed due to an internal error.";

/// Core error type for GeoSight operations
///
/// The first five variants are the request taxonomy of the classification
/// pipeline. The remaining ones come from startup (configuration, model
/// files) and are never produced by a single `classify` call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or empty image bytes
    #[error("{0}")]
    Input(String),

    /// Image decodes but is too blurry to classify
    #[error("{0}")]
    Quality(String),

    /// Bytes do not decode as an image
    #[error("{0}")]
    Preprocessing(String),

    /// Model runtime failure
    #[error("inference error: {0}")]
    Inference(String),

    /// Anything unexpected caught at the service boundary
    #[error("internal error: {0}")]
    Internal(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML configuration parse errors
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a new input error
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    /// Create a new quality error
    pub fn quality(msg: impl Into<String>) -> Self {
        Self::Quality(msg.into())
    }

    /// Create a new preprocessing error
    pub fn preprocessing(msg: impl Into<String>) -> Self {
        Self::Preprocessing(msg.into())
    }

    /// Create a new inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the failure was caused by what the caller sent.
    ///
    /// Transports map `true` to a 400-class status and `false` to 500.
    pub fn is_caller_fault(&self) -> bool {
        matches!(
            self,
            Self::Input(_) | Self::Quality(_) | Self::Preprocessing(_)
        )
    }

    /// Short, stable name of the error kind (used for metric labels)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input(_) => "input",
            Self::Quality(_) => "quality",
            Self::Preprocessing(_) => "preprocessing",
            Self::Inference(_) => "inference",
            Self::Internal(_) => "internal",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Yaml(_) => "yaml",
        }
    }

    /// Message safe to hand back to a caller.
    ///
    /// Caller faults keep their full text so the caller can correct the
    /// request. Server faults collapse to a generic sentence; the detail
    /// belongs in the logs.
    pub fn public_message(&self) -> String {
        if self.is_caller_fault() {
            self.to_string()
        } else {
            INTERNAL_PUBLIC_MESSAGE.to_string()
        }
    }
}
