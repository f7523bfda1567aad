//! GeoSight Core
//!
//! Core types and error handling shared across GeoSight components.
//!
//! This crate provides:
//! - The fixed, ordered set of terrain classes and the score vectors aligned to it
//! - Insight and classification result types
//! - Transport representations of success and failure
//! - The error taxonomy of the classification pipeline

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    ClassLabel, ClassificationResponse, ClassificationResult, ErrorResponse, Insight, ScoreVector,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{ClassLabel, ClassificationResult, Insight, ScoreVector};
}
