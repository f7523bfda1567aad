//! Shared application state

use anyhow::{Context, Result};
use geosight_classifier::ClassificationService;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::info;

use crate::config::ServerConfig;

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<ServerConfig>,

    /// Classification pipeline with its model loaded
    pub service: Arc<ClassificationService>,

    /// Prometheus metrics handle for rendering
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    /// Assemble state around an existing service
    pub fn new(
        config: ServerConfig,
        service: ClassificationService,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        Self {
            config: Arc::new(config),
            service: Arc::new(service),
            metrics_handle,
        }
    }

    /// Load the model named by the configuration and verify it with one forward pass
    pub fn load(config: ServerConfig, metrics_handle: PrometheusHandle) -> Result<Self> {
        info!("Loading classifier model");
        let service = ClassificationService::load(&config.classifier)
            .context("Failed to load classifier model")?;

        service
            .warm_up()
            .context("Classifier model failed its warm-up pass")?;

        match service.gate() {
            Some(gate) => info!("Sharpness gate enabled (threshold {})", gate.threshold()),
            None => info!("Sharpness gate disabled"),
        }

        Ok(Self::new(config, service, metrics_handle))
    }
}
