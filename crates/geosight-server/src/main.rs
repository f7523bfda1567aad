//! GeoSight
//!
//! Satellite land-use classification service.
//!
//! `geosight serve` loads the model once and answers classification
//! requests over HTTP. `geosight classify` runs a single local image through
//! the same pipeline and prints the response.

use anyhow::Result;
use clap::{Parser, Subcommand};
use geosight_classifier::ClassificationService;
use geosight_core::ErrorResponse;
use geosight_server::{
    create_router, init_metrics, init_tracing, AppState, ConfigOverrides, LogFormat, ServerConfig,
};
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "geosight")]
#[command(author, version, about = "GeoSight satellite terrain classifier", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP classification server
    Serve {
        /// Configuration file path
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Listen address
        #[arg(short = 'l', long)]
        listen: Option<String>,

        /// Listen port
        #[arg(short = 'P', long)]
        port: Option<u16>,

        /// Local weights file, overriding the configured model source
        #[arg(long, env = "GEOSIGHT_MODEL")]
        model: Option<PathBuf>,

        /// Log line format
        #[arg(long, value_enum, default_value_t = LogFormat::Text)]
        log_format: LogFormat,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Classify one image file and print the JSON response
    Classify {
        /// Image to classify
        image: PathBuf,

        /// Configuration file path
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Local weights file, overriding the configured model source
        #[arg(long, env = "GEOSIGHT_MODEL")]
        model: Option<PathBuf>,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            listen,
            port,
            model,
            log_format,
            verbose,
        } => {
            init_tracing(verbose, log_format);
            let overrides = ConfigOverrides {
                listen,
                port,
                model,
            };
            serve(config, overrides).await
        }
        Commands::Classify {
            image,
            config,
            model,
            verbose,
        } => {
            init_tracing(verbose, LogFormat::Text);
            let overrides = ConfigOverrides {
                model,
                ..Default::default()
            };
            classify_file(image, config, overrides)
        }
    }
}

async fn serve(config_path: PathBuf, overrides: ConfigOverrides) -> Result<()> {
    info!("Starting GeoSight server");

    // Load configuration
    let config = ServerConfig::load(&config_path, &overrides)?;
    let addr = config.socket_addr()?;
    info!("Configuration loaded successfully");
    info!("Model: {:?}", config.classifier.model.source);
    info!("Variant: {}", config.classifier.model.variant);

    // Initialize metrics
    let metrics_handle = init_metrics()?;

    // Load the model before accepting connections
    let state = tokio::task::spawn_blocking(move || AppState::load(config, metrics_handle)).await??;
    info!("Classifier ready: {}", state.service.engine_name());

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    // Graceful shutdown handler
    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn classify_file(image: PathBuf, config_path: PathBuf, overrides: ConfigOverrides) -> Result<()> {
    let config = ServerConfig::load(&config_path, &overrides)?;
    let service = ClassificationService::load(&config.classifier)?;

    let bytes = std::fs::read(&image)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", image.display(), e))?;

    match service.classify(&bytes) {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result.to_response())?);
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&ErrorResponse::from(&e))?);
            Err(e.into())
        }
    }
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
