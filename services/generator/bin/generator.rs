//! Main Entrypoint for the Course Generator Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Building the text generator, orchestrator and artifact store.
//! 4. Connecting to Kafka (any failure here is fatal).
//! 5. Running the consumer loop until a shutdown signal, then closing the session.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use coursegen_core::{
    orchestrator::Orchestrator,
    prompts::PromptTemplates,
    store::{ArtifactStore, FsArtifactStore},
    text_generation::{OpenAICompatibleGenerator, RetryingGenerator, TextGenerator},
};
use coursegen_service::{broker::KafkaSource, config::Config, consumer::CourseConsumer};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{error, info};

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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
    info!("Received shutdown signal. Stopping consumer...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Starting course generator...");

    // --- 3. Initialize Generation Services ---
    let prompts = match &config.prompts_path {
        Some(path) => PromptTemplates::builtin()
            .with_overrides_from(path)
            .context("Failed to load prompt overrides")?,
        None => PromptTemplates::builtin(),
    };

    let api_key = config
        .api_key()
        .context("No API key configured for the selected provider")?;
    let openai_config = OpenAIConfig::new()
        .with_api_key(api_key.expose_secret())
        .with_api_base(config.api_base());

    let generator: Arc<dyn TextGenerator> = Arc::new(
        RetryingGenerator::new(
            OpenAICompatibleGenerator::new(openai_config, config.chat_model.clone(), prompts)
                .with_temperature(config.temperature)
                .with_timeout(config.request_timeout),
            config.max_attempts,
        ),
    );
    let orchestrator = Orchestrator::new(generator);
    let store: Arc<dyn ArtifactStore> = Arc::new(FsArtifactStore::new(&config.output_dir));

    // --- 4. Connect to Kafka ---
    let source = KafkaSource::connect(&config.kafka)
        .await
        .context("Failed to start Kafka consumer")?;

    // --- 5. Run Consumer Loop ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        topic = %config.kafka.topic,
        output_dir = %config.output_dir.display(),
        "Service configured. Consuming course outlines..."
    );
    let mut consumer = CourseConsumer::new(source, orchestrator, store, config.on_persist_failure);
    let result = consumer.run(shutdown_signal()).await;
    consumer.into_source().close();

    let stats = result.context("Consumer loop halted")?;
    info!(?stats, "Course generator has shut down.");
    Ok(())
}
