//! windlass daemon: classifies strategy intents given on the command line,
//! schedules them on the automation engine, and runs the scan loop until
//! ctrl-c.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use wl_chain::executor::ExecutorSet;
use wl_chain::gas::RpcGasMonitor;
use wl_chain::pools::StaticYieldMonitor;
use wl_core::config::{Config, CredentialProvider};
use wl_engine::AutomationEngine;
use wl_intent::{summarize, GeminiProvider, IntentClassifier};
use wl_telemetry::logging::{self, LogFormat};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    // Load config before logging so the telemetry section can shape the
    // subscriber; a broken file falls back to defaults and is reported
    // once the subscriber is up.
    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    let format = if config.telemetry.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Human
    };
    logging::init("wl-daemon", &config.telemetry.log_level, format);

    if let Some(e) = config_error {
        warn!(error = %e, "failed to load config, using defaults");
    }

    info!(version = env!("CARGO_PKG_VERSION"), "windlass daemon starting");

    let classifier = match CredentialProvider::model_api_key(&config.intent) {
        Some(key) => {
            info!(model = %config.intent.model, "model classification enabled");
            let provider = GeminiProvider::with_timeout(
                key,
                Duration::from_secs(config.intent.request_timeout_secs),
            );
            IntentClassifier::with_provider(Arc::new(provider), config.intent.model.clone())
        }
        None => {
            info!(
                api_key_env = %config.intent.api_key_env,
                "no model API key, classification runs rule-based only"
            );
            IntentClassifier::rules_only()
        }
    };

    let engine = AutomationEngine::new(
        &config.engine,
        Arc::new(RpcGasMonitor::new(&config.gas)),
        Arc::new(StaticYieldMonitor::with_default_pools()),
        ExecutorSet::builtin(),
    );

    let intent: String = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if intent.trim().is_empty() {
        info!("no intent given, engine idles until tasks are created");
        engine.start();
    } else {
        let classified = classifier
            .classify(&intent)
            .await
            .context("failed to classify intent")?;
        info!(source = %classified.source, "intent classified");
        for line in summarize(&classified.params).lines() {
            info!("{line}");
        }
        let task_id = engine
            .create_task("local", classified.params, "local")
            .context("failed to create task")?;
        info!(task_id = %task_id, "task scheduled");
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("ctrl-c received, shutting down");
    engine.stop().await;

    Ok(())
}
