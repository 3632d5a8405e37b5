//! Loadmatch service
//!
//! Serves the load-matching API over HTTP.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use loadmatch::api::{self, AppState};
use loadmatch::config::Config;
use loadmatch::db::{self, EntityStore};
use loadmatch::evaluator::{GatewayEvaluator, MatchEvaluator, RuleBasedEvaluator};
use loadmatch::gateway::{GeminiClient, TextGenerator};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting Loadmatch");

    // Load configuration
    let config = Config::load()?;
    info!(
        http_port = config.http_port,
        seed_path = ?config.seed_path,
        gemini_model = %config.gemini_model,
        gateway_configured = config.gemini_api_key.is_some(),
        "Configuration loaded"
    );

    // Seed the entity store
    let store = match &config.seed_path {
        Some(path) => match db::load_seed_from_file(path) {
            Ok(seed) => EntityStore::seeded(seed, config.audit_capacity),
            Err(e) => {
                warn!("Failed to load seed data: {:#}. Starting with an empty store.", e);
                EntityStore::with_audit_capacity(config.audit_capacity)
            }
        },
        None => {
            info!("No seed file configured, starting with an empty store");
            EntityStore::with_audit_capacity(config.audit_capacity)
        }
    };

    // Pick the match evaluator
    let generator: Option<Arc<dyn TextGenerator>> = match config.gemini() {
        Some(gemini) => {
            let client = GeminiClient::new(gemini)?;
            info!(model = client.model(), "Gemini client ready");
            Some(Arc::new(client))
        }
        None => {
            warn!(
                "No Gemini API key configured; \
                 using rule-based evaluation and disabling advisory analyses"
            );
            None
        }
    };
    let evaluator: Arc<dyn MatchEvaluator> = match &generator {
        Some(generator) => Arc::new(GatewayEvaluator::new(generator.clone())),
        None => Arc::new(RuleBasedEvaluator::new(config.rule_evaluator())),
    };
    info!(evaluator = evaluator.name(), "Match evaluator ready");

    let state = Arc::new(AppState::new(Arc::new(store), evaluator, generator));
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port)).await?;
    info!("HTTP server listening on port {}", config.http_port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
