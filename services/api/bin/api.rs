//! Main Entrypoint for the Sparring API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the durable session store.
//! 3. Initializing the dialogue, scoring, and template services.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use sparring_api::{
    config::{Config, Provider},
    orchestrator::SessionOrchestrator,
    registry::ActiveSessionRegistry,
    router::create_router,
    state::AppState,
    store::SessionStore,
};
use sparring_core::{
    catalog::{FileCatalog, TemplateCatalog},
    dialogue::{DialogueGenerator, OpenAiDialogueGenerator, StaticDialogueGenerator},
    scoring::{LexicalScorer, OpenAiScorer, ResponseScorer},
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
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
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize the Session Store ---
    let store = Arc::new(SessionStore::new(config.sessions_path.clone()));
    let loaded = store.load().await;
    info!(sessions = loaded, "Session store initialized.");

    // --- 4. Initialize Shared Services ---
    let catalog: Arc<dyn TemplateCatalog> =
        Arc::new(FileCatalog::new(config.templates_path.clone()));

    let (generator, scorer): (Arc<dyn DialogueGenerator>, Arc<dyn ResponseScorer>) =
        match &config.provider {
            Provider::OpenAi => {
                info!("Using OpenAI provider.");
                let api_key = config
                    .openai_api_key
                    .as_deref()
                    .context("OPENAI_API_KEY is required for the openai provider")?;
                let openai_config = OpenAIConfig::new()
                    .with_api_key(api_key)
                    .with_api_base("https://api.openai.com/v1/");
                (
                    Arc::new(OpenAiDialogueGenerator::new(
                        openai_config.clone(),
                        config.chat_model.clone(),
                    )),
                    Arc::new(OpenAiScorer::new(openai_config, config.chat_model.clone())),
                )
            }
            Provider::Gemini => {
                info!("Using Gemini provider.");
                let api_key = config
                    .gemini_api_key
                    .as_deref()
                    .context("GEMINI_API_KEY is required for the gemini provider")?;
                let openai_config = OpenAIConfig::new()
                    .with_api_key(api_key)
                    .with_api_base("https://generativelanguage.googleapis.com/v1beta/openai");
                (
                    Arc::new(OpenAiDialogueGenerator::new(
                        openai_config.clone(),
                        config.chat_model.clone(),
                    )),
                    Arc::new(OpenAiScorer::new(openai_config, config.chat_model.clone())),
                )
            }
            Provider::Offline => {
                warn!("No generation provider configured; serving deterministic fallback dialogue.");
                (Arc::new(StaticDialogueGenerator), Arc::new(LexicalScorer))
            }
        };

    let registry = Arc::new(ActiveSessionRegistry::new());
    let orchestrator = Arc::new(SessionOrchestrator::new(
        store.clone(),
        registry.clone(),
        generator,
        scorer,
        catalog.clone(),
    ));

    let app_state = Arc::new(AppState {
        store,
        registry,
        orchestrator,
        catalog,
        config: Arc::new(config.clone()),
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
