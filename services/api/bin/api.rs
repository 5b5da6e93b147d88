//! Main Entrypoint for the Tutor API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the prompt templates and building the model client.
//! 3. Constructing the Axum router and applying middleware.
//! 4. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use tutor_api::{config::Config, router::create_router, state::AppState};
use tutor_core::{
    llm_client::{LLMClient, OpenAICompatibleClient},
    prompts::load_prompts,
    tutor_service::LLMTutorService,
};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", e);
        return;
    }
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

    // --- 3. Initialize Shared Services ---
    let prompts = load_prompts(&config.prompts_path)?;
    info!(count = prompts.len(), path = %config.prompts_path.display(), "Prompt templates loaded.");

    let llm_client: Option<Arc<dyn LLMClient>> = match config.api_key() {
        Some(api_key) => Some(Arc::new(OpenAICompatibleClient::for_provider(
            config.provider,
            api_key,
        ))),
        None => {
            warn!(
                provider = %config.provider,
                "{} is not set; tutoring endpoints will answer 503.",
                config.provider.api_key_var()
            );
            None
        }
    };

    let app_state = Arc::new(AppState {
        tutor: Arc::new(LLMTutorService::new(llm_client, prompts)),
    });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        provider = %config.provider,
        model = config.provider.model(),
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
