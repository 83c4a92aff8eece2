use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use word_imposter::{
    auth::AdminAuth,
    broadcast::Gateway,
    config::AppConfig,
    settings::JsonConfigStore,
    state::AppState,
    words::FileWordSource,
    ws::{self, ServerContext},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "word_imposter=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Word Imposter...");

    let config = AppConfig::from_env();

    let settings = Arc::new(JsonConfigStore::open(&config.settings_file).await);
    let words = Arc::new(FileWordSource::open(&config.words_file, &config.used_words_file).await?);
    let gateway = Arc::new(Gateway::default());

    let state = Arc::new(
        AppState::new(settings, words, gateway.clone()).with_timing(config.timing.clone()),
    );
    let ctx = Arc::new(ServerContext::new(
        state,
        gateway,
        AdminAuth::new(config.admin_token.clone()),
    ));

    // Periodically forget expired command cooldowns
    let cooldowns = ctx.cooldowns.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            cooldowns.cleanup().await;
        }
    });

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    tracing::info!("Listening on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
