mod auth;
mod config;
mod cover_letters;
mod db;
mod errors;
mod llm_client;
mod members;
mod models;
mod resumes;
mod routes;
mod state;
#[cfg(test)]
mod test_utils;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::oauth::GoogleOAuthClient;
use crate::auth::service::TokenService;
use crate::auth::store::RedisSessionStore;
use crate::auth::tokens::JwtCodec;
use crate::config::Config;
use crate::cover_letters::seed::seed_features;
use crate::db::{create_pool, run_migrations};
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CVmento API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    run_migrations(&db).await?;

    seed_features(&db).await?;

    // Initialize Redis
    let redis = redis::Client::open(config.redis_url.clone())?;
    let store = Arc::new(RedisSessionStore::connect(&redis, config.redis_keys.clone()).await?);
    info!("Redis session store connected");

    let tokens = TokenService::new(JwtCodec::new(&config.jwt), store);

    // Initialize LLM client
    let llm = LlmClient::new(config.llm_api_url.clone(), config.llm_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let google = match config.google.clone() {
        Some(google_config) => Some(GoogleOAuthClient::new(google_config)?),
        None => {
            warn!("Google credentials not set; Google login is disabled");
            None
        }
    };
    if config.enable_dev_login {
        warn!("Development logins are enabled");
    }

    let cors = build_cors(&config)?;

    // Build app state
    let state = AppState {
        db,
        tokens,
        llm,
        google,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Cookie transport needs credentials, so the frontend origin is listed explicitly.
fn build_cors(config: &Config) -> Result<CorsLayer> {
    let origin = HeaderValue::from_str(&config.frontend_url)
        .with_context(|| format!("FRONTEND_URL is not a valid origin: {}", config.frontend_url))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]))
}
