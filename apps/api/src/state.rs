use sqlx::PgPool;

use crate::auth::oauth::GoogleOAuthClient;
use crate::auth::service::TokenService;
use crate::config::Config;
use crate::llm_client::LlmClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Token lifecycle over an `Arc<dyn SessionStore>` (Redis in production).
    pub tokens: TokenService,
    pub llm: LlmClient,
    /// Present only when Google credentials are configured.
    pub google: Option<GoogleOAuthClient>,
    pub config: Config,
}

#[cfg(test)]
impl AppState {
    /// State with a lazily connected pool and an in-memory session store.
    /// Handlers that reach the database fail; everything before that works.
    pub fn for_tests(config: Config) -> (Self, std::sync::Arc<crate::auth::store::MemorySessionStore>) {
        let db = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(200))
            .connect_lazy(&config.database_url)
            .expect("lazy pool");
        Self::for_tests_with_pool(config, db)
    }

    /// State over a real (per-test) database and an in-memory session store.
    pub fn for_tests_with_pool(
        config: Config,
        db: PgPool,
    ) -> (Self, std::sync::Arc<crate::auth::store::MemorySessionStore>) {
        use std::sync::Arc;

        use crate::auth::store::MemorySessionStore;
        use crate::auth::tokens::JwtCodec;

        let store = Arc::new(MemorySessionStore::default());
        let tokens = TokenService::new(JwtCodec::new(&config.jwt), store.clone());
        let llm = LlmClient::new(config.llm_api_url.clone(), config.llm_api_key.clone())
            .expect("http client");

        let state = AppState {
            db,
            tokens,
            llm,
            google: None,
            config,
        };
        (state, store)
    }
}
