use anyhow::{bail, Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt: JwtConfig,
    pub redis_keys: RedisKeys,
    pub cookie: CookieConfig,
    pub llm_api_url: String,
    pub llm_api_key: String,
    pub frontend_url: String,
    /// Externally visible origin of this API.
    pub public_base_url: String,
    /// `None` disables the Google login routes.
    pub google: Option<GoogleConfig>,
    /// Enables `/auth/test-login` and `/auth/quick-login/*`.
    pub enable_dev_login: bool,
    pub port: u16,
    pub rust_log: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

/// Key prefixes for everything the token service keeps in Redis.
#[derive(Debug, Clone)]
pub struct RedisKeys {
    pub refresh_token: String,
    pub blacklist: String,
    pub user_session: String,
    pub oauth_state: String,
}

impl Default for RedisKeys {
    fn default() -> Self {
        Self {
            refresh_token: "refresh_token:".to_string(),
            blacklist: "blacklist:".to_string(),
            user_session: "user_session:".to_string(),
            oauth_state: "oauth_state:".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub domain: Option<String>,
    pub secure: bool,
    pub same_site: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            domain: None,
            secure: false,
            same_site: "Lax".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

const MIN_JWT_SECRET_LEN: usize = 32;

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let secret = require_env("JWT_SECRET")?;
        if secret.len() < MIN_JWT_SECRET_LEN {
            bail!("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes long");
        }

        let defaults = RedisKeys::default();
        let redis_keys = RedisKeys {
            refresh_token: env_or("REDIS_KEY_REFRESH_TOKEN", &defaults.refresh_token),
            blacklist: env_or("REDIS_KEY_BLACKLIST", &defaults.blacklist),
            user_session: env_or("REDIS_KEY_USER_SESSION", &defaults.user_session),
            oauth_state: defaults.oauth_state,
        };

        let cookie = CookieConfig {
            domain: std::env::var("COOKIE_DOMAIN").ok().filter(|d| !d.trim().is_empty()),
            secure: parse_env("COOKIE_SECURE", false)?,
            same_site: env_or("COOKIE_SAME_SITE", "Lax"),
        };

        let public_base_url = env_or("PUBLIC_BASE_URL", "http://localhost:8080");
        let google = match (
            std::env::var("GOOGLE_CLIENT_ID").ok(),
            std::env::var("GOOGLE_CLIENT_SECRET").ok(),
        ) {
            (Some(client_id), Some(client_secret)) => Some(GoogleConfig {
                client_id,
                client_secret,
                redirect_uri: env_or(
                    "GOOGLE_REDIRECT_URI",
                    &format!("{public_base_url}/login/oauth2/code/google"),
                ),
            }),
            _ => None,
        };

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            jwt: JwtConfig {
                secret,
                access_ttl_secs: parse_env("JWT_ACCESS_TOKEN_TTL_SECS", 1800)?,
                refresh_ttl_secs: parse_env("JWT_REFRESH_TOKEN_TTL_SECS", 14 * 24 * 3600)?,
            },
            redis_keys,
            cookie,
            llm_api_url: require_env("LLM_API_URL")?,
            llm_api_key: require_env("LLM_API_KEY")?,
            frontend_url: env_or("FRONTEND_URL", "http://localhost:3000"),
            public_base_url,
            google,
            enable_dev_login: parse_env("ENABLE_DEV_LOGIN", false)?,
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// Config used by handler tests; never touches the environment.
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/cvmento_test".to_string(),
            redis_url: "redis://localhost".to_string(),
            jwt: JwtConfig {
                secret: "test-secret-that-is-long-enough-for-hs256".to_string(),
                access_ttl_secs: 1800,
                refresh_ttl_secs: 14 * 24 * 3600,
            },
            redis_keys: RedisKeys::default(),
            cookie: CookieConfig::default(),
            llm_api_url: "http://localhost:9".to_string(),
            llm_api_key: "test-key".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            public_base_url: "http://localhost:8080".to_string(),
            google: None,
            enable_dev_login: false,
            port: 8080,
            rust_log: "debug".to_string(),
        }
    }
}
