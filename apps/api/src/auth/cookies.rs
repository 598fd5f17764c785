use axum::http::{header, HeaderMap, HeaderName};
use axum::response::AppendHeaders;

use crate::auth::service::TokenPair;
use crate::config::CookieConfig;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

pub type SetCookies = AppendHeaders<Vec<(HeaderName, String)>>;

/// Wraps `Set-Cookie` values so handlers can return them alongside a body.
pub fn set_cookies(cookies: Vec<String>) -> SetCookies {
    AppendHeaders(
        cookies
            .into_iter()
            .map(|cookie| (header::SET_COOKIE, cookie))
            .collect(),
    )
}

pub fn build_cookie(config: &CookieConfig, name: &str, value: &str, max_age_secs: i64) -> String {
    let mut cookie = format!(
        "{name}={value}; Path=/; Max-Age={}; HttpOnly; SameSite={}",
        max_age_secs.max(0),
        config.same_site
    );
    if let Some(domain) = &config.domain {
        cookie.push_str("; Domain=");
        cookie.push_str(domain);
    }
    if config.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn expired_cookie(config: &CookieConfig, name: &str) -> String {
    build_cookie(config, name, "", 0)
}

pub fn token_cookies(config: &CookieConfig, pair: &TokenPair) -> Vec<String> {
    vec![
        build_cookie(
            config,
            ACCESS_TOKEN_COOKIE,
            &pair.access_token,
            pair.access_ttl_secs,
        ),
        build_cookie(
            config,
            REFRESH_TOKEN_COOKIE,
            &pair.refresh_token,
            pair.refresh_ttl_secs,
        ),
    ]
}

pub fn expired_token_cookies(config: &CookieConfig) -> Vec<String> {
    vec![
        expired_cookie(config, ACCESS_TOKEN_COOKIE),
        expired_cookie(config, REFRESH_TOKEN_COOKIE),
    ]
}

/// Token cookies presented by the client.
#[derive(Debug, Default, Clone)]
pub struct TokenCookies {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

impl TokenCookies {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        TokenCookies {
            access: read_cookie(headers, ACCESS_TOKEN_COOKIE),
            refresh: read_cookie(headers, REFRESH_TOKEN_COOKIE),
        }
    }
}

/// Finds a cookie by name across every `Cookie` header. Empty values count as absent.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
