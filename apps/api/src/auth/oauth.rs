//! Google OAuth2 authorization-code flow: consent redirect, code exchange and
//! userinfo lookup, plus the find-or-create step that turns a Google profile
//! into a member.

use reqwest::{Client, Url};
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

use crate::config::GoogleConfig;
use crate::db::is_unique_violation;
use crate::errors::{AppError, AuthErrorCode};
use crate::members::repository::{self, NewMember};
use crate::models::member::{AuthProvider, MemberRow, MemberStatus, Role};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const SCOPES: &str = "openid email profile";

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Google returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Profile fields read from Google's userinfo endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Clone)]
pub struct GoogleOAuthClient {
    client: Client,
    config: GoogleConfig,
    auth_url: String,
    token_url: String,
    userinfo_url: String,
}

impl GoogleOAuthClient {
    pub fn new(config: GoogleConfig) -> Result<Self, OAuthError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()?,
            config,
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
        })
    }

    /// Points the token and userinfo calls at another host.
    #[cfg(test)]
    pub fn with_endpoints(mut self, token_url: String, userinfo_url: String) -> Self {
        self.token_url = token_url;
        self.userinfo_url = userinfo_url;
        self
    }

    pub fn authorization_url(&self, state: &str) -> Result<Url, OAuthError> {
        Ok(Url::parse_with_params(
            &self.auth_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("state", state),
                ("prompt", "select_account"),
            ],
        )?)
    }

    /// Exchanges an authorization code and fetches the signed-in user's profile.
    pub async fn fetch_profile(&self, code: &str) -> Result<GoogleProfile, OAuthError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;
        let token: TokenResponse = read_json(response).await?;

        let response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await?;
        read_json(response).await
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, OAuthError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(OAuthError::Provider {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json().await?)
}

/// Finds the member for a Google profile, creating one on first login.
///
/// An existing local account with the same verified email is linked. A
/// suspended member is refused.
pub async fn find_or_create_member(
    db: &PgPool,
    profile: &GoogleProfile,
) -> Result<MemberRow, AppError> {
    let name = profile
        .name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(&profile.email);

    let existing = match repository::find_by_google_id(db, &profile.sub).await? {
        Some(member) => Some(member),
        None if profile.email_verified => repository::find_by_email(db, &profile.email).await?,
        None => None,
    };

    if let Some(member) = existing {
        if member.status() == MemberStatus::Suspended {
            return Err(AppError::auth(AuthErrorCode::UserDeactivated));
        }
        let was_inactive = member.status() == MemberStatus::Inactive;
        let member = repository::record_google_login(
            db,
            member.member_id,
            &profile.sub,
            name,
            profile.picture.as_deref(),
        )
        .await?;
        if was_inactive {
            info!(member_id = member.member_id, "Reactivated member on Google login");
        }
        return Ok(member);
    }

    let created = repository::insert(
        db,
        NewMember {
            google_id: Some(&profile.sub),
            email: &profile.email,
            name,
            picture: profile.picture.as_deref(),
            phone: None,
            password_hash: None,
            provider: AuthProvider::Google,
            role: Role::User,
        },
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::EmailAlreadyExists(profile.email.clone())
        } else {
            AppError::Database(e)
        }
    })?;

    info!(member_id = created.member_id, "Created member from Google login");
    Ok(created)
}
