//! Token lifecycle: issuing, refreshing, authenticating and revoking.
//!
//! The service never touches the database. Member lookups happen in the
//! request extractor once the token itself has been accepted.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::store::SessionStore;
use crate::auth::tokens::{JwtCodec, TokenError, TokenSubject, TokenType, VerifiedToken};
use crate::errors::{AppError, AuthErrorCode};

const OAUTH_STATE_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

#[derive(Clone)]
pub struct TokenService {
    codec: JwtCodec,
    store: Arc<dyn SessionStore>,
}

impl TokenService {
    pub fn new(codec: JwtCodec, store: Arc<dyn SessionStore>) -> Self {
        Self { codec, store }
    }

    pub fn codec(&self) -> &JwtCodec {
        &self.codec
    }

    /// Issues an access/refresh pair and (re)opens the member's session.
    /// A previous refresh token of the same member stops being accepted.
    pub async fn issue(&self, subject: &TokenSubject) -> Result<TokenPair, AppError> {
        let access_token = self.codec.issue(subject, TokenType::Access)?;
        let refresh_token = self.codec.issue(subject, TokenType::Refresh)?;

        let ttl = secs(self.codec.refresh_ttl_secs());
        self.store
            .save_refresh_token(subject.member_id, &refresh_token, ttl)
            .await?;
        self.store
            .open_session(subject.member_id, &refresh_token, ttl)
            .await?;

        info!(member_id = subject.member_id, "Issued token pair");
        Ok(TokenPair {
            access_token,
            refresh_token,
            access_ttl_secs: self.codec.access_ttl_secs(),
            refresh_ttl_secs: self.codec.refresh_ttl_secs(),
        })
    }

    /// Trades a refresh token for a new access token. The refresh token is reused.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<String, AppError> {
        let refresh_token = refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::auth(AuthErrorCode::NoRefreshToken))?;

        let verified = self.verify_refresh(refresh_token)?;

        if self.store.is_revoked(&verified.claims.jti).await? {
            return Err(AppError::auth(AuthErrorCode::InvalidRefreshToken));
        }

        let stored = self.store.refresh_token(verified.member_id).await?;
        if stored.as_deref() != Some(refresh_token) {
            warn!(
                member_id = verified.member_id,
                "Refresh token does not match the stored one"
            );
            return Err(AppError::auth(AuthErrorCode::InvalidRefreshToken));
        }

        let subject = TokenSubject {
            member_id: verified.member_id,
            email: verified.claims.email.clone(),
            role: verified.claims.role,
        };
        let access_token = self.codec.issue(&subject, TokenType::Access)?;

        debug!(member_id = verified.member_id, "Access token refreshed");
        Ok(access_token)
    }

    /// Accepts an access token for a protected request.
    ///
    /// An expired access token is diagnosed against the refresh cookie so the
    /// client learns whether a refresh can succeed.
    pub async fn authenticate(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<VerifiedToken, AppError> {
        let access_token = access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(AppError::unauthorized)?;

        let verified = match self.codec.verify(access_token) {
            Ok(verified) => verified,
            Err(TokenError::Expired) => return Err(self.diagnose_expired(refresh_token).await?),
            Err(TokenError::Invalid(reason)) => {
                debug!("Rejected access token: {reason}");
                return Err(AppError::auth(AuthErrorCode::InvalidToken));
            }
        };

        if self.store.is_revoked(&verified.claims.jti).await? {
            return Err(AppError::auth(AuthErrorCode::TokenBlacklisted));
        }
        if verified.claims.typ != TokenType::Access {
            return Err(AppError::auth(AuthErrorCode::WrongTokenType));
        }
        if !self.store.has_session(verified.member_id).await? {
            return Err(AppError::auth(AuthErrorCode::SessionInvalid));
        }

        Ok(verified)
    }

    /// Picks the failure code for an expired access token.
    async fn diagnose_expired(&self, refresh_token: Option<&str>) -> Result<AppError, AppError> {
        let Some(refresh_token) = refresh_token.filter(|t| !t.is_empty()) else {
            return Ok(AppError::auth(AuthErrorCode::NoRefreshToken));
        };

        let verified = match self.verify_refresh(refresh_token) {
            Ok(verified) => verified,
            Err(err) => return Ok(err),
        };

        if !self.store.has_session(verified.member_id).await? {
            return Ok(AppError::auth(AuthErrorCode::SessionExpired));
        }

        Ok(AppError::auth(AuthErrorCode::AccessTokenExpired))
    }

    fn verify_refresh(&self, refresh_token: &str) -> Result<VerifiedToken, AppError> {
        match self.codec.verify(refresh_token) {
            Ok(verified) if verified.claims.typ == TokenType::Refresh => Ok(verified),
            Ok(_) | Err(TokenError::Invalid(_)) => {
                Err(AppError::auth(AuthErrorCode::InvalidRefreshToken))
            }
            Err(TokenError::Expired) => Err(AppError::auth(AuthErrorCode::RefreshTokenExpired)),
        }
    }

    /// Finds the member a logout request speaks for.
    ///
    /// An access token counts only when [`Self::authenticate`] accepts it. A
    /// refresh token counts only when it is unrevoked and still the member's
    /// stored one. Revoked or superseded tokens identify nobody.
    pub async fn logout_principal(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<Option<i64>, AppError> {
        if let Some(access_token) = access_token.filter(|t| !t.is_empty()) {
            match self.authenticate(Some(access_token), None).await {
                Ok(verified) => return Ok(Some(verified.member_id)),
                Err(AppError::Auth { code, .. }) => {
                    debug!("Access token does not authorize logout: {}", code.as_str());
                }
                Err(other) => return Err(other),
            }
        }

        let Some(refresh_token) = refresh_token.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        let Ok(verified) = self.verify_refresh(refresh_token) else {
            return Ok(None);
        };
        if self.store.is_revoked(&verified.claims.jti).await? {
            return Ok(None);
        }
        let stored = self.store.refresh_token(verified.member_id).await?;
        Ok((stored.as_deref() == Some(refresh_token)).then_some(verified.member_id))
    }

    /// Revokes the presented tokens and drops the member's refresh token and session.
    pub async fn logout(
        &self,
        member_id: i64,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<(), AppError> {
        let now = Utc::now().timestamp();
        for token in [access_token, refresh_token].into_iter().flatten() {
            let Ok(peeked) = self.codec.verify_ignoring_expiry(token) else {
                continue;
            };
            if peeked.member_id != member_id {
                continue;
            }
            if let Some(left) = peeked.claims.remaining_secs(now) {
                self.store
                    .revoke(&peeked.claims.jti, Duration::from_secs(left))
                    .await?;
            }
        }

        self.end_sessions(member_id).await?;
        info!(member_id, "Member logged out");
        Ok(())
    }

    /// Drops the stored refresh token and session. Outstanding access tokens of
    /// the member fail with `SESSION_INVALID` from here on.
    pub async fn end_sessions(&self, member_id: i64) -> Result<(), AppError> {
        self.store.remove_refresh_token(member_id).await?;
        self.store.close_session(member_id).await?;
        Ok(())
    }

    /// Creates a one-shot CSRF state for an OAuth authorization round trip.
    pub async fn begin_oauth(&self) -> Result<String, AppError> {
        let state = Uuid::new_v4().simple().to_string();
        self.store.put_oauth_state(&state, OAUTH_STATE_TTL).await?;
        Ok(state)
    }

    pub async fn finish_oauth(&self, state: &str) -> Result<bool, AppError> {
        if state.is_empty() {
            return Ok(false);
        }
        self.store.take_oauth_state(state).await
    }
}

fn secs(value: i64) -> Duration {
    Duration::from_secs(value.max(0) as u64)
}

#[cfg(test)]
pub(crate) fn test_service() -> (TokenService, Arc<crate::auth::store::MemorySessionStore>) {
    let store = Arc::new(crate::auth::store::MemorySessionStore::default());
    let service = TokenService::new(crate::auth::tokens::test_codec(), store.clone());
    (service, store)
}
