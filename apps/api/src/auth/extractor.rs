//! Request extractors that resolve the calling member from token cookies.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::auth::cookies::{self, TokenCookies};
use crate::errors::{AppError, AuthErrorCode};
use crate::members::repository;
use crate::models::member::MemberRow;
use crate::state::AppState;

/// An authenticated, active member. Rejects with the matching auth error code.
#[derive(Debug, Clone)]
pub struct CurrentMember(pub MemberRow);

/// Like [`CurrentMember`] but any authentication failure yields `None`.
#[derive(Debug, Clone)]
pub struct MaybeMember(pub Option<MemberRow>);

/// A member holding the ADMIN or ROOT role.
#[derive(Debug, Clone)]
pub struct AdminMember(pub MemberRow);

#[async_trait]
impl FromRequestParts<AppState> for CurrentMember {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let presented = TokenCookies::from_headers(&parts.headers);
        resolve_member(state, &presented)
            .await
            .map(CurrentMember)
            .map_err(|e| e.with_cleared_cookies(|| cookies::expired_token_cookies(&state.config.cookie)))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeMember {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let presented = TokenCookies::from_headers(&parts.headers);
        match resolve_member(state, &presented).await {
            Ok(member) => Ok(MaybeMember(Some(member))),
            Err(AppError::Auth { .. }) => Ok(MaybeMember(None)),
            Err(other) => Err(other),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminMember {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentMember(member) = CurrentMember::from_request_parts(parts, state).await?;
        if !member.role().is_admin() {
            return Err(AppError::Forbidden);
        }
        Ok(AdminMember(member))
    }
}

async fn resolve_member(state: &AppState, presented: &TokenCookies) -> Result<MemberRow, AppError> {
    let verified = state
        .tokens
        .authenticate(presented.access.as_deref(), presented.refresh.as_deref())
        .await?;

    let member = repository::find_by_id(&state.db, verified.member_id)
        .await?
        .ok_or_else(|| AppError::auth(AuthErrorCode::UserNotFound))?;

    if !member.is_active() {
        return Err(AppError::auth(AuthErrorCode::UserDeactivated));
    }

    Ok(member)
}
