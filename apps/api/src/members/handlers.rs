use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::auth::cookies::{self, set_cookies, SetCookies, TokenCookies};
use crate::auth::extractor::{AdminMember, CurrentMember};
use crate::auth::handlers::MessageResponse;
use crate::errors::AppError;
use crate::members::repository;
use crate::models::member::{MemberInfo, MemberStatus, Role};
use crate::state::AppState;

const MAX_NAME_LEN: usize = 50;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub status: MemberStatus,
}

#[derive(Debug, Deserialize)]
pub struct RoleChangeRequest {
    pub role: Role,
}

/// GET /api/v1/members/me
pub async fn handle_get_me(CurrentMember(member): CurrentMember) -> Json<MemberInfo> {
    Json(MemberInfo::from(&member))
}

/// PATCH /api/v1/members/me
pub async fn handle_update_me(
    State(state): State<AppState>,
    CurrentMember(member): CurrentMember,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<MemberInfo>, AppError> {
    let name = req.name.as_deref().map(str::trim);
    if let Some(name) = name {
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(AppError::Validation(format!(
                "name must be 1 to {MAX_NAME_LEN} characters"
            )));
        }
    }

    let updated = repository::update_profile(
        &state.db,
        member.member_id,
        name,
        req.picture.as_deref(),
    )
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Member {} not found", member.member_id)))?;

    Ok(Json(MemberInfo::from(&updated)))
}

/// DELETE /api/v1/members/me
///
/// Deactivates the account and ends every session of the member.
pub async fn handle_deactivate_me(
    State(state): State<AppState>,
    CurrentMember(member): CurrentMember,
    headers: HeaderMap,
) -> Result<(SetCookies, Json<MessageResponse>), AppError> {
    repository::set_status(&state.db, member.member_id, MemberStatus::Inactive).await?;

    let presented = TokenCookies::from_headers(&headers);
    state
        .tokens
        .logout(
            member.member_id,
            presented.access.as_deref(),
            presented.refresh.as_deref(),
        )
        .await?;

    info!(member_id = member.member_id, "Member deactivated their account");
    Ok((
        set_cookies(cookies::expired_token_cookies(&state.config.cookie)),
        Json(MessageResponse {
            message: "Account deactivated".to_string(),
        }),
    ))
}

/// PATCH /api/v1/admin/members/:id/status
pub async fn handle_change_status(
    State(state): State<AppState>,
    AdminMember(admin): AdminMember,
    Path(member_id): Path<i64>,
    Json(req): Json<StatusChangeRequest>,
) -> Result<Json<MemberInfo>, AppError> {
    if member_id == admin.member_id && req.status != MemberStatus::Active {
        return Err(AppError::Validation(
            "Administrators cannot deactivate themselves".to_string(),
        ));
    }
    let target = repository::find_by_id(&state.db, member_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member {member_id} not found")))?;
    if target.role() > admin.role() {
        return Err(AppError::Forbidden);
    }

    let updated = repository::set_status(&state.db, member_id, req.status)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member {member_id} not found")))?;
    if req.status != MemberStatus::Active {
        state.tokens.end_sessions(member_id).await?;
    }

    info!(
        admin_id = admin.member_id,
        member_id,
        status = req.status.as_str(),
        "Member status changed"
    );
    Ok(Json(MemberInfo::from(&updated)))
}

/// PATCH /api/v1/admin/members/:id/role
pub async fn handle_change_role(
    State(state): State<AppState>,
    AdminMember(admin): AdminMember,
    Path(member_id): Path<i64>,
    Json(req): Json<RoleChangeRequest>,
) -> Result<Json<MemberInfo>, AppError> {
    if !can_assign_role(admin.role(), req.role) {
        return Err(AppError::Forbidden);
    }
    let target = repository::find_by_id(&state.db, member_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member {member_id} not found")))?;
    if target.role() > admin.role() {
        return Err(AppError::Forbidden);
    }

    let updated = repository::set_role(&state.db, member_id, req.role)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member {member_id} not found")))?;

    info!(
        admin_id = admin.member_id,
        member_id,
        role = req.role.as_str(),
        "Member role changed"
    );
    Ok(Json(MemberInfo::from(&updated)))
}

/// Only ROOT may hand out ROOT.
fn can_assign_role(actor: Role, target: Role) -> bool {
    actor.is_admin() && (target != Role::Root || actor == Role::Root)
}
