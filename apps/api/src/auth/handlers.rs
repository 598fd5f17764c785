use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::cookies::{self, set_cookies, SetCookies, TokenCookies};
use crate::auth::extractor::{CurrentMember, MaybeMember};
use crate::auth::oauth;
use crate::auth::password::{hash_password_blocking, verify_password_blocking};
use crate::auth::signup::{LoginRequest, SignupRequest};
use crate::auth::tokens::TokenSubject;
use crate::db::is_unique_violation;
use crate::errors::{AppError, AuthErrorCode};
use crate::members::repository::{self, NewMember};
use crate::models::member::{AuthProvider, MemberInfo, MemberRow, Role};
use crate::state::AppState;

const GOOGLE_AUTHORIZATION_PATH: &str = "/oauth2/authorization/google";

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Json<Self> {
        Json(MessageResponse {
            message: message.to_string(),
        })
    }
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub member: MemberInfo,
}

#[derive(Serialize)]
pub struct AuthStatusResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<MemberInfo>,
}

#[derive(Serialize)]
pub struct GoogleLoginGuide {
    pub message: String,
    pub login_url: String,
    pub full_url: String,
    pub note: String,
}

/// Issues tokens for `member` and builds the cookie headers carrying them.
async fn start_session(
    state: &AppState,
    member: &MemberRow,
) -> Result<SetCookies, AppError> {
    let pair = state.tokens.issue(&TokenSubject::from(member)).await?;
    Ok(set_cookies(cookies::token_cookies(&state.config.cookie, &pair)))
}

// ────────────────────────────────────────────────────────────────────────────
// Google OAuth2
// ────────────────────────────────────────────────────────────────────────────

/// GET /auth/login/google
pub async fn handle_google_login_guide(State(state): State<AppState>) -> Json<GoogleLoginGuide> {
    Json(GoogleLoginGuide {
        message: "Open the login URL in a browser to sign in with Google".to_string(),
        login_url: GOOGLE_AUTHORIZATION_PATH.to_string(),
        full_url: format!("{}{GOOGLE_AUTHORIZATION_PATH}", state.config.public_base_url),
        note: "Token cookies are set on the redirect back to the frontend".to_string(),
    })
}

/// GET /oauth2/authorization/google
pub async fn handle_google_authorize(State(state): State<AppState>) -> Result<Redirect, AppError> {
    let google = state.google.as_ref().ok_or(AppError::NotImplemented)?;
    let csrf_state = state.tokens.begin_oauth().await?;
    let url = google
        .authorization_url(&csrf_state)
        .map_err(|e| AppError::Internal(e.into()))?;
    Ok(Redirect::to(url.as_str()))
}

#[derive(Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// GET /login/oauth2/code/google
///
/// Always answers with a redirect to the frontend callback page.
pub async fn handle_google_callback(
    State(state): State<AppState>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<Response, AppError> {
    if state.google.is_none() {
        return Err(AppError::NotImplemented);
    }
    let callback = format!("{}/auth/callback", state.config.frontend_url);

    match complete_google_login(&state, &query).await {
        Ok(cookies) => {
            Ok((cookies, Redirect::to(&format!("{callback}?success=true"))).into_response())
        }
        Err(e) => {
            warn!("Google login failed: {e}");
            Ok(Redirect::to(&format!("{callback}?error=true")).into_response())
        }
    }
}

async fn complete_google_login(
    state: &AppState,
    query: &OAuthCallbackQuery,
) -> Result<SetCookies, AppError> {
    if let Some(error) = &query.error {
        return Err(AppError::Validation(format!("Google returned error '{error}'")));
    }
    let csrf_state = query.state.as_deref().unwrap_or_default();
    if !state.tokens.finish_oauth(csrf_state).await? {
        return Err(AppError::Validation("Unknown or reused OAuth state".to_string()));
    }
    let code = query
        .code
        .as_deref()
        .ok_or_else(|| AppError::Validation("Missing authorization code".to_string()))?;

    let google = state.google.as_ref().ok_or(AppError::NotImplemented)?;
    let profile = google
        .fetch_profile(code)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    let member = oauth::find_or_create_member(&state.db, &profile).await?;
    info!(member_id = member.member_id, "Google login succeeded");
    start_session(state, &member).await
}

// ────────────────────────────────────────────────────────────────────────────
// Session endpoints
// ────────────────────────────────────────────────────────────────────────────

/// GET /auth/me
pub async fn handle_me(CurrentMember(member): CurrentMember) -> Json<MemberInfo> {
    Json(MemberInfo::from(&member))
}

/// GET /auth/status
pub async fn handle_status(MaybeMember(member): MaybeMember) -> Json<AuthStatusResponse> {
    Json(AuthStatusResponse {
        authenticated: member.is_some(),
        member: member.as_ref().map(MemberInfo::from),
    })
}

/// POST /auth/refresh
pub async fn handle_refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(SetCookies, Json<MessageResponse>), AppError> {
    let presented = TokenCookies::from_headers(&headers);
    let access_token = state
        .tokens
        .refresh(presented.refresh.as_deref())
        .await
        .map_err(|e| {
            e.with_cleared_cookies(|| cookies::expired_token_cookies(&state.config.cookie))
        })?;

    let access = cookies::build_cookie(
        &state.config.cookie,
        cookies::ACCESS_TOKEN_COOKIE,
        &access_token,
        state.tokens.codec().access_ttl_secs(),
    );
    Ok((
        set_cookies(vec![access]),
        MessageResponse::new("Token refreshed successfully"),
    ))
}

/// POST /auth/logout
///
/// The cookies are cleared either way. Server-side state is only touched when a
/// presented token still carries authority for its member.
pub async fn handle_logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(SetCookies, Json<MessageResponse>), AppError> {
    let presented = TokenCookies::from_headers(&headers);
    let access = presented.access.as_deref();
    let refresh = presented.refresh.as_deref();

    match state.tokens.logout_principal(access, refresh).await? {
        Some(member_id) => state.tokens.logout(member_id, access, refresh).await?,
        None => debug!("Logout without a usable token; only clearing cookies"),
    }

    Ok((
        set_cookies(cookies::expired_token_cookies(&state.config.cookie)),
        MessageResponse::new("Logged out successfully"),
    ))
}

// ────────────────────────────────────────────────────────────────────────────
// Password accounts
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/auth/signup
pub async fn handle_signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<MemberInfo>), AppError> {
    if let Some(errors) = req.validate() {
        return Err(AppError::InvalidFields(errors));
    }
    let email = req.email.trim().to_lowercase();
    if repository::exists_by_email(&state.db, &email).await? {
        return Err(AppError::EmailAlreadyExists(email));
    }

    let password_hash = hash_password_blocking(req.password).await?;
    let member = repository::insert(
        &state.db,
        NewMember {
            google_id: None,
            email: &email,
            name: req.nickname.trim(),
            picture: None,
            phone: Some(req.phone.trim()),
            password_hash: Some(&password_hash),
            provider: AuthProvider::Local,
            role: Role::User,
        },
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::EmailAlreadyExists(email.clone())
        } else {
            AppError::Database(e)
        }
    })?;

    info!(member_id = member.member_id, "Member signed up");
    Ok((StatusCode::CREATED, Json(MemberInfo::from(&member))))
}

/// POST /api/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<(SetCookies, Json<LoginResponse>), AppError> {
    let email = req.email.trim().to_lowercase();
    let member = repository::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| AppError::auth(AuthErrorCode::InvalidCredentials))?;

    let Some(stored_hash) = member.password_hash.clone() else {
        return Err(AppError::auth(AuthErrorCode::InvalidCredentials));
    };
    if !verify_password_blocking(req.password, stored_hash).await {
        return Err(AppError::auth(AuthErrorCode::InvalidCredentials));
    }
    if !member.is_active() {
        return Err(AppError::auth(AuthErrorCode::UserDeactivated));
    }

    let cookies = start_session(&state, &member).await?;
    repository::touch_last_login(&state.db, member.member_id).await?;
    info!(member_id = member.member_id, "Password login succeeded");

    Ok((
        cookies,
        Json(LoginResponse {
            message: "Login successful".to_string(),
            member: MemberInfo::from(&member),
        }),
    ))
}

// ────────────────────────────────────────────────────────────────────────────
// Development logins
// ────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct TestLoginQuery {
    pub email: Option<String>,
    pub name: Option<String>,
}

fn dev_login_enabled(state: &AppState) -> Result<(), AppError> {
    if state.config.enable_dev_login {
        Ok(())
    } else {
        Err(AppError::NotFound("Development login is disabled".to_string()))
    }
}

async fn dev_login(
    state: &AppState,
    email: &str,
    name: &str,
    role: Role,
) -> Result<(SetCookies, Json<LoginResponse>), AppError> {
    let member = repository::upsert_dev_member(&state.db, email, name, role).await?;
    let cookies = start_session(state, &member).await?;
    info!(member_id = member.member_id, role = role.as_str(), "Development login");
    Ok((
        cookies,
        Json(LoginResponse {
            message: "Test login successful".to_string(),
            member: MemberInfo::from(&member),
        }),
    ))
}

/// POST /auth/test-login
pub async fn handle_test_login(
    State(state): State<AppState>,
    Query(query): Query<TestLoginQuery>,
) -> Result<(SetCookies, Json<LoginResponse>), AppError> {
    dev_login_enabled(&state)?;
    let email = query.email.as_deref().unwrap_or("test@example.com");
    let name = query.name.as_deref().unwrap_or("Test User");
    dev_login(&state, email, name, Role::User).await
}

/// Fixed development accounts behind `/auth/quick-login/:kind`.
fn quick_login_account(kind: &str) -> Option<(&'static str, &'static str, Role)> {
    match kind {
        "user" => Some(("user@test.com", "Test User", Role::User)),
        "admin" => Some(("admin@test.com", "Test Admin", Role::Admin)),
        "expert" => Some(("root@test.com", "Test Expert", Role::Root)),
        _ => None,
    }
}

/// POST /auth/quick-login/:kind
pub async fn handle_quick_login(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<(SetCookies, Json<LoginResponse>), AppError> {
    dev_login_enabled(&state)?;
    let (email, name, role) = quick_login_account(&kind)
        .ok_or_else(|| AppError::NotFound(format!("Unknown quick login '{kind}'")))?;
    dev_login(&state, email, name, role).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quick_login_accounts() {
        assert_eq!(quick_login_account("user").unwrap().2, Role::User);
        assert_eq!(quick_login_account("admin").unwrap().2, Role::Admin);
        let (email, _, role) = quick_login_account("expert").unwrap();
        assert_eq!(email, "root@test.com");
        assert_eq!(role, Role::Root);
        assert!(quick_login_account("superuser").is_none());
    }

    mod with_database {
        use axum::http::{Method, StatusCode};
        use serde_json::{json, Value};
        use sqlx::PgPool;

        use crate::auth::store::SessionStore;
        use crate::config::Config;
        use crate::members::repository;
        use crate::models::member::{MemberStatus, Role};
        use crate::routes::build_router;
        use crate::state::AppState;
        use crate::test_utils::{create_test_member, send};

        fn signup_body(email: &str) -> Value {
            json!({
                "nickname": "Jamie",
                "email": email,
                "password": "Passw0rd!",
                "phone": "010-1234-5678"
            })
        }

        #[sqlx::test]
        async fn test_signup_then_duplicate_email_conflicts(pool: PgPool) {
            let (state, _) = AppState::for_tests_with_pool(Config::for_tests(), pool);
            let router = build_router(state);

            let created = send(&router, Method::POST, "/api/auth/signup", None, Some(signup_body("Jamie@Example.com"))).await;
            assert_eq!(created.status, StatusCode::CREATED);
            assert_eq!(created.body["email"], "jamie@example.com");
            assert_eq!(created.body["role"], "USER");

            let duplicate = send(&router, Method::POST, "/api/auth/signup", None, Some(signup_body("jamie@example.com"))).await;
            assert_eq!(duplicate.status, StatusCode::CONFLICT);
            assert_eq!(duplicate.error_code(), "EMAIL_ALREADY_EXISTS");
        }

        #[sqlx::test]
        async fn test_signup_reports_every_invalid_field(pool: PgPool) {
            let (state, _) = AppState::for_tests_with_pool(Config::for_tests(), pool);
            let body = json!({"nickname": " ", "email": "nope", "password": "short", "phone": "12"});

            let response = send(&build_router(state), Method::POST, "/api/auth/signup", None, Some(body)).await;
            assert_eq!(response.status, StatusCode::BAD_REQUEST);
            let errors = response.body["errors"].as_object().unwrap();
            for field in ["nickname", "email", "password", "phone"] {
                assert!(errors.contains_key(field), "missing {field}");
            }
        }

        #[sqlx::test]
        async fn test_login_sets_cookies_and_rejects_bad_credentials(pool: PgPool) {
            let (state, store) = AppState::for_tests_with_pool(Config::for_tests(), pool.clone());
            let router = build_router(state);
            send(&router, Method::POST, "/api/auth/signup", None, Some(signup_body("jamie@example.com"))).await;

            let ok = send(
                &router,
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "jamie@example.com", "password": "Passw0rd!"})),
            )
            .await;
            assert_eq!(ok.status, StatusCode::OK);
            assert_eq!(ok.cookies.len(), 2);
            let member_id = ok.body["member"]["member_id"].as_i64().unwrap();
            let member = repository::find_by_id(&pool, member_id).await.unwrap().unwrap();
            assert!(member.last_login_at.is_some());
            assert!(store.has_session(member_id).await.unwrap());

            let wrong_password = send(
                &router,
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "jamie@example.com", "password": "Wr0ngpass!"})),
            )
            .await;
            assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
            assert_eq!(wrong_password.error_code(), "INVALID_CREDENTIALS");

            let unknown = send(
                &router,
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "nobody@example.com", "password": "Passw0rd!"})),
            )
            .await;
            assert_eq!(unknown.error_code(), "INVALID_CREDENTIALS");
        }

        #[sqlx::test]
        async fn test_login_without_password_or_while_suspended(pool: PgPool) {
            let (state, _) = AppState::for_tests_with_pool(Config::for_tests(), pool.clone());
            let router = build_router(state);
            create_test_member(&pool, "google@example.com", Role::User, MemberStatus::Active).await;

            let google_only = send(
                &router,
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "google@example.com", "password": "Passw0rd!"})),
            )
            .await;
            assert_eq!(google_only.error_code(), "INVALID_CREDENTIALS");

            let created = send(&router, Method::POST, "/api/auth/signup", None, Some(signup_body("jamie@example.com"))).await;
            let member_id = created.body["member_id"].as_i64().unwrap();
            repository::set_status(&pool, member_id, MemberStatus::Suspended).await.unwrap();

            let suspended = send(
                &router,
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "jamie@example.com", "password": "Passw0rd!"})),
            )
            .await;
            assert_eq!(suspended.status, StatusCode::UNAUTHORIZED);
            assert_eq!(suspended.error_code(), "USER_DEACTIVATED");
            assert!(suspended.cookies.is_empty());
        }

        #[sqlx::test]
        async fn test_dev_logins_create_members_when_enabled(pool: PgPool) {
            let mut config = Config::for_tests();
            config.enable_dev_login = true;
            let (state, _) = AppState::for_tests_with_pool(config, pool.clone());
            let router = build_router(state);

            let admin = send(&router, Method::POST, "/auth/quick-login/admin", None, None).await;
            assert_eq!(admin.status, StatusCode::OK);
            assert_eq!(admin.cookies.len(), 2);
            assert_eq!(admin.body["member"]["role"], "ADMIN");

            let tester = send(&router, Method::POST, "/auth/test-login?email=qa@example.com", None, None).await;
            assert_eq!(tester.body["member"]["email"], "qa@example.com");
            assert_eq!(tester.body["member"]["name"], "Test User");

            let again = send(&router, Method::POST, "/auth/test-login?email=qa@example.com&name=QA", None, None).await;
            assert_eq!(again.body["member"]["member_id"], tester.body["member"]["member_id"]);
            assert_eq!(again.body["member"]["name"], "QA");

            let unknown = send(&router, Method::POST, "/auth/quick-login/superuser", None, None).await;
            assert_eq!(unknown.status, StatusCode::NOT_FOUND);
        }
    }
}
