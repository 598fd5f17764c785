//! Helpers shared by the database-backed handler tests.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;

use crate::auth::tokens::TokenSubject;
use crate::members::repository::{self, NewMember};
use crate::models::member::{AuthProvider, MemberRow, MemberStatus, Role};
use crate::state::AppState;

/// Inserts a Google-provider member with the given role and status.
pub async fn create_test_member(
    pool: &PgPool,
    email: &str,
    role: Role,
    status: MemberStatus,
) -> MemberRow {
    let google_id = format!("google-{email}");
    let member = repository::insert(
        pool,
        NewMember {
            google_id: Some(&google_id),
            email,
            name: "Test Member",
            picture: None,
            phone: None,
            password_hash: None,
            provider: AuthProvider::Google,
            role,
        },
    )
    .await
    .expect("insert member");

    if status == MemberStatus::Active {
        return member;
    }
    repository::set_status(pool, member.member_id, status)
        .await
        .expect("set status")
        .expect("member exists")
}

/// Issues tokens for `member` and returns them as a `Cookie` header value.
pub async fn auth_cookie(state: &AppState, member: &MemberRow) -> String {
    let pair = state
        .tokens
        .issue(&TokenSubject::from(member))
        .await
        .expect("issue tokens");
    format!(
        "accessToken={}; refreshToken={}",
        pair.access_token, pair.refresh_token
    )
}

pub struct TestResponse {
    pub status: StatusCode,
    pub cookies: Vec<String>,
    pub body: Value,
}

impl TestResponse {
    pub fn error_code(&self) -> &str {
        self.body["error"]["code"].as_str().unwrap_or_default()
    }
}

/// Sends one request through the router; an empty body decodes as `null`.
pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let cookies = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };

    TestResponse {
        status,
        cookies,
        body,
    }
}
