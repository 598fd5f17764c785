pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::auth::handlers as auth;
use crate::cover_letters::handlers as cover_letters;
use crate::members::handlers as members;
use crate::resumes::handlers as resumes;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Google OAuth2
        .route("/auth/login/google", get(auth::handle_google_login_guide))
        .route(
            "/oauth2/authorization/google",
            get(auth::handle_google_authorize),
        )
        .route(
            "/login/oauth2/code/google",
            get(auth::handle_google_callback),
        )
        // Session
        .route("/auth/me", get(auth::handle_me))
        .route("/auth/status", get(auth::handle_status))
        .route("/auth/refresh", post(auth::handle_refresh))
        .route("/auth/logout", post(auth::handle_logout))
        .route("/auth/test-login", post(auth::handle_test_login))
        .route("/auth/quick-login/:kind", post(auth::handle_quick_login))
        // Password accounts
        .route("/api/auth/signup", post(auth::handle_signup))
        .route("/api/auth/login", post(auth::handle_login))
        // Members
        .route(
            "/api/v1/members/me",
            get(members::handle_get_me)
                .patch(members::handle_update_me)
                .delete(members::handle_deactivate_me),
        )
        .route(
            "/api/v1/admin/members/:id/status",
            patch(members::handle_change_status),
        )
        .route(
            "/api/v1/admin/members/:id/role",
            patch(members::handle_change_role),
        )
        // Resumes
        .route(
            "/api/v1/resumes",
            get(resumes::handle_list).post(resumes::handle_create),
        )
        .route(
            "/api/v1/resumes/:id",
            get(resumes::handle_get)
                .put(resumes::handle_update)
                .delete(resumes::handle_delete),
        )
        // Cover letters
        .route(
            "/api/v1/cover-letters",
            get(cover_letters::handle_list).post(cover_letters::handle_create),
        )
        .route(
            "/api/v1/cover-letters/ai-improve",
            post(cover_letters::handle_ai_improve),
        )
        .route(
            "/api/v1/cover-letters/:id",
            get(cover_letters::handle_get)
                .put(cover_letters::handle_update)
                .delete(cover_letters::handle_delete),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::auth::store::SessionStore;
    use crate::auth::tokens::{expired_token, test_subject, TokenType};
    use crate::config::Config;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    fn request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _) = AppState::for_tests(Config::for_tests());
        let response = build_router(state)
            .oneshot(request("GET", "/health", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "cvmento-api");
    }

    #[tokio::test]
    async fn test_protected_route_without_cookie_is_unauthorized() {
        let (state, _) = AppState::for_tests(Config::for_tests());
        let response = build_router(state)
            .oneshot(request("GET", "/api/v1/resumes", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
        assert_eq!(body["error"]["can_retry"], false);
    }

    #[tokio::test]
    async fn test_expired_access_token_asks_for_refresh() {
        let (state, _) = AppState::for_tests(Config::for_tests());
        let pair = state.tokens.issue(&test_subject(5)).await.unwrap();
        let expired = expired_token(state.tokens.codec(), 5, TokenType::Access, 60);
        let cookie = format!("accessToken={expired}; refreshToken={}", pair.refresh_token);

        let response = build_router(state)
            .oneshot(request("GET", "/auth/me", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookies(&response).is_empty());

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "ACCESS_TOKEN_EXPIRED");
        assert_eq!(body["error"]["can_retry"], true);
    }

    #[tokio::test]
    async fn test_refresh_sets_new_access_cookie() {
        let (state, _) = AppState::for_tests(Config::for_tests());
        let pair = state.tokens.issue(&test_subject(5)).await.unwrap();
        let cookie = format!("refreshToken={}", pair.refresh_token);

        let response = build_router(state)
            .oneshot(request("POST", "/auth/refresh", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with("accessToken="));
        assert!(cookies[0].contains("HttpOnly"));

        let body = body_json(response).await;
        assert_eq!(body["message"], "Token refreshed successfully");
    }

    #[tokio::test]
    async fn test_refresh_without_cookie_clears_cookies() {
        let (state, _) = AppState::for_tests(Config::for_tests());
        let response = build_router(state)
            .oneshot(request("POST", "/auth/refresh", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(set_cookies(&response).len(), 2);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "NO_REFRESH_TOKEN");
    }

    #[tokio::test]
    async fn test_logout_clears_cookies_and_revokes_refresh() {
        let (state, _) = AppState::for_tests(Config::for_tests());
        let pair = state.tokens.issue(&test_subject(9)).await.unwrap();
        let cookie = format!(
            "accessToken={}; refreshToken={}",
            pair.access_token, pair.refresh_token
        );
        let router = build_router(state);

        let response = router
            .clone()
            .oneshot(request("POST", "/auth/logout", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));

        let refresh_cookie = format!("refreshToken={}", pair.refresh_token);
        let response = router
            .oneshot(request("POST", "/auth/refresh", Some(&refresh_cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INVALID_REFRESH_TOKEN");
    }

    #[tokio::test]
    async fn test_logout_replay_keeps_the_next_session() {
        let (state, store) = AppState::for_tests(Config::for_tests());
        let tokens = state.tokens.clone();
        let router = build_router(state);

        let old = tokens.issue(&test_subject(21)).await.unwrap();
        let old_cookie = format!(
            "accessToken={}; refreshToken={}",
            old.access_token, old.refresh_token
        );
        let response = router
            .clone()
            .oneshot(request("POST", "/auth/logout", Some(&old_cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let fresh = tokens.issue(&test_subject(21)).await.unwrap();
        let response = router
            .oneshot(request("POST", "/auth/logout", Some(&old_cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(set_cookies(&response).len(), 2);

        assert!(store.has_session(21).await.unwrap());
        assert!(tokens
            .authenticate(Some(&fresh.access_token), None)
            .await
            .is_ok());
        assert!(tokens.refresh(Some(&fresh.refresh_token)).await.is_ok());
    }

    #[tokio::test]
    async fn test_logout_without_cookies_still_succeeds() {
        let (state, _) = AppState::for_tests(Config::for_tests());
        let response = build_router(state)
            .oneshot(request("POST", "/auth/logout", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(set_cookies(&response).len(), 2);
    }

    #[tokio::test]
    async fn test_status_reports_unauthenticated_for_bad_token() {
        let (state, _) = AppState::for_tests(Config::for_tests());
        let response = build_router(state)
            .oneshot(request("GET", "/auth/status", Some("accessToken=garbage")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["authenticated"], false);
        assert!(body.get("member").is_none());
    }

    #[tokio::test]
    async fn test_dev_login_disabled_is_not_found() {
        let (state, _) = AppState::for_tests(Config::for_tests());
        let router = build_router(state);

        for uri in ["/auth/test-login", "/auth/quick-login/admin"] {
            let response = router
                .clone()
                .oneshot(request("POST", uri, None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_google_routes_without_credentials() {
        let (state, _) = AppState::for_tests(Config::for_tests());
        let response = build_router(state)
            .oneshot(request("GET", "/oauth2/authorization/google", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }
}
