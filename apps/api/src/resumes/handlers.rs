use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;

use crate::auth::extractor::CurrentMember;
use crate::errors::AppError;
use crate::models::member::MemberRow;
use crate::models::resume::{ResumeRow, ResumeSectionRow, SectionItem, DEFAULT_TEMPLATE};
use crate::resumes::repository::{self, SectionInput};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ResumeRequest {
    pub title: String,
    #[serde(default)]
    pub template_type: Option<String>,
    /// Accepted for client compatibility; member data always comes from the account.
    #[serde(default)]
    pub member_info: Option<serde_json::Value>,
    #[serde(default)]
    pub sections: Vec<SectionRequest>,
}

#[derive(Debug, Deserialize)]
pub struct SectionRequest {
    pub section_type: String,
    #[serde(default)]
    pub section_title: Option<String>,
    #[serde(default)]
    pub items: Vec<SectionItem>,
}

#[derive(Debug, Serialize)]
pub struct ResumeMemberInfo {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct SectionResponse {
    pub section_type: String,
    pub section_title: Option<String>,
    pub items: Vec<SectionItem>,
    pub content_text: String,
}

#[derive(Debug, Serialize)]
pub struct ResumeResponse {
    pub id: i64,
    pub title: String,
    pub template_type: String,
    pub member_info: ResumeMemberInfo,
    pub sections: Vec<SectionResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResumeResponse {
    fn build(resume: ResumeRow, sections: Vec<ResumeSectionRow>, member: &MemberRow) -> Self {
        ResumeResponse {
            id: resume.resume_id,
            title: resume.title,
            template_type: resume.template_type,
            member_info: ResumeMemberInfo {
                name: member.name.clone(),
                email: member.email.clone(),
            },
            sections: sections
                .into_iter()
                .map(|s| SectionResponse {
                    section_type: s.section_type,
                    section_title: s.section_title,
                    items: s.items.0,
                    content_text: s.content_text,
                })
                .collect(),
            created_at: resume.created_at,
            updated_at: resume.updated_at,
        }
    }
}

impl ResumeRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("title is required".to_string()));
        }
        if let Some(idx) = self
            .sections
            .iter()
            .position(|s| s.section_type.trim().is_empty())
        {
            return Err(AppError::Validation(format!(
                "sections[{idx}].section_type is required"
            )));
        }
        Ok(())
    }

    /// Blank template types count as absent.
    fn template_type(&self) -> Option<&str> {
        self.template_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    fn section_inputs(&self) -> Vec<SectionInput<'_>> {
        self.sections
            .iter()
            .map(|s| SectionInput {
                section_type: s.section_type.trim(),
                section_title: s.section_title.as_deref(),
                items: &s.items,
            })
            .collect()
    }
}

/// Loads a resume and checks that `member_id` owns it.
async fn load_owned(db: &PgPool, resume_id: i64, member_id: i64) -> Result<ResumeRow, AppError> {
    let resume = repository::find(db, resume_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} not found")))?;
    if resume.member_id != member_id {
        return Err(AppError::Forbidden);
    }
    Ok(resume)
}

/// POST /api/v1/resumes
pub async fn handle_create(
    State(state): State<AppState>,
    CurrentMember(member): CurrentMember,
    Json(req): Json<ResumeRequest>,
) -> Result<(StatusCode, Json<ResumeResponse>), AppError> {
    req.validate()?;
    let (resume, sections) = repository::create(
        &state.db,
        member.member_id,
        req.title.trim(),
        req.template_type().unwrap_or(DEFAULT_TEMPLATE),
        &req.section_inputs(),
    )
    .await?;

    info!(
        member_id = member.member_id,
        resume_id = resume.resume_id,
        sections = sections.len(),
        "Resume created"
    );
    Ok((
        StatusCode::CREATED,
        Json(ResumeResponse::build(resume, sections, &member)),
    ))
}

/// GET /api/v1/resumes
pub async fn handle_list(
    State(state): State<AppState>,
    CurrentMember(member): CurrentMember,
) -> Result<Json<Vec<ResumeResponse>>, AppError> {
    let resumes = repository::list_for_member(&state.db, member.member_id).await?;
    let ids: Vec<i64> = resumes.iter().map(|r| r.resume_id).collect();

    let mut sections_by_resume: HashMap<i64, Vec<ResumeSectionRow>> = HashMap::new();
    for row in repository::sections_for_many(&state.db, &ids).await? {
        sections_by_resume.entry(row.resume_id).or_default().push(row);
    }

    let responses = resumes
        .into_iter()
        .map(|resume| {
            let sections = sections_by_resume
                .remove(&resume.resume_id)
                .unwrap_or_default();
            ResumeResponse::build(resume, sections, &member)
        })
        .collect();
    Ok(Json(responses))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get(
    State(state): State<AppState>,
    CurrentMember(member): CurrentMember,
    Path(id): Path<i64>,
) -> Result<Json<ResumeResponse>, AppError> {
    let resume = load_owned(&state.db, id, member.member_id).await?;
    let sections = repository::sections_for(&state.db, id).await?;
    Ok(Json(ResumeResponse::build(resume, sections, &member)))
}

/// PUT /api/v1/resumes/:id
pub async fn handle_update(
    State(state): State<AppState>,
    CurrentMember(member): CurrentMember,
    Path(id): Path<i64>,
    Json(req): Json<ResumeRequest>,
) -> Result<Json<ResumeResponse>, AppError> {
    req.validate()?;
    load_owned(&state.db, id, member.member_id).await?;

    let (resume, sections) = repository::update(
        &state.db,
        id,
        member.member_id,
        req.title.trim(),
        req.template_type(),
        &req.section_inputs(),
    )
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;
    Ok(Json(ResumeResponse::build(resume, sections, &member)))
}

/// DELETE /api/v1/resumes/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    CurrentMember(member): CurrentMember,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    load_owned(&state.db, id, member.member_id).await?;
    repository::delete(&state.db, id).await?;

    info!(member_id = member.member_id, resume_id = id, "Resume deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::member::sample_member;

    fn parse(body: &str) -> ResumeRequest {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_request_accepts_and_ignores_member_info() {
        let req = parse(
            r#"{
                "title": "Backend resume",
                "member_info": {"name": "Someone Else", "email": "other@example.com"},
                "sections": [{
                    "section_type": "EXPERIENCE",
                    "section_title": "Work",
                    "items": [{"title": "Acme", "start_date": "2021-03"}]
                }]
            }"#,
        );
        assert!(req.validate().is_ok());
        assert_eq!(req.template_type(), None);

        let inputs = req.section_inputs();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].section_type, "EXPERIENCE");
        assert_eq!(inputs[0].items[0].title.as_deref(), Some("Acme"));
        assert_eq!(inputs[0].items[0].end_date, None);
    }

    #[test]
    fn test_blank_title_or_section_type_is_rejected() {
        assert!(parse(r#"{"title": "  "}"#).validate().is_err());

        let err = parse(r#"{"title": "t", "sections": [{"section_type": ""}]}"#)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("sections[0]"));
    }

    #[test]
    fn test_blank_template_type_counts_as_absent() {
        assert_eq!(parse(r#"{"title": "t", "template_type": " "}"#).template_type(), None);
        assert_eq!(
            parse(r#"{"title": "t", "template_type": "modern"}"#).template_type(),
            Some("modern")
        );
    }

    #[test]
    fn test_response_takes_member_info_from_account() {
        let member = sample_member(7);
        let now = Utc::now();
        let resume = ResumeRow {
            resume_id: 3,
            member_id: 7,
            title: "Backend resume".to_string(),
            template_type: DEFAULT_TEMPLATE.to_string(),
            created_at: now,
            updated_at: now,
        };
        let response = ResumeResponse::build(resume, Vec::new(), &member);
        assert_eq!(response.id, 3);
        assert_eq!(response.member_info.email, member.email);
        assert_eq!(response.member_info.name, member.name);
        assert!(response.sections.is_empty());
    }

    mod with_database {
        use axum::http::{Method, StatusCode};
        use serde_json::json;
        use sqlx::PgPool;

        use crate::config::Config;
        use crate::models::member::{MemberStatus, Role};
        use crate::routes::build_router;
        use crate::state::AppState;
        use crate::test_utils::{auth_cookie, create_test_member, send};

        fn resume_body(title: &str, section_types: &[&str]) -> serde_json::Value {
            let sections: Vec<_> = section_types
                .iter()
                .map(|t| {
                    json!({
                        "section_type": t,
                        "section_title": format!("{t} section"),
                        "items": [{"title": "Acme", "sub_title": "Engineer", "start_date": "2021-03"}]
                    })
                })
                .collect();
            json!({"title": title, "sections": sections})
        }

        #[sqlx::test]
        async fn test_create_get_and_list_resume(pool: PgPool) {
            let (state, _) = AppState::for_tests_with_pool(Config::for_tests(), pool.clone());
            let member =
                create_test_member(&pool, "owner@example.com", Role::User, MemberStatus::Active).await;
            let cookie = auth_cookie(&state, &member).await;
            let router = build_router(state);

            let created = send(
                &router,
                Method::POST,
                "/api/v1/resumes",
                Some(&cookie),
                Some(resume_body("Backend resume", &["EXPERIENCE", "EDUCATION"])),
            )
            .await;
            assert_eq!(created.status, StatusCode::CREATED);
            assert_eq!(created.body["template_type"], "default");
            assert_eq!(created.body["member_info"]["email"], "owner@example.com");
            assert_eq!(created.body["sections"].as_array().unwrap().len(), 2);
            assert_eq!(
                created.body["sections"][0]["content_text"],
                "Title: Acme, SubTitle: Engineer, Period: 2021-03 - , Description: "
            );

            let id = created.body["id"].as_i64().unwrap();
            let fetched = send(&router, Method::GET, &format!("/api/v1/resumes/{id}"), Some(&cookie), None).await;
            assert_eq!(fetched.status, StatusCode::OK);
            assert_eq!(fetched.body["sections"][1]["section_type"], "EDUCATION");

            let listed = send(&router, Method::GET, "/api/v1/resumes", Some(&cookie), None).await;
            assert_eq!(listed.status, StatusCode::OK);
            assert_eq!(listed.body.as_array().unwrap().len(), 1);
            assert_eq!(listed.body[0]["sections"].as_array().unwrap().len(), 2);
        }

        #[sqlx::test]
        async fn test_foreign_resume_is_forbidden_and_unknown_is_not_found(pool: PgPool) {
            let (state, _) = AppState::for_tests_with_pool(Config::for_tests(), pool.clone());
            let owner =
                create_test_member(&pool, "owner@example.com", Role::User, MemberStatus::Active).await;
            let intruder =
                create_test_member(&pool, "intruder@example.com", Role::User, MemberStatus::Active).await;
            let owner_cookie = auth_cookie(&state, &owner).await;
            let intruder_cookie = auth_cookie(&state, &intruder).await;
            let router = build_router(state);

            let created = send(
                &router,
                Method::POST,
                "/api/v1/resumes",
                Some(&owner_cookie),
                Some(resume_body("Mine", &["SKILLS"])),
            )
            .await;
            let uri = format!("/api/v1/resumes/{}", created.body["id"]);

            let read = send(&router, Method::GET, &uri, Some(&intruder_cookie), None).await;
            assert_eq!(read.status, StatusCode::FORBIDDEN);
            assert_eq!(read.error_code(), "FORBIDDEN");

            let update = send(
                &router,
                Method::PUT,
                &uri,
                Some(&intruder_cookie),
                Some(resume_body("Stolen", &[])),
            )
            .await;
            assert_eq!(update.status, StatusCode::FORBIDDEN);

            let delete = send(&router, Method::DELETE, &uri, Some(&intruder_cookie), None).await;
            assert_eq!(delete.status, StatusCode::FORBIDDEN);

            let unknown = send(&router, Method::GET, "/api/v1/resumes/987654", Some(&owner_cookie), None).await;
            assert_eq!(unknown.status, StatusCode::NOT_FOUND);
            assert_eq!(unknown.error_code(), "NOT_FOUND");

            let still_there = send(&router, Method::GET, &uri, Some(&owner_cookie), None).await;
            assert_eq!(still_there.body["title"], "Mine");
        }

        #[sqlx::test]
        async fn test_update_replaces_sections_and_delete_removes_resume(pool: PgPool) {
            let (state, _) = AppState::for_tests_with_pool(Config::for_tests(), pool.clone());
            let member =
                create_test_member(&pool, "owner@example.com", Role::User, MemberStatus::Active).await;
            let cookie = auth_cookie(&state, &member).await;
            let router = build_router(state);

            let mut body = resume_body("Draft", &["EXPERIENCE", "PROJECTS"]);
            body["template_type"] = json!("modern");
            let created = send(&router, Method::POST, "/api/v1/resumes", Some(&cookie), Some(body)).await;
            let uri = format!("/api/v1/resumes/{}", created.body["id"]);

            let updated = send(
                &router,
                Method::PUT,
                &uri,
                Some(&cookie),
                Some(resume_body("Final", &["AWARDS"])),
            )
            .await;
            assert_eq!(updated.status, StatusCode::OK);
            assert_eq!(updated.body["title"], "Final");
            assert_eq!(updated.body["template_type"], "modern");
            let sections = updated.body["sections"].as_array().unwrap();
            assert_eq!(sections.len(), 1);
            assert_eq!(sections[0]["section_type"], "AWARDS");

            let section_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM resume_sections")
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(section_rows, 1);

            let deleted = send(&router, Method::DELETE, &uri, Some(&cookie), None).await;
            assert_eq!(deleted.status, StatusCode::NO_CONTENT);
            let gone = send(&router, Method::GET, &uri, Some(&cookie), None).await;
            assert_eq!(gone.status, StatusCode::NOT_FOUND);
        }

        #[sqlx::test]
        async fn test_blank_title_is_rejected_before_writing(pool: PgPool) {
            let (state, _) = AppState::for_tests_with_pool(Config::for_tests(), pool.clone());
            let member =
                create_test_member(&pool, "owner@example.com", Role::User, MemberStatus::Active).await;
            let cookie = auth_cookie(&state, &member).await;
            let router = build_router(state);

            let response = send(
                &router,
                Method::POST,
                "/api/v1/resumes",
                Some(&cookie),
                Some(resume_body("   ", &["SKILLS"])),
            )
            .await;
            assert_eq!(response.status, StatusCode::BAD_REQUEST);
            assert_eq!(response.error_code(), "VALIDATION_ERROR");

            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM resumes")
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(count, 0);
        }
    }
}
