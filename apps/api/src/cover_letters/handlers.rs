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
use crate::cover_letters::feedback::{improve_cover_letter, AiImproveResponse};
use crate::cover_letters::repository::{self, QnaInput};
use crate::errors::AppError;
use crate::models::cover_letter::{CoverLetterQnaRow, CoverLetterRow};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CoverLetterRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub qna: Vec<QnaRequest>,
}

#[derive(Debug, Deserialize)]
pub struct QnaRequest {
    pub question: String,
    #[serde(default)]
    pub answer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AiImproveRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct QnaResponse {
    pub id: i64,
    pub question: String,
    pub answer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CoverLetterResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub qna: Vec<QnaResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CoverLetterResponse {
    fn build(letter: CoverLetterRow, qna: Vec<CoverLetterQnaRow>) -> Self {
        CoverLetterResponse {
            id: letter.cover_letter_id,
            title: letter.title,
            content: letter.content,
            qna: qna
                .into_iter()
                .map(|q| QnaResponse {
                    id: q.cover_letter_qna_id,
                    question: q.question,
                    answer: q.answer,
                })
                .collect(),
            created_at: letter.created_at,
            updated_at: letter.updated_at,
        }
    }
}

impl CoverLetterRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("title is required".to_string()));
        }
        if self.content.trim().is_empty() {
            return Err(AppError::Validation("content is required".to_string()));
        }
        if let Some(idx) = self.qna.iter().position(|q| q.question.trim().is_empty()) {
            return Err(AppError::Validation(format!(
                "qna[{idx}].question is required"
            )));
        }
        Ok(())
    }

    fn qna_inputs(&self) -> Vec<QnaInput<'_>> {
        self.qna
            .iter()
            .map(|q| QnaInput {
                question: q.question.trim(),
                answer: q.answer.as_deref(),
            })
            .collect()
    }
}

/// Loads a cover letter and checks that `member_id` owns it.
async fn load_owned(
    db: &PgPool,
    cover_letter_id: i64,
    member_id: i64,
) -> Result<CoverLetterRow, AppError> {
    let letter = repository::find(db, cover_letter_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Cover letter {cover_letter_id} not found")))?;
    if letter.member_id != member_id {
        return Err(AppError::Forbidden);
    }
    Ok(letter)
}

/// POST /api/v1/cover-letters
pub async fn handle_create(
    State(state): State<AppState>,
    CurrentMember(member): CurrentMember,
    Json(req): Json<CoverLetterRequest>,
) -> Result<(StatusCode, Json<CoverLetterResponse>), AppError> {
    req.validate()?;
    let (letter, qna) = repository::create(
        &state.db,
        member.member_id,
        req.title.trim(),
        &req.content,
        &req.qna_inputs(),
    )
    .await?;

    info!(
        member_id = member.member_id,
        cover_letter_id = letter.cover_letter_id,
        "Cover letter created"
    );
    Ok((
        StatusCode::CREATED,
        Json(CoverLetterResponse::build(letter, qna)),
    ))
}

/// GET /api/v1/cover-letters
pub async fn handle_list(
    State(state): State<AppState>,
    CurrentMember(member): CurrentMember,
) -> Result<Json<Vec<CoverLetterResponse>>, AppError> {
    let letters = repository::list_for_member(&state.db, member.member_id).await?;
    let ids: Vec<i64> = letters.iter().map(|l| l.cover_letter_id).collect();

    let mut qna_by_letter: HashMap<i64, Vec<CoverLetterQnaRow>> = HashMap::new();
    for row in repository::qna_for_many(&state.db, &ids).await? {
        qna_by_letter.entry(row.cover_letter_id).or_default().push(row);
    }

    let responses = letters
        .into_iter()
        .map(|letter| {
            let qna = qna_by_letter
                .remove(&letter.cover_letter_id)
                .unwrap_or_default();
            CoverLetterResponse::build(letter, qna)
        })
        .collect();
    Ok(Json(responses))
}

/// GET /api/v1/cover-letters/:id
pub async fn handle_get(
    State(state): State<AppState>,
    CurrentMember(member): CurrentMember,
    Path(id): Path<i64>,
) -> Result<Json<CoverLetterResponse>, AppError> {
    let letter = load_owned(&state.db, id, member.member_id).await?;
    let qna = repository::qna_for(&state.db, id).await?;
    Ok(Json(CoverLetterResponse::build(letter, qna)))
}

/// PUT /api/v1/cover-letters/:id
pub async fn handle_update(
    State(state): State<AppState>,
    CurrentMember(member): CurrentMember,
    Path(id): Path<i64>,
    Json(req): Json<CoverLetterRequest>,
) -> Result<Json<CoverLetterResponse>, AppError> {
    req.validate()?;
    load_owned(&state.db, id, member.member_id).await?;

    let (letter, qna) = repository::update(
        &state.db,
        id,
        member.member_id,
        req.title.trim(),
        &req.content,
        &req.qna_inputs(),
    )
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Cover letter {id} not found")))?;
    Ok(Json(CoverLetterResponse::build(letter, qna)))
}

/// DELETE /api/v1/cover-letters/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    CurrentMember(member): CurrentMember,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    load_owned(&state.db, id, member.member_id).await?;
    repository::delete(&state.db, id).await?;

    info!(member_id = member.member_id, cover_letter_id = id, "Cover letter deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/cover-letters/ai-improve
pub async fn handle_ai_improve(
    State(state): State<AppState>,
    CurrentMember(member): CurrentMember,
    Json(req): Json<AiImproveRequest>,
) -> Result<Json<AiImproveResponse>, AppError> {
    info!(member_id = member.member_id, "Cover letter AI improvement requested");
    let response = improve_cover_letter(&state.db, &state.llm, &req.content).await?;
    Ok(Json(response))
}
