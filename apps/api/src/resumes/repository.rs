//! SQL access for resumes and their sections.

use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::resume::{ResumeRow, ResumeSectionRow, SectionItem};
use crate::resumes::sections::flatten_items;

pub struct SectionInput<'a> {
    pub section_type: &'a str,
    pub section_title: Option<&'a str>,
    pub items: &'a [SectionItem],
}

pub async fn find(db: &PgPool, resume_id: i64) -> Result<Option<ResumeRow>, sqlx::Error> {
    sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE resume_id = $1")
        .bind(resume_id)
        .fetch_optional(db)
        .await
}

pub async fn list_for_member(db: &PgPool, member_id: i64) -> Result<Vec<ResumeRow>, sqlx::Error> {
    sqlx::query_as::<_, ResumeRow>(
        "SELECT * FROM resumes WHERE member_id = $1 ORDER BY created_at DESC, resume_id DESC",
    )
    .bind(member_id)
    .fetch_all(db)
    .await
}

pub async fn sections_for(db: &PgPool, resume_id: i64) -> Result<Vec<ResumeSectionRow>, sqlx::Error> {
    sqlx::query_as::<_, ResumeSectionRow>(
        "SELECT * FROM resume_sections WHERE resume_id = $1 ORDER BY position",
    )
    .bind(resume_id)
    .fetch_all(db)
    .await
}

/// Sections for several resumes at once, ordered by resume then position.
pub async fn sections_for_many(
    db: &PgPool,
    resume_ids: &[i64],
) -> Result<Vec<ResumeSectionRow>, sqlx::Error> {
    sqlx::query_as::<_, ResumeSectionRow>(
        "SELECT * FROM resume_sections WHERE resume_id = ANY($1) ORDER BY resume_id, position",
    )
    .bind(resume_ids)
    .fetch_all(db)
    .await
}

pub async fn create(
    db: &PgPool,
    member_id: i64,
    title: &str,
    template_type: &str,
    sections: &[SectionInput<'_>],
) -> Result<(ResumeRow, Vec<ResumeSectionRow>), sqlx::Error> {
    let mut tx = db.begin().await?;

    let resume = sqlx::query_as::<_, ResumeRow>(
        "INSERT INTO resumes (member_id, title, template_type) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(member_id)
    .bind(title)
    .bind(template_type)
    .fetch_one(&mut *tx)
    .await?;

    let rows = insert_sections(&mut tx, resume.resume_id, sections).await?;
    tx.commit().await?;
    Ok((resume, rows))
}

/// Replaces title, template type (when given) and every section.
///
/// `None` when the resume no longer exists or belongs to another member.
pub async fn update(
    db: &PgPool,
    resume_id: i64,
    member_id: i64,
    title: &str,
    template_type: Option<&str>,
    sections: &[SectionInput<'_>],
) -> Result<Option<(ResumeRow, Vec<ResumeSectionRow>)>, sqlx::Error> {
    let mut tx = db.begin().await?;

    let resume = sqlx::query_as::<_, ResumeRow>(
        r#"
        UPDATE resumes
        SET title = $3, template_type = COALESCE($4, template_type), updated_at = now()
        WHERE resume_id = $1 AND member_id = $2
        RETURNING *
        "#,
    )
    .bind(resume_id)
    .bind(member_id)
    .bind(title)
    .bind(template_type)
    .fetch_optional(&mut *tx)
    .await?;
    let Some(resume) = resume else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM resume_sections WHERE resume_id = $1")
        .bind(resume_id)
        .execute(&mut *tx)
        .await?;
    let rows = insert_sections(&mut tx, resume_id, sections).await?;

    tx.commit().await?;
    Ok(Some((resume, rows)))
}

pub async fn delete(db: &PgPool, resume_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM resumes WHERE resume_id = $1")
        .bind(resume_id)
        .execute(db)
        .await?;
    Ok(())
}

async fn insert_sections(
    tx: &mut Transaction<'_, Postgres>,
    resume_id: i64,
    sections: &[SectionInput<'_>],
) -> Result<Vec<ResumeSectionRow>, sqlx::Error> {
    let mut rows = Vec::with_capacity(sections.len());
    for (position, section) in sections.iter().enumerate() {
        let row = sqlx::query_as::<_, ResumeSectionRow>(
            r#"
            INSERT INTO resume_sections
                (resume_id, position, section_type, section_title, items, content_text)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(resume_id)
        .bind(position as i32)
        .bind(section.section_type)
        .bind(section.section_title)
        .bind(Json(section.items))
        .bind(flatten_items(section.items))
        .fetch_one(&mut **tx)
        .await?;
        rows.push(row);
    }
    Ok(rows)
}
