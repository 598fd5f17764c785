//! SQL access for cover letters, their Q&A items and the feature catalogue.

use sqlx::{PgPool, Postgres, Transaction};

use crate::models::cover_letter::{CoverLetterFeatureRow, CoverLetterQnaRow, CoverLetterRow};

pub struct QnaInput<'a> {
    pub question: &'a str,
    pub answer: Option<&'a str>,
}

pub async fn list_features(db: &PgPool) -> Result<Vec<CoverLetterFeatureRow>, sqlx::Error> {
    sqlx::query_as::<_, CoverLetterFeatureRow>(
        "SELECT * FROM cover_letter_features ORDER BY cover_letter_feature_id",
    )
    .fetch_all(db)
    .await
}

pub async fn find(db: &PgPool, cover_letter_id: i64) -> Result<Option<CoverLetterRow>, sqlx::Error> {
    sqlx::query_as::<_, CoverLetterRow>("SELECT * FROM cover_letters WHERE cover_letter_id = $1")
        .bind(cover_letter_id)
        .fetch_optional(db)
        .await
}

pub async fn list_for_member(db: &PgPool, member_id: i64) -> Result<Vec<CoverLetterRow>, sqlx::Error> {
    sqlx::query_as::<_, CoverLetterRow>(
        "SELECT * FROM cover_letters WHERE member_id = $1 ORDER BY updated_at DESC, cover_letter_id DESC",
    )
    .bind(member_id)
    .fetch_all(db)
    .await
}

pub async fn qna_for(db: &PgPool, cover_letter_id: i64) -> Result<Vec<CoverLetterQnaRow>, sqlx::Error> {
    sqlx::query_as::<_, CoverLetterQnaRow>(
        "SELECT * FROM cover_letter_qna WHERE cover_letter_id = $1 ORDER BY position",
    )
    .bind(cover_letter_id)
    .fetch_all(db)
    .await
}

/// Q&A for several letters at once, ordered by letter then position.
pub async fn qna_for_many(
    db: &PgPool,
    cover_letter_ids: &[i64],
) -> Result<Vec<CoverLetterQnaRow>, sqlx::Error> {
    sqlx::query_as::<_, CoverLetterQnaRow>(
        "SELECT * FROM cover_letter_qna WHERE cover_letter_id = ANY($1) ORDER BY cover_letter_id, position",
    )
    .bind(cover_letter_ids)
    .fetch_all(db)
    .await
}

pub async fn create(
    db: &PgPool,
    member_id: i64,
    title: &str,
    content: &str,
    qna: &[QnaInput<'_>],
) -> Result<(CoverLetterRow, Vec<CoverLetterQnaRow>), sqlx::Error> {
    let mut tx = db.begin().await?;

    let letter = sqlx::query_as::<_, CoverLetterRow>(
        "INSERT INTO cover_letters (member_id, title, content) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(member_id)
    .bind(title)
    .bind(content)
    .fetch_one(&mut *tx)
    .await?;

    let items = insert_qna(&mut tx, letter.cover_letter_id, qna).await?;
    tx.commit().await?;
    Ok((letter, items))
}

/// Replaces title, content and the full Q&A list.
///
/// `None` when the letter no longer exists or belongs to another member.
pub async fn update(
    db: &PgPool,
    cover_letter_id: i64,
    member_id: i64,
    title: &str,
    content: &str,
    qna: &[QnaInput<'_>],
) -> Result<Option<(CoverLetterRow, Vec<CoverLetterQnaRow>)>, sqlx::Error> {
    let mut tx = db.begin().await?;

    let letter = sqlx::query_as::<_, CoverLetterRow>(
        r#"
        UPDATE cover_letters
        SET title = $3, content = $4, updated_at = now()
        WHERE cover_letter_id = $1 AND member_id = $2
        RETURNING *
        "#,
    )
    .bind(cover_letter_id)
    .bind(member_id)
    .bind(title)
    .bind(content)
    .fetch_optional(&mut *tx)
    .await?;
    let Some(letter) = letter else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM cover_letter_qna WHERE cover_letter_id = $1")
        .bind(cover_letter_id)
        .execute(&mut *tx)
        .await?;
    let items = insert_qna(&mut tx, cover_letter_id, qna).await?;

    tx.commit().await?;
    Ok(Some((letter, items)))
}

pub async fn delete(db: &PgPool, cover_letter_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM cover_letters WHERE cover_letter_id = $1")
        .bind(cover_letter_id)
        .execute(db)
        .await?;
    Ok(())
}

async fn insert_qna(
    tx: &mut Transaction<'_, Postgres>,
    cover_letter_id: i64,
    qna: &[QnaInput<'_>],
) -> Result<Vec<CoverLetterQnaRow>, sqlx::Error> {
    let mut rows = Vec::with_capacity(qna.len());
    for (position, item) in qna.iter().enumerate() {
        let row = sqlx::query_as::<_, CoverLetterQnaRow>(
            r#"
            INSERT INTO cover_letter_qna (cover_letter_id, position, question, answer)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(cover_letter_id)
        .bind(position as i32)
        .bind(item.question)
        .bind(item.answer)
        .fetch_one(&mut **tx)
        .await?;
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::member::{MemberStatus, Role};
    use crate::test_utils::create_test_member;

    #[sqlx::test]
    async fn test_update_is_scoped_to_owner(pool: PgPool) {
        let owner = create_test_member(&pool, "owner@example.com", Role::User, MemberStatus::Active).await;
        let other = create_test_member(&pool, "other@example.com", Role::User, MemberStatus::Active).await;
        let qna = [QnaInput {
            question: "Why us?",
            answer: Some("Because."),
        }];
        let (letter, _) = create(&pool, owner.member_id, "Mine", "Body", &qna)
            .await
            .unwrap();

        let denied = update(&pool, letter.cover_letter_id, other.member_id, "Theirs", "New", &[])
            .await
            .unwrap();
        assert!(denied.is_none());
        assert_eq!(qna_for(&pool, letter.cover_letter_id).await.unwrap().len(), 1);

        delete(&pool, letter.cover_letter_id).await.unwrap();
        let vanished = update(&pool, letter.cover_letter_id, owner.member_id, "Late", "Edit", &[])
            .await
            .unwrap();
        assert!(vanished.is_none());
    }
}
