//! SQL access for `members`.

use sqlx::PgPool;

use crate::models::member::{AuthProvider, MemberRow, MemberStatus, Role};

pub struct NewMember<'a> {
    pub google_id: Option<&'a str>,
    pub email: &'a str,
    pub name: &'a str,
    pub picture: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub password_hash: Option<&'a str>,
    pub provider: AuthProvider,
    pub role: Role,
}

pub async fn find_by_id(db: &PgPool, member_id: i64) -> Result<Option<MemberRow>, sqlx::Error> {
    sqlx::query_as::<_, MemberRow>("SELECT * FROM members WHERE member_id = $1")
        .bind(member_id)
        .fetch_optional(db)
        .await
}

pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<MemberRow>, sqlx::Error> {
    sqlx::query_as::<_, MemberRow>("SELECT * FROM members WHERE email = $1")
        .bind(email)
        .fetch_optional(db)
        .await
}

pub async fn find_by_google_id(
    db: &PgPool,
    google_id: &str,
) -> Result<Option<MemberRow>, sqlx::Error> {
    sqlx::query_as::<_, MemberRow>("SELECT * FROM members WHERE google_id = $1")
        .bind(google_id)
        .fetch_optional(db)
        .await
}

pub async fn exists_by_email(db: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM members WHERE email = $1)")
        .bind(email)
        .fetch_one(db)
        .await
}

/// New members start `ACTIVE`; the login time is set for every provider but `LOCAL`.
pub async fn insert(db: &PgPool, new: NewMember<'_>) -> Result<MemberRow, sqlx::Error> {
    let logged_in = new.provider != AuthProvider::Local;
    sqlx::query_as::<_, MemberRow>(
        r#"
        INSERT INTO members
            (google_id, email, name, picture, phone, password_hash, auth_provider, role, status,
             last_login_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'ACTIVE', CASE WHEN $9 THEN now() END)
        RETURNING *
        "#,
    )
    .bind(new.google_id)
    .bind(new.email)
    .bind(new.name)
    .bind(new.picture)
    .bind(new.phone)
    .bind(new.password_hash)
    .bind(new.provider.as_str())
    .bind(new.role.as_str())
    .bind(logged_in)
    .fetch_one(db)
    .await
}

/// Refreshes the Google profile on login and reactivates a deactivated account.
/// Suspended accounts keep their status.
pub async fn record_google_login(
    db: &PgPool,
    member_id: i64,
    google_id: &str,
    name: &str,
    picture: Option<&str>,
) -> Result<MemberRow, sqlx::Error> {
    sqlx::query_as::<_, MemberRow>(
        r#"
        UPDATE members
        SET google_id = $2,
            name = $3,
            picture = COALESCE($4, picture),
            status = CASE WHEN status = 'INACTIVE' THEN 'ACTIVE' ELSE status END,
            last_login_at = now(),
            updated_at = now()
        WHERE member_id = $1
        RETURNING *
        "#,
    )
    .bind(member_id)
    .bind(google_id)
    .bind(name)
    .bind(picture)
    .fetch_one(db)
    .await
}

pub async fn touch_last_login(db: &PgPool, member_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE members SET last_login_at = now() WHERE member_id = $1")
        .bind(member_id)
        .execute(db)
        .await?;
    Ok(())
}

/// `None` fields keep their current value.
pub async fn update_profile(
    db: &PgPool,
    member_id: i64,
    name: Option<&str>,
    picture: Option<&str>,
) -> Result<Option<MemberRow>, sqlx::Error> {
    sqlx::query_as::<_, MemberRow>(
        r#"
        UPDATE members
        SET name = COALESCE($2, name),
            picture = COALESCE($3, picture),
            updated_at = now()
        WHERE member_id = $1
        RETURNING *
        "#,
    )
    .bind(member_id)
    .bind(name)
    .bind(picture)
    .fetch_optional(db)
    .await
}

pub async fn set_status(
    db: &PgPool,
    member_id: i64,
    status: MemberStatus,
) -> Result<Option<MemberRow>, sqlx::Error> {
    sqlx::query_as::<_, MemberRow>(
        "UPDATE members SET status = $2, updated_at = now() WHERE member_id = $1 RETURNING *",
    )
    .bind(member_id)
    .bind(status.as_str())
    .fetch_optional(db)
    .await
}

pub async fn set_role(
    db: &PgPool,
    member_id: i64,
    role: Role,
) -> Result<Option<MemberRow>, sqlx::Error> {
    sqlx::query_as::<_, MemberRow>(
        "UPDATE members SET role = $2, updated_at = now() WHERE member_id = $1 RETURNING *",
    )
    .bind(member_id)
    .bind(role.as_str())
    .fetch_optional(db)
    .await
}

/// Creates the development account or brings its name and role up to date.
pub async fn upsert_dev_member(
    db: &PgPool,
    email: &str,
    name: &str,
    role: Role,
) -> Result<MemberRow, sqlx::Error> {
    sqlx::query_as::<_, MemberRow>(
        r#"
        INSERT INTO members (email, name, auth_provider, role, status, last_login_at)
        VALUES ($1, $2, 'DEV', $3, 'ACTIVE', now())
        ON CONFLICT (email) DO UPDATE
        SET name = EXCLUDED.name,
            role = EXCLUDED.role,
            last_login_at = now(),
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(email)
    .bind(name)
    .bind(role.as_str())
    .fetch_one(db)
    .await
}
