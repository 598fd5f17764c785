use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
    Root,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
            Role::Root => "ROOT",
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin | Role::Root)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberStatus {
    Active,
    Inactive,
    Suspended,
}

impl MemberStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MemberStatus::Active => "ACTIVE",
            MemberStatus::Inactive => "INACTIVE",
            MemberStatus::Suspended => "SUSPENDED",
        }
    }
}

/// How the account was created; only `Local` accounts carry a password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthProvider {
    Google,
    Local,
    Dev,
}

impl AuthProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthProvider::Google => "GOOGLE",
            AuthProvider::Local => "LOCAL",
            AuthProvider::Dev => "DEV",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            "ROOT" => Ok(Role::Root),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl FromStr for MemberStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(MemberStatus::Active),
            "INACTIVE" => Ok(MemberStatus::Inactive),
            "SUSPENDED" => Ok(MemberStatus::Suspended),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl FromStr for AuthProvider {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GOOGLE" => Ok(AuthProvider::Google),
            "LOCAL" => Ok(AuthProvider::Local),
            "DEV" => Ok(AuthProvider::Dev),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// A row of `members`. Enumerations are stored as text and parsed on access.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MemberRow {
    pub member_id: i64,
    pub google_id: Option<String>,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub auth_provider: String,
    pub role: String,
    pub status: String,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MemberRow {
    /// Unknown role text degrades to the least privileged role.
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or(Role::User)
    }

    /// Unknown status text is treated as suspended.
    pub fn status(&self) -> MemberStatus {
        self.status.parse().unwrap_or(MemberStatus::Suspended)
    }

    pub fn is_active(&self) -> bool {
        self.status() == MemberStatus::Active
    }
}

/// Public view of a member returned by the auth and member endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct MemberInfo {
    pub member_id: i64,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    pub role: Role,
}

impl From<&MemberRow> for MemberInfo {
    fn from(row: &MemberRow) -> Self {
        MemberInfo {
            member_id: row.member_id,
            email: row.email.clone(),
            name: row.name.clone(),
            picture: row.picture.clone(),
            role: row.role(),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_member(member_id: i64) -> MemberRow {
    let now = Utc::now();
    MemberRow {
        member_id,
        google_id: Some(format!("google-{member_id}")),
        email: format!("member{member_id}@example.com"),
        name: format!("Member {member_id}"),
        picture: None,
        phone: None,
        password_hash: None,
        auth_provider: AuthProvider::Google.as_str().to_string(),
        role: Role::User.as_str().to_string(),
        status: MemberStatus::Active.as_str().to_string(),
        last_login_at: None,
        created_at: now,
        updated_at: now,
    }
}
